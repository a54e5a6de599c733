//! End-to-end pipeline scenarios driven through the public library API.

use std::cell::RefCell;
use std::collections::VecDeque;

use loadgraph::prelude::*;
use serde_json::{Value, json};

/// Replays canned fetch results, one per tick.
struct CannedSource {
    replies: RefCell<VecDeque<Result<Snapshot>>>,
}

impl CannedSource {
    fn new(replies: Vec<Result<Snapshot>>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
        }
    }
}

impl StatsSource for CannedSource {
    fn fetch(&self) -> Result<Snapshot> {
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(LgError::Transport {
                url: "canned://".to_string(),
                details: "script exhausted".to_string(),
            }))
    }

    fn describe(&self) -> String {
        "canned://".to_string()
    }
}

fn snapshot(phase: &str, aggregate: Value) -> Result<Snapshot> {
    let body = json!({
        "state": phase,
        "stats": [{ "name": "/login", "num_requests": 3 }, aggregate],
    });
    parse_snapshot(body.to_string().as_bytes())
}

fn scheduler(replies: Vec<Result<Snapshot>>) -> UpdateScheduler<CannedSource> {
    let config = Config::default();
    let registry = ChartRegistry::from_config(&config.chart).expect("default chart config");
    let router = SnapshotRouter::from_config(&config.source);
    UpdateScheduler::new(
        CannedSource::new(replies),
        registry,
        router,
        ActivityLoggerHandle::disabled(),
    )
}

fn xs(sched: &UpdateScheduler<CannedSource>, phase: &str, key: &str) -> Vec<f64> {
    sched
        .store()
        .snapshot_view(phase, key)
        .expect("series exists")
        .into_iter()
        .map(|(x, _)| x)
        .collect()
}

#[test]
fn load_test_lifecycle_builds_both_phases() {
    let mut sched = scheduler(vec![
        snapshot("ready", json!({ "num_requests": 0 })),
        snapshot("hatching", json!({ "num_requests": 4, "avg_response_time": 30.0, "num_failures": 1 })),
        snapshot("running", json!({ "num_requests": 10, "avg_response_time": 50.0 })),
        Err(LgError::Transport {
            url: "canned://".to_string(),
            details: "connection reset".to_string(),
        }),
        snapshot("running", json!({ "num_requests": 25, "avg_response_time": 55.0, "num_failures": 0 })),
        snapshot("stopped", json!({ "num_requests": 30 })),
    ]);
    let mut dirty = DirtyTracker::default();

    let labels: Vec<&'static str> = (0..6)
        .map(|_| sched.tick(&mut dirty).expect("no tick is fatal").label())
        .collect();
    assert_eq!(
        labels,
        ["ignored", "applied", "applied", "skipped", "applied", "ignored"]
    );

    assert_eq!(xs(&sched, "hatching", "avg_response_time"), vec![4.0]);
    assert_eq!(xs(&sched, "hatching", "num_failures"), vec![4.0]);
    assert_eq!(xs(&sched, "running", "avg_response_time"), vec![10.0, 25.0]);
    // Absent on the first running tick, present zero on the second.
    assert_eq!(
        sched.store().snapshot_view("running", "num_failures"),
        Some(vec![(25.0, 0.0)])
    );
    // Non-skip series zero-fill missing values and stay in lockstep.
    assert_eq!(
        sched.store().snapshot_view("running", "median_response_time"),
        Some(vec![(10.0, 0.0), (25.0, 0.0)])
    );

    let stats = sched.stats();
    assert_eq!(stats.ticks, 6);
    assert_eq!(stats.applied, 3);
    assert_eq!(stats.ignored, 2);
    assert_eq!(stats.skipped_transport, 1);
    assert_eq!(sched.reported_phase(), Some("stopped"));
    assert!(dirty.contains("running", "num_failures"));
}

#[test]
fn stats_reset_skips_ticks_until_the_count_catches_up() {
    let mut sched = scheduler(vec![
        snapshot("running", json!({ "num_requests": 40, "current_rps": 4.0 })),
        snapshot("running", json!({ "num_requests": 5, "current_rps": 0.5 })),
        snapshot("running", json!({ "num_requests": 40, "current_rps": 3.0 })),
        snapshot("running", json!({ "num_requests": 50, "current_rps": 5.0 })),
    ]);

    let outcomes: Vec<TickOutcome> = (0..4)
        .map(|_| sched.tick(&mut NullNotifier).expect("no tick is fatal"))
        .collect();
    assert!(matches!(&outcomes[1], TickOutcome::Skipped { code, .. } if code == "LG-2004"));
    assert_eq!(
        outcomes.iter().map(TickOutcome::label).collect::<Vec<_>>(),
        ["applied", "skipped", "applied", "applied"]
    );

    assert_eq!(xs(&sched, "running", "current_rps"), vec![40.0, 40.0, 50.0]);
    assert_eq!(xs(&sched, "running", "avg_response_time"), vec![40.0, 40.0, 50.0]);
    assert_eq!(sched.stats().skipped_regressed, 1);
    assert_eq!(sched.stats().applied, 3);
}

#[test]
fn malformed_snapshots_leave_the_store_untouched() {
    let mut sched = scheduler(vec![
        parse_snapshot(br#"{"state": "running"}"#),
        parse_snapshot(b"<html>502</html>"),
        snapshot("running", json!({ "avg_response_time": 10.0 })),
    ]);
    let before = sched.store().total_points();

    for _ in 0..3 {
        let outcome = sched.tick(&mut NullNotifier).expect("recoverable");
        assert_eq!(outcome.label(), "skipped");
    }
    assert_eq!(sched.store().total_points(), before);
    assert_eq!(sched.stats().skipped_parse, 2);
    assert_eq!(sched.stats().skipped_malformed, 1);
}

#[test]
fn named_aggregate_ignores_row_order() {
    let config = Config::default();
    let registry = ChartRegistry::from_config(&config.chart).unwrap();
    let router = SnapshotRouter::new(
        AggregateLocator::Named {
            field: "name".to_string(),
            name: "Aggregated".to_string(),
        },
        "num_requests",
    );
    let snap = parse_snapshot(
        json!({
            "state": "running",
            "stats": [
                { "name": "Aggregated", "num_requests": 40, "current_rps": 8.0 },
                { "name": "/cart", "num_requests": 2, "current_rps": 0.5 },
            ],
        })
        .to_string()
        .as_bytes(),
    )
    .unwrap();

    let instructions = router.route(&snap, &registry).unwrap();
    let rps = instructions
        .iter()
        .find(|i| i.metric_key == "current_rps")
        .unwrap();
    assert_eq!((rps.x, rps.y), (40.0, 8.0));
}
