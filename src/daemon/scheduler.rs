//! Update scheduler: the fixed-cadence fetch → route → append → notify cycle.
//!
//! The scheduler owns the series store. One call to [`UpdateScheduler::tick`]
//! runs exactly one cycle; transient fetch and snapshot failures end the tick
//! without touching any series, and the next tick simply tries again.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::chart::registry::{ChartRegistry, Phase};
use crate::chart::series::SeriesStore;
use crate::core::config::Config;
use crate::core::errors::{LgError, Result};
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::monitor::fetcher::{HttpStatsFetcher, StatsSource};
use crate::monitor::router::SnapshotRouter;

/// Upper bound on one idle sleep so stop requests are noticed promptly.
const IDLE_SLICE: Duration = Duration::from_millis(50);

// ──────────────────── ticker ────────────────────

/// Fixed-interval tick source.
///
/// The next deadline is always one interval after the tick actually fired,
/// so a slow tick pushes the schedule back instead of queuing catch-up ticks.
#[derive(Debug, Clone)]
pub struct Ticker {
    interval: Duration,
    next_due: Instant,
}

impl Ticker {
    /// First tick is due immediately.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(interval, Instant::now())
    }

    #[must_use]
    pub const fn starting_at(interval: Duration, first_due: Instant) -> Self {
        Self {
            interval,
            next_due: first_due,
        }
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next_due
    }

    /// Time left before the next tick; zero when already due.
    #[must_use]
    pub fn until_due(&self, now: Instant) -> Duration {
        self.next_due.saturating_duration_since(now)
    }

    /// Consume the due tick if there is one.
    pub fn fire(&mut self, now: Instant) -> bool {
        if !self.is_due(now) {
            return false;
        }
        self.next_due = now + self.interval;
        true
    }
}

// ──────────────────── change notification ────────────────────

/// Rendering-side sink for "this series got a new point".
pub trait ChangeNotifier {
    fn notify_changed(&mut self, phase: &Phase, metric_key: &str);
}

/// Notifier for runs without a display.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl ChangeNotifier for NullNotifier {
    fn notify_changed(&mut self, _phase: &Phase, _metric_key: &str) {}
}

/// Collects changed series until the renderer drains them.
#[derive(Debug, Default)]
pub struct DirtyTracker {
    changed: HashSet<(Phase, String)>,
}

impl DirtyTracker {
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !self.changed.is_empty()
    }

    #[must_use]
    pub fn contains(&self, phase: &str, metric_key: &str) -> bool {
        self.changed
            .iter()
            .any(|(p, k)| p.as_str() == phase && k == metric_key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.changed.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }

    /// Drain the set, sorted.
    pub fn take(&mut self) -> Vec<(Phase, String)> {
        let mut drained: Vec<_> = self.changed.drain().collect();
        drained.sort();
        drained
    }
}

impl ChangeNotifier for DirtyTracker {
    fn notify_changed(&mut self, phase: &Phase, metric_key: &str) {
        self.changed.insert((phase.clone(), metric_key.to_string()));
    }
}

// ──────────────────── outcomes ────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Idle,
    Ticking,
}

/// Result of one completed tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TickOutcome {
    /// Points were appended for a recognized phase.
    Applied { phase: Phase, points: usize },
    /// The reported phase is not charted.
    Ignored { phase: String },
    /// Fetch or snapshot failure; nothing was appended.
    Skipped { code: String, message: String },
}

impl TickOutcome {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Applied { .. } => "applied",
            Self::Ignored { .. } => "ignored",
            Self::Skipped { .. } => "skipped",
        }
    }
}

/// Running totals for the status line and the stop event.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickStats {
    pub ticks: u64,
    pub applied: u64,
    pub ignored: u64,
    pub skipped_transport: u64,
    pub skipped_parse: u64,
    pub skipped_malformed: u64,
    /// Ticks refused because the request count dropped below a plotted x.
    pub skipped_regressed: u64,
    pub points_appended: u64,
    pub last_tick_at: Option<DateTime<Utc>>,
    pub last_duration_ms: u64,
    pub last_outcome: Option<TickOutcome>,
}

impl TickStats {
    #[must_use]
    pub const fn skipped(&self) -> u64 {
        self.skipped_transport + self.skipped_parse + self.skipped_malformed + self.skipped_regressed
    }

    fn record_skip(&mut self, err: &LgError) {
        match err {
            LgError::Transport { .. } => self.skipped_transport += 1,
            LgError::Parse { .. } => self.skipped_parse += 1,
            LgError::CounterRegressed { .. } => self.skipped_regressed += 1,
            _ => self.skipped_malformed += 1,
        }
    }
}

// ──────────────────── scheduler ────────────────────

/// Owns the pipeline and the series it feeds.
pub struct UpdateScheduler<S: StatsSource> {
    source: S,
    registry: ChartRegistry,
    router: SnapshotRouter,
    store: SeriesStore,
    logger: ActivityLoggerHandle,
    state: SchedulerState,
    stats: TickStats,
    reported_phase: Option<String>,
    started_at: Instant,
}

impl UpdateScheduler<HttpStatsFetcher> {
    /// Wire the HTTP pipeline from a validated config.
    pub fn from_config(cfg: &Config, logger: ActivityLoggerHandle) -> Result<Self> {
        let registry = ChartRegistry::from_config(&cfg.chart)?;
        let source = HttpStatsFetcher::from_config(&cfg.source)?;
        let router = SnapshotRouter::from_config(&cfg.source);
        Ok(Self::new(source, registry, router, logger))
    }
}

impl<S: StatsSource> UpdateScheduler<S> {
    /// Create every series skeleton up front.
    pub fn new(
        source: S,
        registry: ChartRegistry,
        router: SnapshotRouter,
        logger: ActivityLoggerHandle,
    ) -> Self {
        let store = SeriesStore::from_registry(&registry);
        Self {
            source,
            registry,
            router,
            store,
            logger,
            state: SchedulerState::Idle,
            stats: TickStats::default(),
            reported_phase: None,
            started_at: Instant::now(),
        }
    }

    #[must_use]
    pub const fn registry(&self) -> &ChartRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn store(&self) -> &SeriesStore {
        &self.store
    }

    #[must_use]
    pub const fn stats(&self) -> &TickStats {
        &self.stats
    }

    #[must_use]
    pub const fn state(&self) -> SchedulerState {
        self.state
    }

    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Phase from the most recent snapshot, recognized or not.
    #[must_use]
    pub fn reported_phase(&self) -> Option<&str> {
        self.reported_phase.as_deref()
    }

    /// Run one cycle.
    ///
    /// Recoverable failures return `Ok(TickOutcome::Skipped)`. Only an
    /// invariant violation (an instruction for a series that was never
    /// created) is returned as `Err`.
    pub fn tick(&mut self, notifier: &mut dyn ChangeNotifier) -> Result<TickOutcome> {
        self.state = SchedulerState::Ticking;
        let started = Instant::now();
        self.stats.ticks += 1;
        let result = self.run_cycle(notifier);
        self.stats.last_tick_at = Some(Utc::now());
        self.stats.last_duration_ms =
            u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.state = SchedulerState::Idle;

        match result {
            Ok(outcome) => {
                self.stats.last_outcome = Some(outcome.clone());
                Ok(outcome)
            }
            Err(err) if err.is_tick_recoverable() => {
                self.stats.record_skip(&err);
                self.logger.send(ActivityEvent::TickSkipped {
                    tick: self.stats.ticks,
                    url: self.source.describe(),
                    code: err.code().to_string(),
                    message: err.to_string(),
                    duration_ms: self.stats.last_duration_ms,
                });
                let outcome = TickOutcome::Skipped {
                    code: err.code().to_string(),
                    message: err.to_string(),
                };
                self.stats.last_outcome = Some(outcome.clone());
                Ok(outcome)
            }
            Err(err) => {
                self.logger.send(ActivityEvent::error(&err));
                Err(err)
            }
        }
    }

    fn run_cycle(&mut self, notifier: &mut dyn ChangeNotifier) -> Result<TickOutcome> {
        let snapshot = self.source.fetch()?;
        self.track_phase(&snapshot.phase);

        let instructions = self.router.route(&snapshot, &self.registry)?;
        let Some(phase) = self.registry.phase(&snapshot.phase).cloned() else {
            self.stats.ignored += 1;
            return Ok(TickOutcome::Ignored {
                phase: snapshot.phase,
            });
        };

        let points = self.store.apply(&instructions)?;
        for instruction in &instructions {
            notifier.notify_changed(&instruction.phase, &instruction.metric_key);
        }
        self.stats.applied += 1;
        self.stats.points_appended += points as u64;
        Ok(TickOutcome::Applied { phase, points })
    }

    fn track_phase(&mut self, phase: &str) {
        if self.reported_phase.as_deref() == Some(phase) {
            return;
        }
        self.logger.send(ActivityEvent::PhaseChanged {
            from: self.reported_phase.take(),
            to: phase.to_string(),
            tick: self.stats.ticks,
        });
        self.reported_phase = Some(phase.to_string());
    }

    /// Record the start of a run in the activity log.
    pub fn log_start(&self, config_hash: &str) {
        self.logger.send(ActivityEvent::DashboardStarted {
            version: env!("CARGO_PKG_VERSION").to_string(),
            url: self.source.describe(),
            config_hash: config_hash.to_string(),
        });
    }

    /// Record the end of a run in the activity log.
    pub fn log_stop(&self, reason: &str) {
        self.logger.send(ActivityEvent::DashboardStopped {
            reason: reason.to_string(),
            ticks: self.stats.ticks,
            points: self.stats.points_appended,
            uptime_secs: self.started_at.elapsed().as_secs(),
        });
    }

    /// Drive ticks on `ticker` without a display.
    ///
    /// Stops when `should_stop` returns true, after `max_ticks` ticks, or on
    /// the first non-recoverable error. `on_tick` sees every outcome.
    pub fn run_headless<F, G>(
        &mut self,
        ticker: &mut Ticker,
        max_ticks: Option<u64>,
        should_stop: F,
        mut on_tick: G,
    ) -> Result<u64>
    where
        F: Fn() -> bool,
        G: FnMut(&Self, &TickOutcome) -> Result<()>,
    {
        let mut completed = 0_u64;
        while !should_stop() {
            if max_ticks.is_some_and(|max| completed >= max) {
                break;
            }
            let now = Instant::now();
            if ticker.fire(now) {
                let outcome = self.tick(&mut NullNotifier)?;
                completed += 1;
                on_tick(self, &outcome)?;
            } else {
                thread::sleep(ticker.until_due(now).min(IDLE_SLICE));
            }
        }
        Ok(completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::fetcher::Snapshot;
    use crate::monitor::router::AggregateLocator;
    use parking_lot::Mutex;
    use proptest::prelude::*;
    use serde_json::{Value, json};
    use std::collections::VecDeque;

    /// Source that replays a fixed script of fetch results.
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<Snapshot>>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Snapshot>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
            }
        }
    }

    impl StatsSource for ScriptedSource {
        fn fetch(&self) -> Result<Snapshot> {
            self.script
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(transport_error()))
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    fn transport_error() -> LgError {
        LgError::Transport {
            url: "scripted".to_string(),
            details: "connection refused".to_string(),
        }
    }

    fn snap(phase: &str, aggregate: Value) -> Result<Snapshot> {
        Ok(Snapshot {
            phase: phase.to_string(),
            stats: vec![aggregate],
        })
    }

    fn aggregate(count: u64, failures: Option<u64>) -> Value {
        let mut value = json!({
            "num_requests": count,
            "avg_response_time": 10.0,
            "median_response_time": 9,
            "min_response_time": 2,
            "max_response_time": 30,
            "current_rps": 4.5,
        });
        if let Some(failures) = failures {
            value["num_failures"] = json!(failures);
        }
        value
    }

    fn scheduler_with(
        script: Vec<Result<Snapshot>>,
    ) -> (
        UpdateScheduler<ScriptedSource>,
        crossbeam_channel::Receiver<ActivityEvent>,
    ) {
        let registry = ChartRegistry::from_config(&Config::default().chart).unwrap();
        let router = SnapshotRouter::new(AggregateLocator::Last, "num_requests");
        let (logger, rx) = ActivityLoggerHandle::channel(64);
        let scheduler = UpdateScheduler::new(ScriptedSource::new(script), registry, router, logger);
        (scheduler, rx)
    }

    fn xs(scheduler: &UpdateScheduler<ScriptedSource>, phase: &str, key: &str) -> Vec<f64> {
        scheduler
            .store()
            .snapshot_view(phase, key)
            .unwrap()
            .into_iter()
            .map(|(x, _)| x)
            .collect()
    }

    #[test]
    fn consecutive_ticks_append_in_order() {
        let (mut scheduler, _rx) = scheduler_with(vec![
            snap("running", aggregate(10, Some(0))),
            snap("running", aggregate(25, Some(1))),
        ]);
        scheduler.tick(&mut NullNotifier).unwrap();
        scheduler.tick(&mut NullNotifier).unwrap();
        assert_eq!(xs(&scheduler, "running", "current_rps"), vec![10.0, 25.0]);
        assert_eq!(
            scheduler.store().snapshot_view("running", "num_failures"),
            Some(vec![(10.0, 0.0), (25.0, 1.0)])
        );
        assert_eq!(scheduler.stats().applied, 2);
        assert_eq!(scheduler.stats().points_appended, 12);
    }

    #[test]
    fn falling_request_count_skips_the_tick() {
        let (mut scheduler, rx) = scheduler_with(vec![
            snap("running", aggregate(25, Some(0))),
            snap("running", aggregate(10, Some(0))),
        ]);
        scheduler.tick(&mut NullNotifier).unwrap();
        let before: Vec<_> = scheduler
            .store()
            .keys()
            .into_iter()
            .map(|(phase, key)| scheduler.store().snapshot_view(phase.as_str(), &key))
            .collect();

        let mut dirty = DirtyTracker::default();
        let outcome = scheduler.tick(&mut dirty).unwrap();
        assert!(matches!(outcome, TickOutcome::Skipped { ref code, .. } if code == "LG-2004"));
        let after: Vec<_> = scheduler
            .store()
            .keys()
            .into_iter()
            .map(|(phase, key)| scheduler.store().snapshot_view(phase.as_str(), &key))
            .collect();
        assert_eq!(before, after);
        assert_eq!(xs(&scheduler, "running", "current_rps"), vec![25.0]);
        assert!(!dirty.is_dirty());
        assert_eq!(scheduler.stats().skipped_regressed, 1);
        assert_eq!(scheduler.stats().skipped(), 1);
        assert_eq!(scheduler.stats().applied, 1);

        let skipped = rx
            .try_iter()
            .filter(|e| matches!(e, ActivityEvent::TickSkipped { code, .. } if code == "LG-2004"))
            .count();
        assert_eq!(skipped, 1);
    }

    #[test]
    fn repeated_request_count_is_still_applied() {
        let (mut scheduler, _rx) = scheduler_with(vec![
            snap("running", aggregate(10, Some(0))),
            snap("running", aggregate(10, Some(2))),
        ]);
        for _ in 0..2 {
            let outcome = scheduler.tick(&mut NullNotifier).unwrap();
            assert_eq!(outcome.label(), "applied");
        }
        assert_eq!(xs(&scheduler, "running", "current_rps"), vec![10.0, 10.0]);
        assert_eq!(
            scheduler.store().snapshot_view("running", "num_failures"),
            Some(vec![(10.0, 0.0), (10.0, 2.0)])
        );
        assert_eq!(scheduler.stats().skipped(), 0);
    }

    #[test]
    fn transport_failure_leaves_store_untouched() {
        let (mut scheduler, rx) = scheduler_with(vec![
            snap("running", aggregate(10, Some(0))),
            Err(transport_error()),
        ]);
        scheduler.tick(&mut NullNotifier).unwrap();
        let before = scheduler.store().total_points();
        let before_view = scheduler.store().snapshot_view("running", "avg_response_time");

        let mut dirty = DirtyTracker::default();
        let outcome = scheduler.tick(&mut dirty).unwrap();
        assert!(matches!(outcome, TickOutcome::Skipped { ref code, .. } if code == "LG-2001"));
        assert_eq!(scheduler.store().total_points(), before);
        assert_eq!(
            scheduler.store().snapshot_view("running", "avg_response_time"),
            before_view
        );
        assert!(!dirty.is_dirty());
        assert_eq!(scheduler.stats().skipped_transport, 1);
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        let skipped = rx
            .try_iter()
            .filter(|e| matches!(e, ActivityEvent::TickSkipped { .. }))
            .count();
        assert_eq!(skipped, 1);
    }

    #[test]
    fn malformed_snapshot_is_skipped_without_mutation() {
        let mut bad = aggregate(10, Some(0));
        bad.as_object_mut().unwrap().remove("num_requests");
        let (mut scheduler, _rx) = scheduler_with(vec![
            snap("running", bad),
            Ok(Snapshot {
                phase: "running".to_string(),
                stats: Vec::new(),
            }),
        ]);
        for _ in 0..2 {
            let outcome = scheduler.tick(&mut NullNotifier).unwrap();
            assert_eq!(outcome.label(), "skipped");
        }
        assert_eq!(scheduler.store().total_points(), 0);
        assert_eq!(scheduler.stats().skipped_malformed, 2);
    }

    #[test]
    fn parse_failure_counts_separately() {
        let (mut scheduler, _rx) = scheduler_with(vec![Err(LgError::Parse {
            details: "body is not JSON".to_string(),
        })]);
        scheduler.tick(&mut NullNotifier).unwrap();
        assert_eq!(scheduler.stats().skipped_parse, 1);
        assert_eq!(scheduler.stats().skipped(), 1);
    }

    #[test]
    fn unrecognized_phase_is_ignored() {
        let (mut scheduler, _rx) = scheduler_with(vec![snap("stopped", aggregate(10, Some(0)))]);
        let mut dirty = DirtyTracker::default();
        let outcome = scheduler.tick(&mut dirty).unwrap();
        assert_eq!(
            outcome,
            TickOutcome::Ignored {
                phase: "stopped".to_string()
            }
        );
        assert_eq!(scheduler.store().total_points(), 0);
        assert!(dirty.is_empty());
        assert_eq!(scheduler.reported_phase(), Some("stopped"));
    }

    #[test]
    fn notifier_hears_every_appended_series() {
        let (mut scheduler, _rx) = scheduler_with(vec![snap("hatching", aggregate(3, None))]);
        let mut dirty = DirtyTracker::default();
        scheduler.tick(&mut dirty).unwrap();
        assert_eq!(dirty.len(), 5);
        assert!(dirty.contains("hatching", "current_rps"));
        assert!(!dirty.contains("hatching", "num_failures"));
        let drained = dirty.take();
        assert_eq!(drained.len(), 5);
        assert!(!dirty.is_dirty());
    }

    #[test]
    fn phase_changes_are_logged_once() {
        let (mut scheduler, rx) = scheduler_with(vec![
            snap("hatching", aggregate(1, None)),
            snap("hatching", aggregate(2, None)),
            snap("running", aggregate(3, None)),
        ]);
        for _ in 0..3 {
            scheduler.tick(&mut NullNotifier).unwrap();
        }
        let changes: Vec<(Option<String>, String)> = rx
            .try_iter()
            .filter_map(|e| match e {
                ActivityEvent::PhaseChanged { from, to, .. } => Some((from, to)),
                _ => None,
            })
            .collect();
        assert_eq!(
            changes,
            vec![
                (None, "hatching".to_string()),
                (Some("hatching".to_string()), "running".to_string()),
            ]
        );
    }

    #[test]
    fn start_and_stop_events_carry_totals() {
        let (mut scheduler, rx) = scheduler_with(vec![snap("running", aggregate(5, Some(0)))]);
        scheduler.log_start("abc123");
        scheduler.tick(&mut NullNotifier).unwrap();
        scheduler.log_stop("ticks exhausted");
        let events: Vec<ActivityEvent> = rx.try_iter().collect();
        assert!(matches!(
            events.first(),
            Some(ActivityEvent::DashboardStarted { config_hash, .. }) if config_hash == "abc123"
        ));
        assert!(matches!(
            events.last(),
            Some(ActivityEvent::DashboardStopped { ticks: 1, points: 6, .. })
        ));
    }

    #[test]
    fn run_headless_honors_tick_limit() {
        let (mut scheduler, _rx) = scheduler_with(vec![
            snap("running", aggregate(10, Some(0))),
            Err(transport_error()),
            snap("running", aggregate(30, Some(0))),
        ]);
        let mut ticker = Ticker::new(Duration::from_millis(1));
        let mut labels = Vec::new();
        let completed = scheduler
            .run_headless(&mut ticker, Some(3), || false, |_, outcome| {
                labels.push(outcome.label());
                Ok(())
            })
            .unwrap();
        assert_eq!(completed, 3);
        assert_eq!(labels, vec!["applied", "skipped", "applied"]);
        assert_eq!(xs(&scheduler, "running", "current_rps"), vec![10.0, 30.0]);
    }

    #[test]
    fn run_headless_stops_on_request() {
        let (mut scheduler, _rx) = scheduler_with(Vec::new());
        let mut ticker = Ticker::new(Duration::from_secs(60));
        let completed = scheduler
            .run_headless(&mut ticker, None, || true, |_, _| Ok(()))
            .unwrap();
        assert_eq!(completed, 0);
    }

    #[test]
    fn ticker_fires_once_per_interval() {
        let start = Instant::now();
        let interval = Duration::from_millis(1_000);
        let mut ticker = Ticker::starting_at(interval, start);
        assert!(ticker.fire(start));
        assert!(!ticker.fire(start + Duration::from_millis(999)));
        assert_eq!(
            ticker.until_due(start + Duration::from_millis(400)),
            Duration::from_millis(600)
        );
        assert!(ticker.fire(start + interval));
    }

    #[test]
    fn overrun_delays_instead_of_bursting() {
        let start = Instant::now();
        let interval = Duration::from_millis(1_000);
        let mut ticker = Ticker::starting_at(interval, start);
        assert!(ticker.fire(start));

        // The tick handler ran for 3.5 intervals.
        let late = start + Duration::from_millis(3_500);
        assert!(ticker.fire(late));
        assert!(!ticker.fire(late));
        assert!(!ticker.is_due(late + Duration::from_millis(999)));
        assert!(ticker.is_due(late + interval));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn non_skip_null_series_grow_in_lockstep(
            steps in proptest::collection::vec(
                (any::<bool>(), proptest::option::of(0_u64..50), any::<bool>(), -10_i64..=10),
                1..30,
            ),
        ) {
            // Counts may repeat or fall, as after a stats reset.
            let mut count = 0_u64;
            let script: Vec<Result<Snapshot>> = steps
                .iter()
                .map(|(ok, failures, running, delta)| {
                    count = count.saturating_add_signed(*delta);
                    if *ok {
                        snap(if *running { "running" } else { "hatching" }, aggregate(count, *failures))
                    } else {
                        Err(transport_error())
                    }
                })
                .collect();
            let (mut scheduler, _rx) = scheduler_with(script);

            for _ in 0..steps.len() {
                let before = scheduler.store().total_points();
                let outcome = scheduler.tick(&mut NullNotifier).unwrap();
                let grown = scheduler.store().total_points() - before;
                match outcome {
                    TickOutcome::Applied { points, .. } => prop_assert_eq!(grown, points),
                    _ => prop_assert_eq!(grown, 0),
                }
                prop_assert!(grown <= 6);
            }

            for phase in ["hatching", "running"] {
                let reference = scheduler.store().series_len(phase, "current_rps").unwrap();
                for key in ["avg_response_time", "median_response_time", "min_response_time", "max_response_time"] {
                    prop_assert_eq!(scheduler.store().series_len(phase, key), Some(reference));
                }
                let failures = scheduler.store().series_len(phase, "num_failures").unwrap();
                prop_assert!(failures <= reference);

                let xs = xs(&scheduler, phase, "current_rps");
                prop_assert!(xs.windows(2).all(|w| w[0] <= w[1]));
            }
        }
    }
}
