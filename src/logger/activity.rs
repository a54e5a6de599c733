//! Activity logger: a dedicated thread owns the [`JsonlWriter`].
//!
//! The update loop sends [`ActivityEvent`]s through a bounded crossbeam
//! channel. `send` uses `try_send`, so a slow disk can cost log lines but never
//! a tick; dropped events are counted and reported on the next line written.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::core::errors::{LgError, Result};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

const CHANNEL_CAPACITY: usize = 256;

/// Events written to the activity log.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityEvent {
    DashboardStarted {
        version: String,
        url: String,
        config_hash: String,
    },
    DashboardStopped {
        reason: String,
        ticks: u64,
        points: u64,
        uptime_secs: u64,
    },
    TickSkipped {
        tick: u64,
        url: String,
        code: String,
        message: String,
        duration_ms: u64,
    },
    PhaseChanged {
        from: Option<String>,
        to: String,
        tick: u64,
    },
    Error {
        code: String,
        message: String,
    },
    /// Ask the logger thread to flush and exit.
    Shutdown,
}

impl ActivityEvent {
    /// Error event from a library error.
    #[must_use]
    pub fn error(err: &LgError) -> Self {
        Self::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Cloneable, non-blocking sender side of the activity log.
#[derive(Debug, Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl ActivityLoggerHandle {
    /// A handle plus the raw receiving end, for callers that drain it themselves.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, Receiver<ActivityEvent>) {
        let (tx, rx) = bounded(capacity.max(1));
        let handle = Self {
            tx,
            dropped_events: Arc::new(AtomicU64::new(0)),
        };
        (handle, rx)
    }

    /// A handle whose events go nowhere.
    #[must_use]
    pub fn disabled() -> Self {
        let (handle, _rx) = Self::channel(1);
        handle
    }

    /// Queue an event. Never blocks; a full queue drops the event.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Ask the logger thread to flush and exit. Blocks only until queued.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }
}

/// Start the logger thread writing to `config.path`.
pub fn spawn_logger(config: JsonlConfig) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let (handle, rx) = ActivityLoggerHandle::channel(CHANNEL_CAPACITY);
    let dropped = Arc::clone(&handle.dropped_events);
    let join = thread::Builder::new()
        .name("lg-logger".to_string())
        .spawn(move || logger_thread_main(&rx, config, &dropped))
        .map_err(|e| LgError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;
    Ok((handle, join))
}

fn logger_thread_main(rx: &Receiver<ActivityEvent>, config: JsonlConfig, dropped: &AtomicU64) {
    let mut jsonl = JsonlWriter::open(config);
    while let Ok(event) = rx.recv() {
        let lost = dropped.swap(0, Ordering::Relaxed);
        if lost > 0 {
            let mut warn = LogEntry::new(EventType::Error, Severity::Warning);
            warn.details = Some(format!("{lost} activity events dropped under back-pressure"));
            jsonl.write_entry(&warn);
        }
        if event == ActivityEvent::Shutdown {
            break;
        }
        jsonl.write_entry(&to_log_entry(&event));
    }
    jsonl.fsync();
}

/// Map an event to its JSONL line.
#[must_use]
pub fn to_log_entry(event: &ActivityEvent) -> LogEntry {
    match event {
        ActivityEvent::DashboardStarted {
            version,
            url,
            config_hash,
        } => LogEntry {
            url: Some(url.clone()),
            config_hash: Some(config_hash.clone()),
            details: Some(format!("version={version}")),
            ..LogEntry::new(EventType::DashboardStart, Severity::Info)
        },
        ActivityEvent::DashboardStopped {
            reason,
            ticks,
            points,
            uptime_secs,
        } => LogEntry {
            tick: Some(*ticks),
            points: Some(*points),
            duration_ms: Some(uptime_secs.saturating_mul(1000)),
            details: Some(format!("reason={reason}")),
            ..LogEntry::new(EventType::DashboardStop, Severity::Info)
        },
        ActivityEvent::TickSkipped {
            tick,
            url,
            code,
            message,
            duration_ms,
        } => LogEntry {
            tick: Some(*tick),
            url: Some(url.clone()),
            error_code: Some(code.clone()),
            error_message: Some(message.clone()),
            duration_ms: Some(*duration_ms),
            ..LogEntry::new(EventType::TickSkipped, Severity::Warning)
        },
        ActivityEvent::PhaseChanged { from, to, tick } => LogEntry {
            phase: Some(to.clone()),
            previous_phase: from.clone(),
            tick: Some(*tick),
            ..LogEntry::new(EventType::PhaseChange, Severity::Info)
        },
        ActivityEvent::Error { code, message } => LogEntry {
            error_code: Some(code.clone()),
            error_message: Some(message.clone()),
            ..LogEntry::new(EventType::Error, Severity::Critical)
        },
        ActivityEvent::Shutdown => {
            let mut entry = LogEntry::new(EventType::DashboardStop, Severity::Info);
            entry.details = Some("logger shutdown".to_string());
            entry
        }
    }
}
