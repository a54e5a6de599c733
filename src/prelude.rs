//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use loadgraph::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{LgError, Result};

// Chart
pub use crate::chart::registry::{ChartColor, ChartGroup, ChartRegistry, Marker, MetricSpec, Phase};
pub use crate::chart::series::{AppendInstruction, Series, SeriesHandle, SeriesStore};

// Monitor
pub use crate::monitor::fetcher::{HttpStatsFetcher, Snapshot, StatsSource, parse_snapshot};
pub use crate::monitor::router::{AggregateLocator, SnapshotRouter};

// Scheduling
pub use crate::daemon::scheduler::{
    ChangeNotifier, DirtyTracker, NullNotifier, TickOutcome, TickStats, Ticker, UpdateScheduler,
};

// Logging
pub use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle, spawn_logger};
pub use crate::logger::jsonl::JsonlConfig;
