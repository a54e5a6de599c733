#![forbid(unsafe_code)]

//! loadgraph: live charts for a running load test.
//!
//! A fixed-cadence scheduler polls a Locust-style `/stats/requests` endpoint,
//! routes the aggregate row of each snapshot into per-phase append-only
//! series, and tells the renderer which series changed.
//!
//! 1. **Chart registry** declares phases, figure groups and metric series
//! 2. **Series store** owns the (x, y) buffers, created once at startup
//! 3. **Fetcher + router** turn one HTTP snapshot into append instructions
//! 4. **Update scheduler** drives one tick per interval and survives bad ticks
//!
//! # Library usage
//!
//! ```rust,no_run
//! use loadgraph::prelude::*;
//!
//! let config = Config::load(None)?;
//! let mut scheduler = UpdateScheduler::from_config(&config, ActivityLoggerHandle::disabled())?;
//! let outcome = scheduler.tick(&mut NullNotifier)?;
//! println!("{}", outcome.label());
//! # Ok::<(), LgError>(())
//! ```

pub mod prelude;

pub mod chart;
pub mod core;
pub mod daemon;
pub mod logger;
pub mod monitor;
#[cfg(feature = "tui")]
pub mod tui;
