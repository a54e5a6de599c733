//! Terminal dashboard: a grid of live charts drawn with crossterm.

#![allow(missing_docs)]

pub mod layout;
pub mod plot;
pub mod render;
pub mod runtime;
pub mod terminal_guard;
pub mod theme;

pub use runtime::{DashboardRuntimeConfig, StopReason, run_dashboard};
