//! Update loop plumbing: fixed-interval scheduler and signal handling.

pub mod scheduler;
#[cfg(feature = "daemon")]
pub mod signals;
