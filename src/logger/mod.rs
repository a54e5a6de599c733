//! Activity logging: JSONL writer with rotation and fallback, fed by a logger thread.

pub mod activity;
pub mod jsonl;
