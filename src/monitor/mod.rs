//! Stats acquisition: endpoint fetching and snapshot-to-series routing.

pub mod fetcher;
pub mod router;
