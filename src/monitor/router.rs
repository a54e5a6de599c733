//! Snapshot router: turns one snapshot into ordered append instructions.
//!
//! Routing is pure. It never touches the series store, so the same snapshot
//! always yields the same instructions and a rejected snapshot cannot leave a
//! partial update behind.

#![allow(missing_docs)]

use serde_json::{Map, Value};

use crate::chart::registry::ChartRegistry;
use crate::chart::series::AppendInstruction;
use crate::core::config::{AggregateMode, SourceConfig};
use crate::core::errors::{LgError, Result};
use crate::monitor::fetcher::{Snapshot, json_kind};

/// How the aggregate record is found inside `stats`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateLocator {
    /// Final element of the list.
    Last,
    /// Entry whose `field` equals `name`.
    Named { field: String, name: String },
}

impl AggregateLocator {
    fn locate<'a>(&self, stats: &'a [Value]) -> Result<&'a Map<String, Value>> {
        match self {
            Self::Last => {
                let entry = stats.last().ok_or_else(|| LgError::MalformedSnapshot {
                    details: "stats list is empty".to_string(),
                })?;
                entry.as_object().ok_or_else(|| LgError::MalformedSnapshot {
                    details: format!("aggregate entry is {}, not an object", json_kind(entry)),
                })
            }
            Self::Named { field, name } => stats
                .iter()
                .filter_map(Value::as_object)
                .find(|entry| entry.get(field).and_then(Value::as_str) == Some(name.as_str()))
                .ok_or_else(|| LgError::MalformedSnapshot {
                    details: format!("no stats entry with {field} = {name:?}"),
                }),
        }
    }
}

/// Phase filter plus per-metric extraction.
#[derive(Debug, Clone)]
pub struct SnapshotRouter {
    locator: AggregateLocator,
    requests_key: String,
}

impl SnapshotRouter {
    #[must_use]
    pub fn new(locator: AggregateLocator, requests_key: impl Into<String>) -> Self {
        Self {
            locator,
            requests_key: requests_key.into(),
        }
    }

    #[must_use]
    pub fn from_config(cfg: &SourceConfig) -> Self {
        let locator = match cfg.aggregate {
            AggregateMode::Last => AggregateLocator::Last,
            AggregateMode::Named => AggregateLocator::Named {
                field: cfg.aggregate_name_field.clone(),
                name: cfg.aggregate_name.clone(),
            },
        };
        Self::new(locator, cfg.requests_key.clone())
    }

    #[must_use]
    pub fn requests_key(&self) -> &str {
        &self.requests_key
    }

    /// Produce the append instructions for one snapshot.
    ///
    /// An unrecognized phase yields no instructions. A missing aggregate or
    /// request counter rejects the whole snapshot.
    pub fn route(
        &self,
        snapshot: &Snapshot,
        registry: &ChartRegistry,
    ) -> Result<Vec<AppendInstruction>> {
        let Some(phase) = registry.phase(&snapshot.phase) else {
            return Ok(Vec::new());
        };

        let aggregate = self.locator.locate(&snapshot.stats)?;
        let x = match aggregate.get(&self.requests_key) {
            Some(value) => value.as_f64().ok_or_else(|| LgError::MalformedSnapshot {
                details: format!(
                    "{:?} is {}, not a number",
                    self.requests_key,
                    json_kind(value)
                ),
            })?,
            None => {
                return Err(LgError::MalformedSnapshot {
                    details: format!("aggregate has no {:?}", self.requests_key),
                });
            }
        };

        let instructions = registry
            .metrics_for(phase.as_str())
            .filter_map(|metric| {
                // Non-numeric values are treated like null.
                let y = match aggregate.get(&metric.key).and_then(Value::as_f64) {
                    Some(y) => y,
                    None if metric.skip_null => return None,
                    None => 0.0,
                };
                Some(AppendInstruction {
                    phase: phase.clone(),
                    metric_key: metric.key.clone(),
                    x,
                    y,
                })
            })
            .collect();
        Ok(instructions)
    }
}
