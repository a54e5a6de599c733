//! Series store: append-only (x, y) buffers keyed by (phase, metric key).
//!
//! Each series lives behind a shared [`SeriesHandle`] so every display facet
//! (marker glyphs, connecting line, legend value) reads the same buffer. The
//! store is the only writer; X and Y are extended together under one write
//! lock, so a reader never observes `|X| != |Y|`. X never decreases: a
//! point whose x is below the series' last x is refused.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::chart::registry::{ChartRegistry, Phase};
use crate::core::errors::{LgError, Result};

/// One point to append, produced by the snapshot router.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppendInstruction {
    pub phase: Phase,
    pub metric_key: String,
    pub x: f64,
    pub y: f64,
}

/// Two equal-length ordered sequences backing one chart line.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Series {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl Series {
    fn push(&mut self, x: f64, y: f64) {
        self.xs.push(x);
        self.ys.push(y);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    #[must_use]
    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    #[must_use]
    pub fn ys(&self) -> &[f64] {
        &self.ys
    }

    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.xs.iter().copied().zip(self.ys.iter().copied())
    }

    #[must_use]
    pub fn last(&self) -> Option<(f64, f64)> {
        Some((*self.xs.last()?, *self.ys.last()?))
    }
}

/// Shared, lock-protected handle to one series.
pub type SeriesHandle = Arc<RwLock<Series>>;

/// Owner of every series buffer for the lifetime of the process.
#[derive(Debug, Default)]
pub struct SeriesStore {
    series: HashMap<Phase, HashMap<String, SeriesHandle>>,
    seed_origin: bool,
}

impl SeriesStore {
    #[must_use]
    pub fn new(seed_origin: bool) -> Self {
        Self {
            series: HashMap::new(),
            seed_origin,
        }
    }

    /// Create every (phase, metric) series the registry describes.
    #[must_use]
    pub fn from_registry(registry: &ChartRegistry) -> Self {
        let mut store = Self::new(registry.seed_origin());
        for phase in registry.phases() {
            for metric in registry.metrics_for(phase.as_str()) {
                store.ensure(phase, &metric.key);
            }
        }
        store
    }

    /// Idempotent creation of the backing buffer.
    pub fn ensure(&mut self, phase: &Phase, metric_key: &str) -> SeriesHandle {
        let seed_origin = self.seed_origin;
        let per_phase = self.series.entry(phase.clone()).or_default();
        if let Some(existing) = per_phase.get(metric_key) {
            return Arc::clone(existing);
        }
        let mut series = Series::default();
        if seed_origin {
            series.push(0.0, 0.0);
        }
        let handle = Arc::new(RwLock::new(series));
        per_phase.insert(metric_key.to_string(), Arc::clone(&handle));
        handle
    }

    /// Append one point. Fails if the pair was never ensured or if `x` is
    /// below the series' last x.
    pub fn append(&mut self, phase: &str, metric_key: &str, x: f64, y: f64) -> Result<()> {
        let handle = self.lookup(phase, metric_key)?;
        let mut series = handle.write();
        check_order(phase, metric_key, series.last().map(|(last_x, _)| last_x), x)?;
        series.push(x, y);
        Ok(())
    }

    /// Apply a routed batch in order.
    ///
    /// Every instruction is resolved and order-checked before the first
    /// append, so a batch that names an unknown series or moves any x
    /// backwards leaves the store untouched.
    pub fn apply(&mut self, instructions: &[AppendInstruction]) -> Result<usize> {
        let handles = instructions
            .iter()
            .map(|ins| self.lookup(ins.phase.as_str(), &ins.metric_key))
            .collect::<Result<Vec<_>>>()?;

        // Last x per series as the batch would leave it.
        let mut pending: HashMap<(&str, &str), f64> = HashMap::new();
        for (handle, ins) in handles.iter().zip(instructions) {
            let key = (ins.phase.as_str(), ins.metric_key.as_str());
            let last_x = match pending.get(&key) {
                Some(&x) => Some(x),
                None => handle.read().last().map(|(x, _)| x),
            };
            check_order(key.0, key.1, last_x, ins.x)?;
            pending.insert(key, ins.x);
        }

        for (handle, ins) in handles.iter().zip(instructions) {
            handle.write().push(ins.x, ins.y);
        }
        Ok(instructions.len())
    }

    /// Copy of the points, taken under the read lock.
    #[must_use]
    pub fn snapshot_view(&self, phase: &str, metric_key: &str) -> Option<Vec<(f64, f64)>> {
        let handle = self.handle(phase, metric_key)?;
        let series = handle.read();
        Some(series.points().collect())
    }

    #[must_use]
    pub fn handle(&self, phase: &str, metric_key: &str) -> Option<SeriesHandle> {
        self.series.get(phase)?.get(metric_key).map(Arc::clone)
    }

    #[must_use]
    pub fn contains(&self, phase: &str, metric_key: &str) -> bool {
        self.series
            .get(phase)
            .is_some_and(|per_phase| per_phase.contains_key(metric_key))
    }

    #[must_use]
    pub fn series_len(&self, phase: &str, metric_key: &str) -> Option<usize> {
        self.handle(phase, metric_key).map(|h| h.read().len())
    }

    /// Every (phase, key) pair, sorted for stable diagnostics output.
    #[must_use]
    pub fn keys(&self) -> Vec<(Phase, String)> {
        let mut keys: Vec<(Phase, String)> = self
            .series
            .iter()
            .flat_map(|(phase, per_phase)| {
                per_phase.keys().map(move |key| (phase.clone(), key.clone()))
            })
            .collect();
        keys.sort();
        keys
    }

    /// Number of series (not points).
    #[must_use]
    pub fn len(&self) -> usize {
        self.series.values().map(HashMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn total_points(&self) -> usize {
        self.series
            .values()
            .flat_map(HashMap::values)
            .map(|h| h.read().len())
            .sum()
    }

    fn lookup(&self, phase: &str, metric_key: &str) -> Result<SeriesHandle> {
        self.handle(phase, metric_key)
            .ok_or_else(|| LgError::UnknownSeries {
                phase: phase.to_string(),
                metric_key: metric_key.to_string(),
            })
    }
}

fn check_order(phase: &str, metric_key: &str, last_x: Option<f64>, x: f64) -> Result<()> {
    match last_x {
        Some(last_x) if x < last_x => Err(LgError::CounterRegressed {
            phase: phase.to_string(),
            metric_key: metric_key.to_string(),
            last_x,
            x,
        }),
        _ => Ok(()),
    }
}
