//! Chart registry: recognized phases, figure groups and per-metric display hints.
//!
//! Built once from [`ChartConfig`] and never mutated afterwards. Every
//! recognized phase gets the same ordered group list; only the figure title
//! is phase-parameterized.

#![allow(missing_docs)]

use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::config::{ChartConfig, ChartGroupConfig, MetricConfig};
use crate::core::errors::{LgError, Result};

// ──────────────────── phase ────────────────────

/// A recognized stage of the observed load test (e.g. `hatching`, `running`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Phase(String);

impl Phase {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First letter upper-cased, used in figure titles.
    #[must_use]
    pub fn title_case(&self) -> String {
        let mut chars = self.0.chars();
        chars.next().map_or_else(String::new, |first| {
            first.to_uppercase().chain(chars).collect()
        })
    }
}

impl Borrow<str> for Phase {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ──────────────────── display hints ────────────────────

/// Glyph drawn at each data point of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Marker {
    #[default]
    Circle,
    Diamond,
    Triangle,
    InvertedTriangle,
    Square,
    Cross,
    X,
    Asterisk,
}

impl Marker {
    #[must_use]
    pub const fn glyph(self) -> char {
        match self {
            Self::Circle => '●',
            Self::Diamond => '◆',
            Self::Triangle => '▲',
            Self::InvertedTriangle => '▼',
            Self::Square => '■',
            Self::Cross => '✚',
            Self::X => '✖',
            Self::Asterisk => '✱',
        }
    }
}

/// Named series color. Mapped to terminal colors by the dashboard theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartColor {
    #[default]
    Black,
    Blue,
    Green,
    Red,
    Yellow,
    Orange,
    Magenta,
    Purple,
    Cyan,
    Grey,
    White,
}

// ──────────────────── specs ────────────────────

/// Static description of one plotted quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSpec {
    pub key: String,
    pub color: ChartColor,
    pub marker: Marker,
    pub legend: String,
    pub skip_null: bool,
}

impl From<&MetricConfig> for MetricSpec {
    fn from(cfg: &MetricConfig) -> Self {
        Self {
            key: cfg.key.clone(),
            color: cfg.color,
            marker: cfg.marker,
            legend: cfg.legend.clone().unwrap_or_else(|| cfg.key.clone()),
            skip_null: cfg.skip_null,
        }
    }
}

/// Metrics sharing one axis pair; rendered as one figure per phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartGroup {
    pub title_template: String,
    pub xlabel: String,
    pub ylabel: String,
    pub metrics: Vec<MetricSpec>,
}

impl ChartGroup {
    /// Title with `{}` replaced by the capitalized phase name.
    #[must_use]
    pub fn title_for(&self, phase: &Phase) -> String {
        self.title_template.replace("{}", &phase.title_case())
    }
}

impl From<&ChartGroupConfig> for ChartGroup {
    fn from(cfg: &ChartGroupConfig) -> Self {
        Self {
            title_template: cfg.title.clone(),
            xlabel: cfg.xlabel.clone(),
            ylabel: cfg.ylabel.clone(),
            metrics: cfg.metrics.iter().map(MetricSpec::from).collect(),
        }
    }
}

// ──────────────────── registry ────────────────────

/// Immutable phase → figure layout lookup.
#[derive(Debug, Clone)]
pub struct ChartRegistry {
    phases: Vec<Phase>,
    groups: Vec<ChartGroup>,
    columns: usize,
    seed_origin: bool,
}

impl ChartRegistry {
    /// Build the registry, rejecting malformed layouts.
    pub fn from_config(cfg: &ChartConfig) -> Result<Self> {
        Self::validate_config(cfg)?;
        Ok(Self {
            phases: cfg.phases.iter().map(Phase::new).collect(),
            groups: cfg.groups.iter().map(ChartGroup::from).collect(),
            columns: cfg.columns.max(1),
            seed_origin: cfg.seed_origin,
        })
    }

    /// Structural checks shared with `Config::validate`.
    pub fn validate_config(cfg: &ChartConfig) -> Result<()> {
        if cfg.phases.is_empty() {
            return Err(LgError::invalid_config("chart.phases must not be empty"));
        }
        let mut seen_phases = HashSet::new();
        for phase in &cfg.phases {
            if phase.trim().is_empty() {
                return Err(LgError::invalid_config("chart.phases entries must not be empty"));
            }
            if !seen_phases.insert(phase.as_str()) {
                return Err(LgError::invalid_config(format!(
                    "chart.phases lists {phase:?} more than once"
                )));
            }
        }

        if cfg.groups.is_empty() {
            return Err(LgError::invalid_config("chart.groups must not be empty"));
        }

        // Series are keyed by (phase, key) and every phase shares the group
        // list, so a key may appear only once across all groups.
        let mut seen_keys = HashSet::new();
        for (idx, group) in cfg.groups.iter().enumerate() {
            if group.metrics.is_empty() {
                return Err(LgError::invalid_config(format!(
                    "chart.groups[{idx}] ({:?}) has no metrics",
                    group.title
                )));
            }
            for metric in &group.metrics {
                if metric.key.trim().is_empty() {
                    return Err(LgError::invalid_config(format!(
                        "chart.groups[{idx}] has a metric with an empty key"
                    )));
                }
                if !seen_keys.insert(metric.key.as_str()) {
                    return Err(LgError::invalid_config(format!(
                        "metric key {:?} is configured more than once for the same phase",
                        metric.key
                    )));
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    #[must_use]
    pub fn phase(&self, name: &str) -> Option<&Phase> {
        self.phases.iter().find(|p| p.as_str() == name)
    }

    #[must_use]
    pub fn is_recognized(&self, name: &str) -> bool {
        self.phase(name).is_some()
    }

    /// Ordered groups for a phase; empty when the phase is not recognized.
    #[must_use]
    pub fn groups_for(&self, name: &str) -> &[ChartGroup] {
        if self.is_recognized(name) {
            &self.groups
        } else {
            &[]
        }
    }

    /// Every metric of a phase, in group order.
    pub fn metrics_for<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a MetricSpec> + use<'a> {
        self.groups_for(name).iter().flat_map(|g| g.metrics.iter())
    }

    /// Figures in display order: phase-major, then group order.
    pub fn figures(&self) -> impl Iterator<Item = (&Phase, &ChartGroup)> + '_ {
        self.phases
            .iter()
            .flat_map(move |phase| self.groups.iter().map(move |group| (phase, group)))
    }

    #[must_use]
    pub fn figure_count(&self) -> usize {
        self.phases.len() * self.groups.len()
    }

    #[must_use]
    pub const fn columns(&self) -> usize {
        self.columns
    }

    #[must_use]
    pub const fn seed_origin(&self) -> bool {
        self.seed_origin
    }
}
