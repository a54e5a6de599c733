//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::chart::registry::{ChartColor, ChartRegistry, Marker};
use crate::core::errors::{LgError, Result};

/// Full loadgraph configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub schedule: ScheduleConfig,
    pub chart: ChartConfig,
    pub paths: PathsConfig,
}

/// Where and how the statistics snapshot is fetched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SourceConfig {
    /// Load generator JSON stats endpoint.
    pub url: String,
    /// Aggregate field carrying the monotonic request counter (the x axis).
    pub requests_key: String,
    /// Upper bound on one GET, connect included.
    pub timeout_ms: u64,
    /// How the aggregate record is located inside `stats`.
    pub aggregate: AggregateMode,
    /// Field compared against `aggregate_name` when `aggregate = "named"`.
    pub aggregate_name_field: String,
    /// Reserved route name of the aggregate entry when `aggregate = "named"`.
    pub aggregate_name: String,
}

/// Aggregate record lookup strategy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AggregateMode {
    /// Last element of the `stats` list.
    #[default]
    Last,
    /// Entry whose name field equals the configured reserved name.
    Named,
}

/// Update cadence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScheduleConfig {
    pub poll_interval_ms: u64,
}

/// Phases, figure layout and plotted metrics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChartConfig {
    /// Recognized load-test phases; a figure set is drawn for each.
    pub phases: Vec<String>,
    /// Figures per dashboard row.
    pub columns: usize,
    /// Start every series at (0, 0).
    pub seed_origin: bool,
    /// Figures drawn for every phase, in order.
    pub groups: Vec<ChartGroupConfig>,
}

/// One figure: metrics sharing an axis pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChartGroupConfig {
    /// Title template; `{}` is replaced by the capitalized phase.
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub xlabel: String,
    #[serde(default)]
    pub ylabel: String,
    pub metrics: Vec<MetricConfig>,
}

/// One plotted quantity. `key` is mandatory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetricConfig {
    pub key: String,
    #[serde(default)]
    pub color: ChartColor,
    #[serde(default)]
    pub marker: Marker,
    /// Legend text; falls back to `key`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legend: Option<String>,
    /// Omit the point instead of zero-filling when the value is missing or null.
    #[serde(default)]
    pub skip_null: bool,
}

/// Filesystem paths used by loadgraph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub jsonl_log: PathBuf,
}

fn default_title() -> String {
    "{}".to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8089/stats/requests".to_string(),
            requests_key: "num_requests".to_string(),
            timeout_ms: 750,
            aggregate: AggregateMode::Last,
            aggregate_name_field: "name".to_string(),
            aggregate_name: "Aggregated".to_string(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
        }
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            phases: vec!["hatching".to_string(), "running".to_string()],
            columns: 2,
            seed_origin: false,
            groups: vec![
                ChartGroupConfig {
                    title: "{} response times".to_string(),
                    xlabel: "Requests count".to_string(),
                    ylabel: "Milliseconds".to_string(),
                    metrics: vec![
                        MetricConfig::new(
                            "avg_response_time",
                            ChartColor::Black,
                            Marker::Diamond,
                            "average response time",
                        ),
                        MetricConfig::new(
                            "median_response_time",
                            ChartColor::Blue,
                            Marker::Triangle,
                            "median response time",
                        ),
                        MetricConfig::new(
                            "min_response_time",
                            ChartColor::Green,
                            Marker::InvertedTriangle,
                            "min response time",
                        ),
                        MetricConfig::new(
                            "max_response_time",
                            ChartColor::Red,
                            Marker::Circle,
                            "max response time",
                        ),
                    ],
                },
                ChartGroupConfig {
                    title: "{} RPS/Failures".to_string(),
                    xlabel: "Requests count".to_string(),
                    ylabel: "RPS/Failures count".to_string(),
                    metrics: vec![
                        MetricConfig::new(
                            "current_rps",
                            ChartColor::Green,
                            Marker::Circle,
                            "current rps",
                        ),
                        MetricConfig::new("num_failures", ChartColor::Red, Marker::Cross, "failures")
                            .skipping_null(),
                    ],
                },
            ],
        }
    }
}

impl MetricConfig {
    #[must_use]
    pub fn new(key: &str, color: ChartColor, marker: Marker, legend: &str) -> Self {
        Self {
            key: key.to_string(),
            color,
            marker,
            legend: Some(legend.to_string()),
            skip_null: false,
        }
    }

    #[must_use]
    pub fn skipping_null(mut self) -> Self {
        self.skip_null = true;
        self
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!("[LG-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths");
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        Self {
            config_file: home_dir
                .join(".config")
                .join("loadgraph")
                .join("config.toml"),
            jsonl_log: home_dir
                .join(".local")
                .join("share")
                .join("loadgraph")
                .join("activity.jsonl"),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| LgError::Io {
                path: path_buf.clone(),
                source,
            })?;
            Self::from_toml_str(&raw)?
        } else if path.is_some() {
            return Err(LgError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML document without env overrides or validation.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Poll interval as a `Duration`.
    #[must_use]
    pub const fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.schedule.poll_interval_ms)
    }

    /// Deterministic hash of the effective config for the activity log.
    ///
    /// FNV-1a over the canonical JSON so the value is stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("LG_SOURCE_URL") {
            self.source.url = raw;
        }
        if let Some(raw) = lookup("LG_SOURCE_REQUESTS_KEY") {
            self.source.requests_key = raw;
        }
        if let Some(raw) = lookup("LG_SOURCE_TIMEOUT_MS") {
            self.source.timeout_ms = parse_env_u64("LG_SOURCE_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = lookup("LG_SCHEDULE_POLL_INTERVAL_MS") {
            self.schedule.poll_interval_ms = parse_env_u64("LG_SCHEDULE_POLL_INTERVAL_MS", &raw)?;
        }
        if let Some(raw) = lookup("LG_CHART_COLUMNS") {
            self.chart.columns = parse_env_usize("LG_CHART_COLUMNS", &raw)?;
        }
        if let Some(raw) = lookup("LG_CHART_SEED_ORIGIN") {
            self.chart.seed_origin = parse_env_bool("LG_CHART_SEED_ORIGIN", &raw)?;
        }
        if let Some(raw) = lookup("LG_PATHS_JSONL_LOG") {
            self.paths.jsonl_log = PathBuf::from(raw);
        }
        Ok(())
    }

    /// Check every startup invariant. Any failure here aborts before the first tick.
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.source.url).map_err(|e| {
            LgError::invalid_config(format!("source.url {:?} is not a URL: {e}", self.source.url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(LgError::invalid_config(format!(
                "source.url must use http or https, got {:?}",
                url.scheme()
            )));
        }

        if self.source.requests_key.trim().is_empty() {
            return Err(LgError::invalid_config("source.requests_key must not be empty"));
        }

        if self.source.timeout_ms == 0 {
            return Err(LgError::invalid_config("source.timeout_ms must be > 0"));
        }

        if self.source.aggregate == AggregateMode::Named
            && (self.source.aggregate_name.is_empty() || self.source.aggregate_name_field.is_empty())
        {
            return Err(LgError::invalid_config(
                "source.aggregate = \"named\" requires aggregate_name and aggregate_name_field",
            ));
        }

        if self.schedule.poll_interval_ms == 0 {
            return Err(LgError::invalid_config("schedule.poll_interval_ms must be > 0"));
        }

        if self.source.timeout_ms >= self.schedule.poll_interval_ms {
            return Err(LgError::invalid_config(format!(
                "source.timeout_ms ({}) must be below schedule.poll_interval_ms ({})",
                self.source.timeout_ms, self.schedule.poll_interval_ms
            )));
        }

        if !(1..=4).contains(&self.chart.columns) {
            return Err(LgError::invalid_config(format!(
                "chart.columns must be in [1, 4], got {}",
                self.chart.columns
            )));
        }

        ChartRegistry::validate_config(&self.chart)
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_u64(name: &str, raw: &str) -> Result<u64> {
    raw.parse::<u64>().map_err(|error| LgError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

fn parse_env_usize(name: &str, raw: &str) -> Result<usize> {
    raw.parse::<usize>().map_err(|error| LgError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    raw.parse::<bool>().map_err(|error| LgError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}
