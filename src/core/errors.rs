//! LG-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, LgError>;

/// Top-level error type for loadgraph.
#[derive(Debug, Error)]
pub enum LgError {
    #[error("[LG-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[LG-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[LG-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[LG-2001] transport failure for {url}: {details}")]
    Transport { url: String, details: String },

    #[error("[LG-2002] stats body parse failure: {details}")]
    Parse { details: String },

    #[error("[LG-2003] malformed snapshot: {details}")]
    MalformedSnapshot { details: String },

    #[error(
        "[LG-2004] request count went backwards for ({phase}, {metric_key}): {x} after {last_x}"
    )]
    CounterRegressed {
        phase: String,
        metric_key: String,
        last_x: f64,
        x: f64,
    },

    #[error("[LG-3001] unknown series ({phase}, {metric_key})")]
    UnknownSeries { phase: String, metric_key: String },

    #[error("[LG-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[LG-3003] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[LG-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl LgError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "LG-1001",
            Self::MissingConfig { .. } => "LG-1002",
            Self::ConfigParse { .. } => "LG-1003",
            Self::Transport { .. } => "LG-2001",
            Self::Parse { .. } => "LG-2002",
            Self::MalformedSnapshot { .. } => "LG-2003",
            Self::CounterRegressed { .. } => "LG-2004",
            Self::UnknownSeries { .. } => "LG-3001",
            Self::Io { .. } => "LG-3002",
            Self::Serialization { .. } => "LG-3003",
            Self::Runtime { .. } => "LG-3900",
        }
    }

    /// Whether the failure degrades to a no-op tick instead of stopping the loop.
    #[must_use]
    pub const fn is_tick_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. }
                | Self::Parse { .. }
                | Self::MalformedSnapshot { .. }
                | Self::CounterRegressed { .. }
        )
    }

    /// Whether the failure belongs to the startup configuration family.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. } | Self::MissingConfig { .. } | Self::ConfigParse { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for configuration validation failures.
    #[must_use]
    pub fn invalid_config(details: impl Into<String>) -> Self {
        Self::InvalidConfig {
            details: details.into(),
        }
    }
}

impl From<serde_json::Error> for LgError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for LgError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
