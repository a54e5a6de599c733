//! Stats fetcher: one bounded GET against the load generator's JSON endpoint.

#![allow(missing_docs)]

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::core::config::SourceConfig;
use crate::core::errors::{LgError, Result};

/// One successfully fetched and shape-checked statistics document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Reported load-test phase (`state` in the body).
    pub phase: String,
    /// Per-route entries; the aggregate is located by the router.
    pub stats: Vec<Value>,
}

/// Anything that can produce a [`Snapshot`] on demand.
pub trait StatsSource {
    fn fetch(&self) -> Result<Snapshot>;

    /// Human-readable origin, used in logs and the status line.
    fn describe(&self) -> String;
}

/// Parse a response body into a snapshot.
///
/// Requires a JSON object with a string `state` and an array `stats`; the
/// entries themselves are checked by the router.
pub fn parse_snapshot(body: &[u8]) -> Result<Snapshot> {
    let doc: Value = serde_json::from_slice(body).map_err(|e| LgError::Parse {
        details: format!("body is not JSON: {e}"),
    })?;
    let Value::Object(mut map) = doc else {
        return Err(LgError::Parse {
            details: "body is not a JSON object".to_string(),
        });
    };

    let phase = match map.remove("state") {
        Some(Value::String(state)) => state,
        Some(other) => {
            return Err(LgError::Parse {
                details: format!("\"state\" must be a string, got {}", json_kind(&other)),
            });
        }
        None => {
            return Err(LgError::Parse {
                details: "missing \"state\"".to_string(),
            });
        }
    };

    let stats = match map.remove("stats") {
        Some(Value::Array(stats)) => stats,
        Some(other) => {
            return Err(LgError::Parse {
                details: format!("\"stats\" must be an array, got {}", json_kind(&other)),
            });
        }
        None => {
            return Err(LgError::Parse {
                details: "missing \"stats\"".to_string(),
            });
        }
    };

    Ok(Snapshot { phase, stats })
}

pub(crate) const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ──────────────────── HTTP source ────────────────────

/// Blocking HTTP implementation of [`StatsSource`].
///
/// No retries: a failed GET is reported and the next tick tries again.
#[derive(Debug, Clone)]
pub struct HttpStatsFetcher {
    client: reqwest::blocking::Client,
    url: String,
    timeout: Duration,
}

impl HttpStatsFetcher {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LgError::Runtime {
                details: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }

    pub fn from_config(cfg: &SourceConfig) -> Result<Self> {
        Self::new(cfg.url.clone(), Duration::from_millis(cfg.timeout_ms))
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    fn transport(&self, details: impl Into<String>) -> LgError {
        LgError::Transport {
            url: self.url.clone(),
            details: details.into(),
        }
    }
}

impl StatsSource for HttpStatsFetcher {
    fn fetch(&self) -> Result<Snapshot> {
        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    self.transport(format!("timed out after {} ms", self.timeout.as_millis()))
                } else {
                    self.transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.transport(format!("HTTP status {status}")));
        }

        let body = response
            .bytes()
            .map_err(|e| self.transport(format!("failed reading body: {e}")))?;
        parse_snapshot(&body)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
