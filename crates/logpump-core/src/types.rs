//! Shared types used across logpump crates.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Identifier assigned to a worker by the pool. Monotonic, never reused.
pub type WorkerId = u64;

/// Severity level of a generated log message.
///
/// Parsing is case-insensitive and accepts `WARNING` for `WARN`, both from
/// strings and through serde.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum Severity {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Severity::Debug),
            "INFO" => Ok(Severity::Info),
            "WARN" | "WARNING" => Ok(Severity::Warn),
            "ERROR" => Ok(Severity::Error),
            _ => Err(ConfigError::InvalidSeverity(s.to_string())),
        }
    }
}

impl TryFrom<String> for Severity {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, ConfigError> {
        s.parse()
    }
}

/// A single unit of work flowing from the producer to exactly one worker.
///
/// Immutable once built. Serializes to the compact `{"msg","level","ts"}`
/// shape used by the console sink.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkItem {
    #[serde(rename = "msg")]
    pub payload: String,
    #[serde(rename = "level")]
    pub severity: Severity,
    /// Nanoseconds since the Unix epoch.
    #[serde(rename = "ts")]
    pub timestamp: i64,
}

impl WorkItem {
    /// Build an item stamped with the current wall-clock time.
    pub fn new(payload: impl Into<String>, severity: Severity) -> Self {
        Self {
            payload: payload.into(),
            severity,
            timestamp: epoch_nanos(),
        }
    }
}

/// Current time as nanoseconds since the Unix epoch.
pub fn epoch_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}
