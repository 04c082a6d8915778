//! Error types for the logpump core.

use thiserror::Error;

/// Result type alias for configuration loading and validation.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type alias for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

/// Errors raised while loading or validating a [`PipelineConfig`](crate::PipelineConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid duration: {0:?}")]
    InvalidDuration(String),

    #[error("invalid severity: {0:?}")]
    InvalidSeverity(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Contract violations on the bounded queue.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue closed")]
    Closed,

    #[error("queue already closed")]
    AlreadyClosed,

    #[error("queue capacity must be greater than zero")]
    ZeroCapacity,
}

/// Failures reported by a [`Sink`](crate::Sink) implementation.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("write error: {0}")]
    Io(#[from] std::io::Error),

    #[error("batch rejected: {0}")]
    Rejected(String),
}
