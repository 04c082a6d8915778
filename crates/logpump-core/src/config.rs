//! logpump.toml configuration parser.
//!
//! Every section and field is optional; missing values fall back to the
//! defaults below. Durations are written as human strings such as
//! `"500ms"`, `"2s"` or `"1m"`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::types::Severity;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub queue: QueueConfig,
    pub producer: ProducerConfig,
    pub workers: WorkerConfig,
    pub autoscale: AutoscaleConfig,
    pub metrics: MetricsConfig,
    pub shutdown: ShutdownConfig,
    pub sink: SinkConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: 10_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    /// One item is produced per tick of this interval.
    #[serde(with = "duration_str")]
    pub interval: Duration,
    /// Base unit of the adaptive pacing ladder.
    #[serde(with = "duration_str")]
    pub pace_unit: Duration,
    pub payload: String,
    pub severity: Severity,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1),
            pace_unit: Duration::from_millis(1),
            payload: "hello from producer".to_string(),
            severity: Severity::Info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub batch_size: usize,
    #[serde(with = "duration_str")]
    pub batch_timeout: Duration,
    /// Workers spawned when the pipeline starts.
    pub initial: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            batch_timeout: Duration::from_millis(500),
            initial: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoscaleConfig {
    pub min_workers: usize,
    pub max_workers: usize,
    pub scale_up_threshold: f64,
    pub scale_down_threshold: f64,
    #[serde(with = "duration_str")]
    pub check_interval: Duration,
}

impl Default for AutoscaleConfig {
    fn default() -> Self {
        Self {
            min_workers: 2,
            max_workers: 10,
            scale_up_threshold: 0.8,
            scale_down_threshold: 0.2,
            check_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    #[serde(with = "duration_str")]
    pub report_interval: Duration,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            report_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Upper bound on how long the producer may take to acknowledge
    /// cancellation before the queue is closed.
    #[serde(with = "duration_str")]
    pub grace: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Simulated I/O latency per flushed batch.
    #[serde(with = "duration_str")]
    pub latency: Duration,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(300),
        }
    }
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check cross-field constraints. Called by the loaders; callers that
    /// build a config by hand should call it before starting a pipeline.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.queue.capacity == 0 {
            return Err(invalid("queue.capacity must be greater than zero"));
        }
        if self.workers.batch_size == 0 {
            return Err(invalid("workers.batch_size must be greater than zero"));
        }

        let scale = &self.autoscale;
        if scale.min_workers == 0 {
            return Err(invalid("autoscale.min_workers must be at least 1"));
        }
        if scale.min_workers > scale.max_workers {
            return Err(invalid(format!(
                "autoscale.min_workers ({}) exceeds autoscale.max_workers ({})",
                scale.min_workers, scale.max_workers
            )));
        }
        if !(scale.min_workers..=scale.max_workers).contains(&self.workers.initial) {
            return Err(invalid(format!(
                "workers.initial ({}) must lie within [{}, {}]",
                self.workers.initial, scale.min_workers, scale.max_workers
            )));
        }
        for (name, value) in [
            ("scale_up_threshold", scale.scale_up_threshold),
            ("scale_down_threshold", scale.scale_down_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(format!("autoscale.{name} must lie within [0, 1]")));
            }
        }
        if scale.scale_down_threshold >= scale.scale_up_threshold {
            return Err(invalid(
                "autoscale.scale_down_threshold must be below autoscale.scale_up_threshold",
            ));
        }

        for (name, value) in [
            ("producer.interval", self.producer.interval),
            ("workers.batch_timeout", self.workers.batch_timeout),
            ("autoscale.check_interval", scale.check_interval),
            ("metrics.report_interval", self.metrics.report_interval),
        ] {
            if value.is_zero() {
                return Err(invalid(format!("{name} must be non-zero")));
            }
        }

        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}

/// Parse a duration string like `"250us"`, `"500ms"`, `"2s"` or `"5m"`.
///
/// A bare number is read as seconds.
pub fn parse_duration(s: &str) -> ConfigResult<Duration> {
    let s = s.trim();
    let err = || ConfigError::InvalidDuration(s.to_string());

    // (digits, micros per unit)
    let (digits, scale) = if let Some(v) = s.strip_suffix("ms") {
        (v, 1_000)
    } else if let Some(v) = s.strip_suffix("us") {
        (v, 1)
    } else if let Some(v) = s.strip_suffix('s') {
        (v, 1_000_000)
    } else if let Some(v) = s.strip_suffix('m') {
        (v, 60_000_000)
    } else {
        (s, 1_000_000)
    };

    let value = digits.trim().parse::<u64>().map_err(|_| err())?;
    value
        .checked_mul(scale)
        .map(Duration::from_micros)
        .ok_or_else(err)
}

/// Render a duration in the largest unit that represents it exactly.
pub fn format_duration(d: Duration) -> String {
    let micros = d.as_micros();
    if micros % 1_000 != 0 {
        format!("{micros}us")
    } else if micros % 1_000_000 != 0 || micros == 0 {
        format!("{}ms", micros / 1_000)
    } else if micros % 60_000_000 != 0 {
        format!("{}s", micros / 1_000_000)
    } else {
        format!("{}m", micros / 60_000_000)
    }
}

mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.queue.capacity, 10_000);
        assert_eq!(config.autoscale.scale_up_threshold, 0.8);
        assert_eq!(config.shutdown.grace, Duration::from_millis(200));
    }

    #[test]
    fn parse_minimal() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn parse_overrides() {
        let toml_str = r#"
[queue]
capacity = 64

[producer]
interval = "5ms"
severity = "WARN"

[workers]
batch_size = 8
batch_timeout = "2s"
initial = 3

[autoscale]
min_workers = 1
max_workers = 4
"#;
        let config = PipelineConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.queue.capacity, 64);
        assert_eq!(config.producer.interval, Duration::from_millis(5));
        assert_eq!(config.producer.severity, Severity::Warn);
        assert_eq!(config.workers.batch_timeout, Duration::from_secs(2));
        assert_eq!(config.autoscale.max_workers, 4);
        // Untouched sections keep their defaults.
        assert_eq!(config.metrics.report_interval, Duration::from_secs(1));
    }

    #[test]
    fn round_trips_through_toml() {
        let config = PipelineConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        assert!(toml_str.contains("batch_timeout = \"500ms\""));
        assert_eq!(PipelineConfig::from_toml_str(&toml_str).unwrap(), config);
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logpump.toml");
        std::fs::write(&path, "[queue]\ncapacity = 10\n").unwrap();

        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.queue.capacity, 10);
    }

    #[test]
    fn rejects_inverted_worker_bounds() {
        let mut config = PipelineConfig::default();
        config.autoscale.min_workers = 6;
        config.autoscale.max_workers = 3;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_initial_outside_bounds() {
        let mut config = PipelineConfig::default();
        config.workers.initial = 11;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_overlapping_thresholds() {
        let mut config = PipelineConfig::default();
        config.autoscale.scale_down_threshold = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_capacity_and_batch() {
        let mut config = PipelineConfig::default();
        config.queue.capacity = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.workers.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn severity_in_file_accepts_same_spellings_as_cli() {
        for spelling in ["warning", "Warn", "WARN"] {
            let toml_str = format!("[producer]\nseverity = \"{spelling}\"\n");
            let config = PipelineConfig::from_toml_str(&toml_str).unwrap();
            assert_eq!(config.producer.severity, Severity::Warn, "{spelling}");
        }
        let err = PipelineConfig::from_toml_str("[producer]\nseverity = \"fatal\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_bad_duration_string() {
        let err = PipelineConfig::from_toml_str("[producer]\ninterval = \"soon\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn parse_duration_values() {
        assert_eq!(parse_duration("250us").unwrap(), Duration::from_micros(250));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("7").unwrap(), Duration::from_secs(7));
        assert!(parse_duration("fast").is_err());
    }

    #[test]
    fn format_duration_values() {
        assert_eq!(format_duration(Duration::from_micros(500)), "500us");
        assert_eq!(format_duration(Duration::from_millis(1)), "1ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1500ms");
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(120)), "2m");
        assert_eq!(format_duration(Duration::ZERO), "0ms");
    }
}
