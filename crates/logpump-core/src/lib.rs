//! logpump-core — shared building blocks for the logpump pipeline.
//!
//! Everything the concurrent components agree on lives here: the
//! [`WorkItem`] that flows through the pipeline, the [`BoundedQueue`] that
//! carries it, the [`Sink`] that finally receives batches, and the
//! [`PipelineConfig`] that sizes all of it.

pub mod config;
pub mod error;
pub mod queue;
pub mod sink;
pub mod types;

pub use config::PipelineConfig;
pub use error::{ConfigError, ConfigResult, QueueError, SinkError, SinkResult};
pub use queue::{BoundedQueue, QueueReceiver, QueueSender};
pub use sink::{ConsoleSink, Sink};
pub use types::*;
