//! logpump-pipeline — the producer and the orchestrator.
//!
//! [`Producer`] emits one [`WorkItem`](logpump_core::WorkItem) per tick and
//! backs off as the queue fills. [`PipelineBuilder`] wires the producer,
//! the worker pool, the autoscaler and the metrics reporter together, and
//! [`RunningPipeline::shutdown`] tears them down in order:
//!
//! ```text
//! 1. signal cancellation   → producer, autoscaler
//! 2. await producer ack    (bounded by the shutdown grace period)
//! 3. close the queue       → workers drain what is buffered
//! 4. join every worker     (including ones added or removed at runtime)
//! 5. stop the reporter     → final metrics snapshot
//! ```

pub mod pipeline;
pub mod producer;

pub use pipeline::{PipelineBuilder, RunningPipeline, ShutdownReport};
pub use producer::{ItemGenerator, Producer, ProducerExit, pacing_delay};
