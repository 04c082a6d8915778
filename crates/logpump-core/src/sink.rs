//! Batch sinks: where every flushed batch ends up.

use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::SinkResult;
use crate::types::{WorkItem, WorkerId};

/// Destination for flushed batches.
///
/// Called synchronously from a worker's loop: the worker awaits the result
/// before pulling more items. The pipeline never retries a failed batch;
/// any retry policy belongs to the implementation.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn write_batch(&self, worker_id: WorkerId, batch: &[WorkItem]) -> SinkResult<()>;
}

/// Writes each item as one JSON line on stdout after a simulated I/O delay.
#[derive(Debug, Clone, Default)]
pub struct ConsoleSink {
    latency: Duration,
}

impl ConsoleSink {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }

    /// Render a batch as newline-delimited JSON.
    pub fn render(batch: &[WorkItem]) -> SinkResult<String> {
        let mut out = String::new();
        for item in batch {
            out.push_str(&serde_json::to_string(item)?);
            out.push('\n');
        }
        Ok(out)
    }
}

#[async_trait]
impl Sink for ConsoleSink {
    async fn write_batch(&self, worker_id: WorkerId, batch: &[WorkItem]) -> SinkResult<()> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let rendered = Self::render(batch)?;
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(rendered.as_bytes())?;
        stdout.flush()?;

        debug!(worker_id, items = batch.len(), "console sink wrote batch");
        Ok(())
    }
}
