//! A single batching consumer of the shared queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use logpump_core::{QueueReceiver, Sink, WorkItem, WorkerId};
use logpump_metrics::Metrics;

/// Floor for the flush timer; tokio panics on a zero interval period.
const MIN_BATCH_TIMEOUT: Duration = Duration::from_millis(1);

/// Why a worker left its running state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The pool signalled this worker to stop.
    Stopped,
    /// The queue was closed and fully drained.
    QueueClosed,
}

/// Summary returned through the worker's join handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerExit {
    pub id: WorkerId,
    pub reason: StopReason,
    pub batches_flushed: u64,
    pub items_flushed: u64,
    pub failed_flushes: u64,
}

/// Running totals folded from worker exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExitTotals {
    pub workers: u64,
    pub batches_flushed: u64,
    pub items_flushed: u64,
    pub failed_flushes: u64,
}

impl ExitTotals {
    pub fn record(&mut self, exit: &WorkerExit) {
        self.workers += 1;
        self.batches_flushed += exit.batches_flushed;
        self.items_flushed += exit.items_flushed;
        self.failed_flushes += exit.failed_flushes;
    }

    pub(crate) fn absorb(&mut self, other: ExitTotals) {
        self.workers += other.workers;
        self.batches_flushed += other.batches_flushed;
        self.items_flushed += other.items_flushed;
        self.failed_flushes += other.failed_flushes;
    }
}

/// A batching consumer bound to the shared queue, sink and metrics.
pub struct Worker {
    id: WorkerId,
    queue: QueueReceiver<WorkItem>,
    sink: Arc<dyn Sink>,
    metrics: Arc<Metrics>,
    batch_size: usize,
    batch_timeout: Duration,
    stop: watch::Receiver<bool>,
}

impl Worker {
    pub fn new(
        id: WorkerId,
        queue: QueueReceiver<WorkItem>,
        sink: Arc<dyn Sink>,
        metrics: Arc<Metrics>,
        batch_size: usize,
        batch_timeout: Duration,
        stop: watch::Receiver<bool>,
    ) -> Self {
        Self {
            id,
            queue,
            sink,
            metrics,
            batch_size: batch_size.max(1),
            batch_timeout: batch_timeout.max(MIN_BATCH_TIMEOUT),
            stop,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Consume until stopped or the queue is closed, then flush whatever is
    /// still buffered and return.
    pub async fn run(self) -> WorkerExit {
        let Worker {
            id,
            queue,
            sink,
            metrics,
            batch_size,
            batch_timeout,
            mut stop,
        } = self;

        let mut flusher = Flusher {
            id,
            sink,
            metrics,
            exit: WorkerExit {
                id,
                reason: StopReason::Stopped,
                batches_flushed: 0,
                items_flushed: 0,
                failed_flushes: 0,
            },
        };
        let mut batch: Vec<WorkItem> = Vec::with_capacity(batch_size);

        // First tick one full timeout from now, not immediately.
        let mut ticker = tokio::time::interval_at(Instant::now() + batch_timeout, batch_timeout);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(worker_id = id, batch_size, "worker started");

        let reason = loop {
            tokio::select! {
                item = queue.recv() => match item {
                    Some(item) => {
                        batch.push(item);
                        if batch.len() >= batch_size {
                            flusher.flush(&mut batch).await;
                        }
                    }
                    None => break StopReason::QueueClosed,
                },
                _ = ticker.tick() => {
                    if !batch.is_empty() {
                        flusher.flush(&mut batch).await;
                    }
                }
                _ = stop.changed() => break StopReason::Stopped,
            }
        };

        // Draining.
        if !batch.is_empty() {
            flusher.flush(&mut batch).await;
        }

        let mut exit = flusher.exit;
        exit.reason = reason;
        debug!(
            worker_id = id,
            ?reason,
            batches = exit.batches_flushed,
            items = exit.items_flushed,
            "worker terminated"
        );
        exit
    }
}

struct Flusher {
    id: WorkerId,
    sink: Arc<dyn Sink>,
    metrics: Arc<Metrics>,
    exit: WorkerExit,
}

impl Flusher {
    /// Hand the batch to the sink and reset it. The processed counter only
    /// moves on success; a failed batch is dropped, never retried here.
    async fn flush(&mut self, batch: &mut Vec<WorkItem>) {
        let n = batch.len() as u64;
        match self.sink.write_batch(self.id, batch).await {
            Ok(()) => {
                self.metrics.add_processed(n);
                self.exit.batches_flushed += 1;
                self.exit.items_flushed += n;
                debug!(worker_id = self.id, items = n, "batch flushed");
            }
            Err(e) => {
                self.exit.failed_flushes += 1;
                warn!(worker_id = self.id, items = n, error = %e, "batch flush failed");
            }
        }
        batch.clear();
    }
}
