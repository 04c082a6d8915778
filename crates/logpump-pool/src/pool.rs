//! The registry of live workers.
//!
//! All registry mutation happens under one mutex, which is held only for
//! the bookkeeping itself and never across a flush, send or receive.
//! Bounds are not enforced here; keeping the pool within
//! `[min_workers, max_workers]` is the autoscaler's job.

use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use logpump_core::config::WorkerConfig;
use logpump_core::{QueueReceiver, Sink, WorkItem, WorkerId};
use logpump_metrics::Metrics;

use crate::worker::{ExitTotals, Worker, WorkerExit};

/// A live worker as seen by the pool.
struct WorkerRecord {
    id: WorkerId,
    /// Stop signal for this worker only.
    stop_tx: watch::Sender<bool>,
}

struct PoolState {
    /// Live workers in spawn order; the newest is last.
    workers: Vec<WorkerRecord>,
    next_id: WorkerId,
    /// Every worker ever spawned and not yet reaped, removed ones included.
    tasks: JoinSet<WorkerExit>,
    /// Exits already collected from `tasks`, folded into totals.
    retired: ExitTotals,
}

/// Outcome of [`WorkerPool::join_all`].
#[derive(Debug, Clone, Default)]
pub struct JoinSummary {
    /// Workers joined by this call, ordered by id.
    pub workers: Vec<WorkerExit>,
    /// Workers that had already exited and were reaped before the join.
    pub retired: ExitTotals,
}

impl JoinSummary {
    /// Totals across every worker the pool ever ran.
    pub fn totals(&self) -> ExitTotals {
        let mut totals = self.retired;
        for exit in &self.workers {
            totals.record(exit);
        }
        totals
    }
}

/// Owns the set of live workers and is the only place they are created or
/// stopped.
pub struct WorkerPool {
    state: Mutex<PoolState>,
    queue: QueueReceiver<WorkItem>,
    sink: Arc<dyn Sink>,
    metrics: Arc<Metrics>,
    config: WorkerConfig,
}

impl WorkerPool {
    pub fn new(
        queue: QueueReceiver<WorkItem>,
        sink: Arc<dyn Sink>,
        metrics: Arc<Metrics>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            state: Mutex::new(PoolState {
                workers: Vec::new(),
                next_id: 1,
                tasks: JoinSet::new(),
                retired: ExitTotals::default(),
            }),
            queue,
            sink,
            metrics,
            config,
        }
    }

    /// Spawn `n` workers. Returns their ids.
    pub async fn start(&self, n: usize) -> Vec<WorkerId> {
        let mut ids = Vec::with_capacity(n);
        for _ in 0..n {
            ids.push(self.add_worker().await);
        }
        info!(workers = n, "worker pool started");
        ids
    }

    /// Spawn one more worker bound to the shared queue, sink and metrics.
    pub async fn add_worker(&self) -> WorkerId {
        let mut state = self.state.lock().await;
        reap_finished(&mut state);

        let id = state.next_id;
        state.next_id += 1;

        let (stop_tx, stop_rx) = watch::channel(false);
        let worker = Worker::new(
            id,
            self.queue.clone(),
            self.sink.clone(),
            self.metrics.clone(),
            self.config.batch_size,
            self.config.batch_timeout,
            stop_rx,
        );
        state.tasks.spawn(worker.run());
        state.workers.push(WorkerRecord { id, stop_tx });

        let count = state.workers.len();
        self.metrics.set_active_workers(count);
        info!(worker_id = id, workers = count, "worker added");
        id
    }

    /// Signal the newest worker to stop and forget it.
    ///
    /// Returns immediately; the worker drains its batch in the background
    /// and is collected by [`join_all`](Self::join_all). No-op on an empty
    /// pool.
    pub async fn remove_worker(&self) -> Option<WorkerId> {
        let mut state = self.state.lock().await;
        let record = state.workers.pop()?;

        // The worker may already have exited on queue closure.
        let _ = record.stop_tx.send(true);

        let count = state.workers.len();
        self.metrics.set_active_workers(count);
        info!(worker_id = record.id, workers = count, "worker removed");
        Some(record.id)
    }

    /// Number of live workers.
    pub async fn count(&self) -> usize {
        self.state.lock().await.workers.len()
    }

    /// Ids of live workers, oldest first.
    pub async fn worker_ids(&self) -> Vec<WorkerId> {
        self.state
            .lock()
            .await
            .workers
            .iter()
            .map(|w| w.id)
            .collect()
    }

    /// Wait for every worker ever spawned to terminate.
    ///
    /// Workers still tracked are returned individually, ordered by id;
    /// those reaped earlier only contribute to the retired totals.
    /// Does not stop anyone: live workers finish when the queue is closed
    /// and drained. The lock is released while waiting.
    pub async fn join_all(&self) -> JoinSummary {
        let mut exits = Vec::new();
        let mut retired = ExitTotals::default();

        loop {
            let mut tasks = {
                let mut state = self.state.lock().await;
                retired.absorb(std::mem::take(&mut state.retired));
                std::mem::take(&mut state.tasks)
            };
            if tasks.is_empty() {
                break;
            }

            while let Some(res) = tasks.join_next().await {
                match res {
                    Ok(exit) => exits.push(exit),
                    Err(e) => error!(error = %e, "worker task failed"),
                }
            }
        }

        let mut state = self.state.lock().await;
        state.workers.clear();
        self.metrics.set_active_workers(0);
        drop(state);

        exits.sort_by_key(|e| e.id);
        debug!(
            joined = exits.len(),
            retired = retired.workers,
            "all workers joined"
        );
        JoinSummary {
            workers: exits,
            retired,
        }
    }
}

/// Fold exits of workers that already finished into the retired totals so
/// pool state stays proportional to the live worker count.
fn reap_finished(state: &mut PoolState) {
    while let Some(res) = state.tasks.try_join_next() {
        match res {
            Ok(exit) => state.retired.record(&exit),
            Err(e) => error!(error = %e, "worker task failed"),
        }
    }
}
