//! Occupancy-driven worker pool resizing.
//!
//! Reads queue occupancy and the live worker count every tick, compares
//! them against the configured thresholds and bounds, and adds or removes
//! a single worker through the pool.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use logpump_core::config::AutoscaleConfig;
use logpump_core::{BoundedQueue, WorkItem};
use logpump_pool::WorkerPool;

/// The action chosen for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDecision {
    /// Add one worker.
    ScaleUp,
    /// Remove the newest worker.
    ScaleDown,
    /// No change needed.
    NoChange,
}

/// Periodic controller that keeps the pool within `[min_workers, max_workers]`.
///
/// It never closes the queue or joins workers; shutdown only stops its loop.
pub struct AutoScaler {
    pool: Arc<WorkerPool>,
    queue: BoundedQueue<WorkItem>,
    config: AutoscaleConfig,
}

impl AutoScaler {
    pub fn new(pool: Arc<WorkerPool>, queue: BoundedQueue<WorkItem>, config: AutoscaleConfig) -> Self {
        Self { pool, queue, config }
    }

    /// Decide what to do for an observed occupancy and worker count.
    ///
    /// Scale-up is checked first and wins if both thresholds are crossed.
    pub fn evaluate(&self, usage: f64, workers: usize) -> ScaleDecision {
        let c = &self.config;
        if usage > c.scale_up_threshold && workers < c.max_workers {
            ScaleDecision::ScaleUp
        } else if usage < c.scale_down_threshold && workers > c.min_workers {
            ScaleDecision::ScaleDown
        } else {
            ScaleDecision::NoChange
        }
    }

    /// Sample the queue and pool once and apply at most one action.
    pub async fn check(&self) -> ScaleDecision {
        let usage = self.queue.usage();
        let workers = self.pool.count().await;
        let decision = self.evaluate(usage, workers);

        match decision {
            ScaleDecision::ScaleUp => {
                let id = self.pool.add_worker().await;
                info!(worker_id = id, usage, from = workers, to = workers + 1, "scaling up");
            }
            ScaleDecision::ScaleDown => {
                if let Some(id) = self.pool.remove_worker().await {
                    info!(worker_id = id, usage, from = workers, to = workers - 1, "scaling down");
                }
            }
            ScaleDecision::NoChange => {
                debug!(usage, workers, "no scaling needed");
            }
        }

        decision
    }

    /// Run the autoscaler loop until the shutdown signal fires.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_ms = self.config.check_interval.as_millis() as u64,
            min = self.config.min_workers,
            max = self.config.max_workers,
            "autoscaler started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.config.check_interval) => {
                    self.check().await;
                }
                _ = shutdown.changed() => {
                    info!("autoscaler shutting down");
                    break;
                }
            }
        }
    }
}
