//! Throughput counters and the periodic reporter.
//!
//! Increments are pure atomic adds from arbitrary tasks; no lock is taken
//! on the hot path. The reporter swaps each counter to zero while reading
//! it, so a count lands in exactly one interval.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

use logpump_core::{BoundedQueue, WorkItem};

/// Process-wide pipeline counters.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Items successfully enqueued since the last report.
    produced: AtomicU64,
    /// Items successfully flushed to the sink since the last report.
    processed: AtomicU64,
    /// Live workers, as last published by the pool.
    active_workers: AtomicUsize,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_produced(&self) {
        self.produced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_processed(&self, n: u64) {
        self.processed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn set_active_workers(&self, n: usize) {
        self.active_workers.store(n, Ordering::Relaxed);
    }

    pub fn active_workers(&self) -> usize {
        self.active_workers.load(Ordering::Relaxed)
    }

    /// Produced count for the current interval (without resetting).
    pub fn current_produced(&self) -> u64 {
        self.produced.load(Ordering::Relaxed)
    }

    /// Processed count for the current interval (without resetting).
    pub fn current_processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Atomically read and zero both counters. Returns `(produced, processed)`.
    pub fn take_counts(&self) -> (u64, u64) {
        (
            self.produced.swap(0, Ordering::AcqRel),
            self.processed.swap(0, Ordering::AcqRel),
        )
    }
}

/// Point-in-time view emitted once per report interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    /// Items produced during the interval.
    pub produced: u64,
    /// Items processed during the interval.
    pub processed: u64,
    pub queue_len: usize,
    pub queue_cap: usize,
    pub active_workers: usize,
    /// Time actually covered by this snapshot; the final one is usually short.
    pub interval_secs: f64,
    pub produced_per_sec: f64,
    pub processed_per_sec: f64,
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "produced={:.0}/s processed={:.0}/s queue={}/{} workers={}",
            self.produced_per_sec,
            self.processed_per_sec,
            self.queue_len,
            self.queue_cap,
            self.active_workers
        )
    }
}

/// Callback invoked with every emitted snapshot.
pub type SnapshotCallback = Box<dyn Fn(&MetricsSnapshot) + Send + Sync>;

/// Periodically drains [`Metrics`] and emits a [`MetricsSnapshot`].
pub struct MetricsReporter {
    metrics: Arc<Metrics>,
    queue: BoundedQueue<WorkItem>,
    interval: Duration,
    last_report: Instant,
    on_snapshot: Option<SnapshotCallback>,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<Metrics>, queue: BoundedQueue<WorkItem>, interval: Duration) -> Self {
        Self {
            metrics,
            queue,
            interval,
            last_report: Instant::now(),
            on_snapshot: None,
        }
    }

    /// Set a callback that receives every snapshot.
    pub fn with_callback(mut self, callback: SnapshotCallback) -> Self {
        self.on_snapshot = Some(callback);
        self
    }

    /// Drain the counters and build a snapshot covering the time since the
    /// previous report.
    pub fn report(&mut self) -> MetricsSnapshot {
        let (produced, processed) = self.metrics.take_counts();
        let now = Instant::now();
        let interval_secs = now.duration_since(self.last_report).as_secs_f64();
        self.last_report = now;
        let per_sec = |n: u64| {
            if interval_secs > 0.0 {
                n as f64 / interval_secs
            } else {
                0.0
            }
        };

        MetricsSnapshot {
            produced,
            processed,
            queue_len: self.queue.len(),
            queue_cap: self.queue.capacity(),
            active_workers: self.metrics.active_workers(),
            interval_secs,
            produced_per_sec: per_sec(produced),
            processed_per_sec: per_sec(processed),
        }
    }

    fn emit(&self, snapshot: &MetricsSnapshot) {
        info!(
            produced = snapshot.produced,
            processed = snapshot.processed,
            queue_len = snapshot.queue_len,
            queue_cap = snapshot.queue_cap,
            workers = snapshot.active_workers,
            "metrics"
        );
        if let Some(ref cb) = self.on_snapshot {
            cb(snapshot);
        }
    }

    /// Run the report loop until the shutdown signal fires.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        self.last_report = Instant::now();
        info!(
            interval_ms = self.interval.as_millis() as u64,
            "metrics reporter started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    let snapshot = self.report();
                    self.emit(&snapshot);
                }
                _ = shutdown.changed() => {
                    debug!("metrics reporter shutting down");
                    // Final snapshot before exit.
                    let snapshot = self.report();
                    self.emit(&snapshot);
                    break;
                }
            }
        }
    }
}
