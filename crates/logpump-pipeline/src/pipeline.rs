//! Pipeline orchestrator. Starts every component and runs the ordered
//! shutdown sequence.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use logpump_autoscale::AutoScaler;
use logpump_core::{BoundedQueue, PipelineConfig, QueueError, Sink, WorkItem};
use logpump_metrics::{Metrics, MetricsReporter, SnapshotCallback};
use logpump_pool::{ExitTotals, WorkerExit, WorkerPool};

use crate::producer::{ItemGenerator, Producer, ProducerExit};

/// Assembles a pipeline from a config and a sink.
pub struct PipelineBuilder {
    config: PipelineConfig,
    sink: Arc<dyn Sink>,
    generator: Option<ItemGenerator>,
    on_snapshot: Option<SnapshotCallback>,
}

impl PipelineBuilder {
    pub fn new(config: PipelineConfig, sink: Arc<dyn Sink>) -> Self {
        Self {
            config,
            sink,
            generator: None,
            on_snapshot: None,
        }
    }

    /// Override how the producer builds items.
    pub fn with_generator(mut self, generator: ItemGenerator) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Receive every metrics snapshot.
    pub fn with_snapshot_callback(mut self, callback: SnapshotCallback) -> Self {
        self.on_snapshot = Some(callback);
        self
    }

    /// Validate the config and spawn the producer, the initial workers, the
    /// autoscaler and the metrics reporter.
    pub async fn start(self) -> anyhow::Result<RunningPipeline> {
        let PipelineBuilder {
            config,
            sink,
            generator,
            on_snapshot,
        } = self;

        config.validate().context("invalid pipeline config")?;

        let queue = BoundedQueue::new(config.queue.capacity)?;
        let metrics = Arc::new(Metrics::new());

        // Producer and autoscaler share one signal; the reporter gets its
        // own so its final snapshot can include the drain flushes.
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (reporter_tx, reporter_rx) = watch::channel(false);

        let pool = Arc::new(WorkerPool::new(
            queue.receiver(),
            sink,
            metrics.clone(),
            config.workers.clone(),
        ));
        pool.start(config.workers.initial).await;

        let mut producer = Producer::new(queue.sender(), metrics.clone(), &config.producer);
        if let Some(generator) = generator {
            producer = producer.with_generator(generator);
        }
        let producer_handle = tokio::spawn(producer.run(shutdown_rx.clone()));

        let scaler = AutoScaler::new(pool.clone(), queue.clone(), config.autoscale.clone());
        let autoscale_shutdown = shutdown_rx.clone();
        let autoscaler_handle = tokio::spawn(async move {
            scaler.run(autoscale_shutdown).await;
        });

        let mut reporter = MetricsReporter::new(
            metrics.clone(),
            queue.clone(),
            config.metrics.report_interval,
        );
        if let Some(callback) = on_snapshot {
            reporter = reporter.with_callback(callback);
        }
        let reporter_handle = tokio::spawn(async move {
            reporter.run(reporter_rx).await;
        });

        info!(
            capacity = config.queue.capacity,
            workers = config.workers.initial,
            min = config.autoscale.min_workers,
            max = config.autoscale.max_workers,
            "pipeline started"
        );

        Ok(RunningPipeline {
            config,
            queue,
            metrics,
            pool,
            shutdown_tx,
            reporter_tx,
            producer: producer_handle,
            autoscaler: autoscaler_handle,
            reporter: reporter_handle,
        })
    }
}

/// Outcome of a completed shutdown.
#[derive(Debug, Clone)]
pub struct ShutdownReport {
    /// Items the producer enqueued. `None` if it had to be aborted.
    pub produced: Option<u64>,
    /// Whether the producer stopped on its own within the grace period.
    pub producer_acknowledged: bool,
    /// Workers joined during shutdown, ordered by id.
    pub workers: Vec<WorkerExit>,
    /// Workers removed by scale-down and reaped before shutdown.
    pub retired: ExitTotals,
}

impl ShutdownReport {
    /// Totals across every worker the pipeline ran.
    pub fn totals(&self) -> ExitTotals {
        let mut totals = self.retired;
        for exit in &self.workers {
            totals.record(exit);
        }
        totals
    }

    pub fn items_flushed(&self) -> u64 {
        self.totals().items_flushed
    }

    pub fn failed_flushes(&self) -> u64 {
        self.totals().failed_flushes
    }
}

/// Handle to a started pipeline.
pub struct RunningPipeline {
    config: PipelineConfig,
    queue: BoundedQueue<WorkItem>,
    metrics: Arc<Metrics>,
    pool: Arc<WorkerPool>,
    shutdown_tx: watch::Sender<bool>,
    reporter_tx: watch::Sender<bool>,
    producer: JoinHandle<ProducerExit>,
    autoscaler: JoinHandle<()>,
    reporter: JoinHandle<()>,
}

impl RunningPipeline {
    pub fn queue(&self) -> &BoundedQueue<WorkItem> {
        &self.queue
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Stop the pipeline without losing any item that reached the queue.
    ///
    /// The producer is given `shutdown.grace` to acknowledge cancellation by
    /// exiting; if it has not, it is aborted. Either way no send can be in
    /// flight when the queue is closed.
    pub async fn shutdown(self) -> anyhow::Result<ShutdownReport> {
        let RunningPipeline {
            config,
            queue,
            pool,
            shutdown_tx,
            reporter_tx,
            mut producer,
            autoscaler,
            reporter,
            ..
        } = self;

        info!("pipeline shutting down");
        let _ = shutdown_tx.send(true);

        let grace = config.shutdown.grace;
        let (produced, producer_acknowledged) =
            match tokio::time::timeout(grace, &mut producer).await {
                Ok(Ok(exit)) => (Some(exit.sent), true),
                Ok(Err(e)) => {
                    warn!(error = %e, "producer task failed");
                    (None, true)
                }
                Err(_) => {
                    warn!(grace_ms = grace.as_millis() as u64, "producer missed grace period, aborting");
                    producer.abort();
                    let _ = producer.await;
                    (None, false)
                }
            };

        if let Err(e) = autoscaler.await {
            warn!(error = %e, "autoscaler task failed");
        }

        match queue.close() {
            Ok(()) => info!(buffered = queue.len(), "queue closed, draining workers"),
            Err(QueueError::AlreadyClosed) => {
                warn!(buffered = queue.len(), "queue was already closed, draining workers");
            }
            Err(e) => return Err(e).context("closing work queue"),
        }

        let joined = pool.join_all().await;

        let _ = reporter_tx.send(true);
        if let Err(e) = reporter.await {
            warn!(error = %e, "metrics reporter task failed");
        }

        let report = ShutdownReport {
            produced,
            producer_acknowledged,
            workers: joined.workers,
            retired: joined.retired,
        };
        info!(
            produced = ?report.produced,
            flushed = report.items_flushed(),
            workers = report.totals().workers,
            "pipeline stopped"
        );
        Ok(report)
    }
}
