//! End-to-end pipeline scenarios.
//!
//! Exercises the producer, pool, autoscaler and shutdown sequence together
//! through the public APIs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use logpump_core::config::WorkerConfig;
use logpump_core::{BoundedQueue, PipelineConfig, Severity, Sink, SinkResult, WorkItem, WorkerId};
use logpump_metrics::Metrics;
use logpump_pipeline::PipelineBuilder;
use logpump_pool::{StopReason, WorkerPool};

/// Records every flushed batch along with the worker that flushed it.
#[derive(Default)]
struct RecordingSink {
    latency: Duration,
    batches: Mutex<Vec<(WorkerId, Vec<WorkItem>)>>,
}

impl RecordingSink {
    fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Default::default()
        }
    }

    fn batch_sizes(&self) -> Vec<usize> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .map(|(_, b)| b.len())
            .collect()
    }

    fn payload_counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for (_, batch) in self.batches.lock().unwrap().iter() {
            for item in batch {
                *counts.entry(item.payload.clone()).or_insert(0) += 1;
            }
        }
        counts
    }
}

#[async_trait]
impl Sink for RecordingSink {
    async fn write_batch(&self, worker_id: WorkerId, batch: &[WorkItem]) -> SinkResult<()> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.batches
            .lock()
            .unwrap()
            .push((worker_id, batch.to_vec()));
        Ok(())
    }
}

fn tagged(n: u64) -> WorkItem {
    WorkItem {
        payload: format!("item-{n}"),
        severity: Severity::Info,
        timestamp: n as i64,
    }
}

fn worker_config(batch_size: usize) -> WorkerConfig {
    WorkerConfig {
        batch_size,
        batch_timeout: Duration::from_secs(60),
        initial: 1,
    }
}

#[tokio::test]
async fn single_worker_flushes_two_full_batches_then_drains_remainder() {
    let queue = BoundedQueue::new(10).unwrap();
    let sink = Arc::new(RecordingSink::default());
    let metrics = Arc::new(Metrics::new());
    let pool = WorkerPool::new(queue.receiver(), sink.clone(), metrics.clone(), worker_config(5));
    pool.start(1).await;

    let tx = queue.sender();
    for n in 0..12 {
        tx.send(tagged(n)).await.unwrap();
    }
    queue.close().unwrap();
    let exits = pool.join_all().await.workers;

    assert_eq!(sink.batch_sizes(), vec![5, 5, 2]);
    assert_eq!(exits.len(), 1);
    assert_eq!(exits[0].reason, StopReason::QueueClosed);
    assert_eq!(metrics.current_processed(), 12);
}

#[tokio::test(start_paused = true)]
async fn shutdown_flushes_each_partial_batch_exactly_once() {
    let queue = BoundedQueue::new(16).unwrap();
    let sink = Arc::new(RecordingSink::default());
    let pool = WorkerPool::new(
        queue.receiver(),
        sink.clone(),
        Arc::new(Metrics::new()),
        worker_config(10),
    );
    pool.start(3).await;
    // Let every worker park on the queue.
    tokio::time::sleep(Duration::from_millis(1)).await;

    // Idle workers are woken in turn, so spaced sends spread across all three.
    let tx = queue.sender();
    for n in 0..6 {
        tx.send(tagged(n)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert!(queue.is_empty());
    assert!(sink.batch_sizes().is_empty(), "nothing should flush before shutdown");

    queue.close().unwrap();
    let exits = pool.join_all().await.workers;

    assert_eq!(exits.len(), 3);
    for exit in &exits {
        assert_eq!(exit.reason, StopReason::QueueClosed);
        assert_eq!(exit.batches_flushed, 1, "worker {} flushed {} times", exit.id, exit.batches_flushed);
    }
    assert_eq!(sink.batch_sizes().len(), 3);

    let counts = sink.payload_counts();
    assert_eq!(counts.len(), 6);
    assert!(counts.values().all(|&c| c == 1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_sent_item_is_flushed_exactly_once_under_scaling_churn() {
    let mut config = PipelineConfig::default();
    config.queue.capacity = 64;
    config.producer.interval = Duration::from_micros(200);
    config.producer.pace_unit = Duration::from_micros(100);
    config.workers.batch_size = 7;
    config.workers.batch_timeout = Duration::from_millis(5);
    config.workers.initial = 2;
    config.autoscale.min_workers = 1;
    config.autoscale.max_workers = 6;
    config.autoscale.scale_up_threshold = 0.5;
    config.autoscale.scale_down_threshold = 0.1;
    config.autoscale.check_interval = Duration::from_millis(5);
    config.metrics.report_interval = Duration::from_millis(50);

    let sink = Arc::new(RecordingSink::with_latency(Duration::from_millis(3)));
    let pipeline = PipelineBuilder::new(config, sink.clone())
        .with_generator(Box::new(tagged))
        .start()
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(400)).await;
    let report = pipeline.shutdown().await.unwrap();

    assert!(report.producer_acknowledged);
    let produced = report.produced.unwrap();
    assert!(produced > 0);

    let counts = sink.payload_counts();
    assert_eq!(counts.len() as u64, produced, "lost or extra items");
    for n in 0..produced {
        assert_eq!(counts.get(&format!("item-{n}")), Some(&1), "item-{n}");
    }
    assert_eq!(report.items_flushed(), produced);

    // Batches never exceed the configured size.
    assert!(sink.batch_sizes().iter().all(|&s| s > 0 && s <= 7));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sustained_backlog_scales_up_but_never_past_max() {
    let mut config = PipelineConfig::default();
    config.queue.capacity = 20;
    config.producer.interval = Duration::from_millis(1);
    config.workers.batch_size = 1;
    config.workers.batch_timeout = Duration::from_millis(100);
    config.workers.initial = 1;
    config.autoscale.min_workers = 1;
    config.autoscale.max_workers = 3;
    config.autoscale.check_interval = Duration::from_millis(10);
    config.metrics.report_interval = Duration::from_millis(20);

    let observed = Arc::new(Mutex::new(Vec::new()));
    let seen = observed.clone();
    let sink = Arc::new(RecordingSink::with_latency(Duration::from_millis(50)));
    let pipeline = PipelineBuilder::new(config, sink)
        .with_snapshot_callback(Box::new(move |s| {
            seen.lock().unwrap().push(s.active_workers);
        }))
        .start()
        .await
        .unwrap();

    let mut peak = 0;
    for _ in 0..30 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        let count = pipeline.pool().count().await;
        assert!((1..=3).contains(&count), "pool size {count} out of bounds");
        peak = peak.max(count);
    }
    assert_eq!(peak, 3);

    pipeline.shutdown().await.unwrap();

    let observed = observed.lock().unwrap();
    assert!(!observed.is_empty());
    assert!(observed.iter().all(|&w| w <= 3));
}
