//! Fixed-rate item generation with adaptive pacing.
//!
//! Each tick the producer reads queue occupancy and, if the queue is
//! filling up, waits a little before sending. The ladder is bounded so the
//! extra delay never exceeds twice the pace unit:
//!
//! ```text
//! usage > 0.9        → 2   × unit
//! usage in (0.8,0.9] → 1   × unit
//! usage in (0.5,0.8] → 0.5 × unit
//! otherwise          → 0
//! ```
//!
//! A full queue still blocks the send; pacing only keeps the producer from
//! hammering it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use logpump_core::config::ProducerConfig;
use logpump_core::{QueueSender, WorkItem};
use logpump_metrics::Metrics;

/// Builds the item for a given sequence number (0, 1, 2, … per successful send).
pub type ItemGenerator = Box<dyn FnMut(u64) -> WorkItem + Send>;

/// Extra delay to apply before a send at the given occupancy.
pub fn pacing_delay(usage: f64, unit: Duration) -> Duration {
    if usage > 0.9 {
        unit * 2
    } else if usage > 0.8 {
        unit
    } else if usage > 0.5 {
        unit / 2
    } else {
        Duration::ZERO
    }
}

/// Summary returned when the producer stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerExit {
    /// Items successfully enqueued.
    pub sent: u64,
}

pub struct Producer {
    queue: QueueSender<WorkItem>,
    metrics: Arc<Metrics>,
    interval: Duration,
    pace_unit: Duration,
    generator: ItemGenerator,
}

impl Producer {
    /// Create a producer emitting the configured payload and severity.
    pub fn new(queue: QueueSender<WorkItem>, metrics: Arc<Metrics>, config: &ProducerConfig) -> Self {
        let payload = config.payload.clone();
        let severity = config.severity;
        Self {
            queue,
            metrics,
            interval: config.interval,
            pace_unit: config.pace_unit,
            generator: Box::new(move |_| WorkItem::new(payload.clone(), severity)),
        }
    }

    /// Replace the item generator.
    pub fn with_generator(mut self, generator: ItemGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Produce until the shutdown signal fires or the queue is closed.
    ///
    /// Cancellation is observed while waiting for a tick, while pacing, and
    /// while blocked on a full queue. An item whose send is abandoned this
    /// way is never enqueued and never counted.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> ProducerExit {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sent: u64 = 0;

        info!(
            interval_us = self.interval.as_micros() as u64,
            capacity = self.queue.capacity(),
            "producer started"
        );

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }

            let delay = pacing_delay(self.queue.usage(), self.pace_unit);
            if !delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let item = (self.generator)(sent);
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    debug!("pending send abandoned on shutdown");
                    break;
                }
                res = self.queue.send(item) => match res {
                    Ok(()) => {
                        sent += 1;
                        self.metrics.inc_produced();
                    }
                    Err(e) => {
                        warn!(error = %e, "queue closed under producer");
                        break;
                    }
                },
            }
        }

        info!(sent, "producer stopped");
        ProducerExit { sent }
    }
}
