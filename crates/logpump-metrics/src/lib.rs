//! logpump-metrics — throughput observability for the pipeline.
//!
//! Counters are plain atomics owned by a single [`Metrics`] instance that is
//! shared by `Arc` with every component that increments it. The
//! [`MetricsReporter`] drains them once per interval, so every
//! [`MetricsSnapshot`] carries per-interval deltas rather than totals.
//!
//! # Architecture
//!
//! ```text
//! Metrics
//!   ├── inc_produced()        ← producer, once per successful send
//!   ├── add_processed(n)      ← worker, once per successful flush
//!   └── set_active_workers(n) ← worker pool, on every add/remove
//!
//! MetricsReporter
//!   ├── report() → swap counters to zero, read gauge + queue occupancy
//!   └── run()    → periodic report loop until shutdown
//! ```

pub mod collector;

pub use collector::{Metrics, MetricsReporter, MetricsSnapshot, SnapshotCallback};
