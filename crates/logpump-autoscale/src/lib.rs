//! logpump-autoscale — reactive worker pool scaling.
//!
//! Samples queue occupancy and pool size on a fixed interval and adjusts
//! the pool by at most one worker per tick.
//!
//! # Scaling Algorithm
//!
//! ```text
//! usage   = queue_len / queue_cap
//! workers = pool.count()
//!
//! if usage > scale_up_threshold and workers < max_workers:
//!     AddWorker
//! elif usage < scale_down_threshold and workers > min_workers:
//!     RemoveWorker
//! ```
//!
//! One step per tick bounds churn to a single worker per interval, and the
//! `elif` guarantees a tick never applies both actions even when the
//! thresholds overlap.

pub mod scaler;

pub use scaler::{AutoScaler, ScaleDecision};
