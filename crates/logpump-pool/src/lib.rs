//! logpump-pool — the consuming side of the pipeline.
//!
//! A [`Worker`] pulls items from the shared queue, accumulates them into a
//! batch and flushes the batch to the sink when it is full or when the
//! batch timeout elapses. The [`WorkerPool`] is the only component that
//! creates or stops workers.
//!
//! # Worker lifecycle
//!
//! ```text
//! Running ──(stop signal | queue closed)──▶ Draining ──(final flush)──▶ Terminated
//! ```
//!
//! A worker never drops an item it has accepted: whatever is buffered when
//! it leaves `Running` is flushed exactly once before it terminates.

pub mod pool;
pub mod worker;

pub use pool::{JoinSummary, WorkerPool};
pub use worker::{ExitTotals, StopReason, Worker, WorkerExit};
