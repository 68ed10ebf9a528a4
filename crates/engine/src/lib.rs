//! Transaction engine for SXM
//!
//! This crate provides the user-facing execution layer on top of the version
//! store:
//! - Runtime: shared handle owning configuration, stop flag and metrics
//! - Worker: per-thread coordinator that retries bodies until they commit
//! - Transaction: the per-attempt context passed into every body
//! - TCell: typed handle to one transactional value
//! - Driver/Benchmark: hosting for timed multi-threaded workloads

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cell;
pub mod harness;
pub mod runtime;
pub mod transaction;

pub use cell::TCell;
pub use harness::{BenchReport, Benchmark, Driver, SharedCounter};
pub use runtime::{MetricsSnapshot, Runtime, RuntimeBuilder, TxMetrics};
pub use transaction::{retry, Transaction, Worker, WorkerStats};

// Re-export the building blocks bodies commonly need
pub use sxm_core::{ManagerKind, StmConfig, StmError, StmResult};
