//! Public types for the SXM API.
//!
//! This module re-exports types from internal crates with a clean public interface.

// Transactional handles
pub use sxm_engine::{TCell, Transaction, Worker, WorkerStats};

// Runtime handle behind Stm
pub use sxm_engine::{MetricsSnapshot, Runtime, RuntimeBuilder};

// Transaction outcomes
pub use sxm_core::{StmError, StmResult};

// Configuration
pub use sxm_core::{ManagerKind, StmConfig};

// Benchmark hosting
pub use sxm_engine::{BenchReport, Benchmark, Driver, SharedCounter};

// Explicit retry
pub use sxm_engine::retry;

// Attempt status, as exposed by Transaction::status
pub use sxm_core::{TxState, TxStatus};
