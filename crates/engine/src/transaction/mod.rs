//! Transaction execution
//!
//! This module provides:
//! - Transaction: the per-attempt context threaded through every cell access
//! - Worker: the per-thread coordinator that retries bodies until they commit
//! - retry(): explicit wait-and-retry from inside a body
//!
//! # Architecture
//!
//! Nothing is kept in thread-locals. A [`Worker`] owns the contention manager
//! for its thread and creates a fresh [`Transaction`] for each attempt; the
//! body receives it by `&mut` and passes it to every [`crate::TCell`] call.

pub mod context;
pub mod coordinator;

pub use context::Transaction;
pub use coordinator::{Worker, WorkerStats};

use sxm_core::{StmError, StmResult};

/// Request a wait-and-retry of the enclosing transaction.
///
/// The attempt blocks until something it read changes, then the body is run
/// again with a fresh status and priority.
pub fn retry<R>() -> StmResult<R> {
    Err(StmError::RetryRequested)
}
