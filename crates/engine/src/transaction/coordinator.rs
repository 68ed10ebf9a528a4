//! Transaction coordinator
//!
//! [`Worker::run`] drives a transaction body to a committed outcome:
//!
//! ```text
//! priority = manager.priority()
//! while !stopped:
//!     status = new ACTIVE status(priority)
//!     match body(tx):
//!         Ok(v)           -> publish post-images, CAS status to COMMITTED
//!                            won: return v;  lost: retry
//!         Aborted         -> retry (same priority)
//!         RetryRequested  -> wait until status leaves ACTIVE, retry (fresh priority)
//!         Shutdown        -> return Shutdown
//!         Invariant       -> log, return it
//! return Shutdown
//! ```
//!
//! Nested bodies run through [`Transaction::nested`] on the same attempt, so
//! only the outermost level ever catches Aborted or RetryRequested. Calling
//! `run` again from inside a body would start an independent transaction
//! whose writes outlive an aborted outer attempt; it is rejected with an
//! invariant error instead.

use super::context::Transaction;
use crate::runtime::Runtime;
use sxm_concurrency::ContentionManager;
use sxm_core::{ManagerKind, StmError, StmResult, TxStatus};
use std::cell::Cell;
use std::sync::Arc;
use tracing::{debug, error};

thread_local! {
    static IN_TRANSACTION: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as running a transaction until dropped.
struct RunGuard;

impl RunGuard {
    fn enter() -> Option<Self> {
        IN_TRANSACTION.with(|active| {
            if active.replace(true) {
                // Already inside a run; the outer guard keeps the flag
                None
            } else {
                Some(RunGuard)
            }
        })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        IN_TRANSACTION.with(|active| active.set(false));
    }
}

/// Commit and abort counts recorded by one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkerStats {
    /// Attempts this worker committed
    pub committed: u64,
    /// Attempts this worker abandoned
    pub aborted: u64,
}

/// Per-thread transaction state: one contention manager plus statistics.
///
/// A worker is not shared between threads; create one per thread with
/// [`Runtime::worker`].
#[derive(Debug)]
pub struct Worker {
    runtime: Runtime,
    manager: ContentionManager,
    stats: WorkerStats,
}

impl Worker {
    pub(crate) fn new(runtime: Runtime, manager: ContentionManager) -> Self {
        Self {
            runtime,
            manager,
            stats: WorkerStats::default(),
        }
    }

    /// Runtime this worker belongs to.
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Strategy of this worker's contention manager.
    pub fn manager_kind(&self) -> ManagerKind {
        self.manager.kind()
    }

    /// Commits and aborts recorded by this worker.
    pub fn stats(&self) -> WorkerStats {
        self.stats
    }

    /// Whether the runtime has been asked to stop.
    pub fn is_stopped(&self) -> bool {
        self.runtime.is_stopped()
    }

    fn record_commit(&mut self) {
        self.stats.committed += 1;
        self.runtime.tx_metrics().record_commit();
    }

    fn record_abort(&mut self) {
        self.stats.aborted += 1;
        self.runtime.tx_metrics().record_abort();
    }

    /// Run `body` as a transaction until it commits.
    ///
    /// The body may be invoked several times and must be safe to re-execute.
    /// Returns [`StmError::Shutdown`] if the runtime stops first, and any
    /// [`StmError::Invariant`] raised by the body or the version store.
    ///
    /// Must not be called from inside another transaction body on the same
    /// thread; use [`Transaction::nested`] there.
    pub fn run<R, F>(&mut self, mut body: F) -> StmResult<R>
    where
        F: FnMut(&mut Transaction<'_>) -> StmResult<R>,
    {
        let Some(_guard) = RunGuard::enter() else {
            error!("run called from inside a transaction body");
            return Err(StmError::invariant("re-entrant run; use Transaction::nested"));
        };

        let mut priority = self.manager.priority(self.runtime.clock());

        while !self.runtime.is_stopped() {
            let status = Arc::new(TxStatus::new(self.runtime.next_attempt_id(), priority));
            let mut tx = Transaction::new(
                Arc::clone(&status),
                &mut self.manager,
                self.runtime.stop_signal(),
            );

            let outcome = match body(&mut tx) {
                Ok(value) => match tx.commit() {
                    Ok(true) => Ok(Some(value)),
                    Ok(false) => Ok(None),
                    Err(err) => Err(err),
                },
                Err(StmError::RetryRequested) => {
                    let waited = tx.wait_for_invalidation();
                    drop(tx);
                    self.record_abort();
                    if let Err(err) = waited {
                        debug!(attempt = status.id(), error = %err, "retry wait interrupted");
                        return Err(err);
                    }
                    // Woken: start over with a fresh priority
                    priority = self.manager.priority(self.runtime.clock());
                    continue;
                }
                Err(err) => {
                    drop(tx);
                    Err(err)
                }
            };

            match outcome {
                Ok(Some(value)) => {
                    self.record_commit();
                    return Ok(value);
                }
                Ok(None) | Err(StmError::Aborted) => {
                    debug!(attempt = status.id(), priority, "attempt aborted, retrying");
                    self.record_abort();
                }
                Err(StmError::Shutdown) => {
                    self.record_abort();
                    return Err(StmError::Shutdown);
                }
                Err(StmError::Invariant(reason)) => {
                    error!(attempt = status.id(), reason = %reason, "invariant violated");
                    self.record_abort();
                    return Err(StmError::Invariant(reason));
                }
                Err(StmError::RetryRequested) => {
                    return Err(StmError::invariant("retry request escaped the coordinator"));
                }
            }
        }

        Err(StmError::Shutdown)
    }
}
