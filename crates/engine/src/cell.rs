//! Typed transactional cell
//!
//! [`TCell`] is the handle user code holds for one transactional object. Every
//! access goes through the attempt's [`Transaction`], which routes reads to
//! OpenRead and writes to OpenWrite and caches the result for the rest of the
//! attempt.
//!
//! # Example
//!
//! ```ignore
//! let balance = TCell::new(100i64);
//! runtime.run(|tx| {
//!     let current = *balance.read(tx)?;
//!     balance.set(tx, current - 10)
//! })?;
//! ```

use crate::transaction::Transaction;
use std::fmt;
use std::sync::Arc;
use sxm_concurrency::VersionedCell;
use sxm_core::StmResult;

/// Shared handle to one transactional value.
///
/// Cloning the handle does not clone the value: both handles refer to the
/// same cell.
pub struct TCell<T> {
    inner: Arc<VersionedCell<T>>,
}

impl<T: Clone + Send + Sync + 'static> TCell<T> {
    /// New cell holding committed `value`.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(VersionedCell::new(value)),
        }
    }

    /// Value as seen by this attempt.
    pub fn read(&self, tx: &mut Transaction<'_>) -> StmResult<Arc<T>> {
        tx.open_read(&self.inner)
    }

    /// This attempt's private working copy.
    ///
    /// The copy becomes visible to other transactions only if the outermost
    /// attempt commits.
    pub fn write<'t>(&self, tx: &'t mut Transaction<'_>) -> StmResult<&'t mut T> {
        tx.open_write(&self.inner)
    }

    /// Replace the value.
    pub fn set(&self, tx: &mut Transaction<'_>, value: T) -> StmResult<()> {
        *self.write(tx)? = value;
        Ok(())
    }

    /// Update the value in place and return what `f` returns.
    pub fn modify<R>(&self, tx: &mut Transaction<'_>, f: impl FnOnce(&mut T) -> R) -> StmResult<R> {
        Ok(f(self.write(tx)?))
    }

    /// Record this attempt as a reader if the value is still `snapshot`.
    ///
    /// Returns `false` if another transaction has committed a different value
    /// since `snapshot` was taken.
    pub fn upgrade(&self, tx: &mut Transaction<'_>, snapshot: &Arc<T>) -> StmResult<bool> {
        tx.upgrade(&self.inner, snapshot)
    }

    /// Last committed value, read outside any transaction.
    pub fn snapshot(&self) -> StmResult<Arc<T>> {
        self.inner.snapshot()
    }
}

impl<T> Clone for TCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for TCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TCell").field(&self.inner).finish()
    }
}
