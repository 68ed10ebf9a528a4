//! Versioned cell
//!
//! A [`VersionedCell`] is the synchronization wrapper around one transactional
//! object. It holds an atomic pointer to the current [`Locator`]; the only way
//! to change it is a compare-and-swap against the locator the caller last
//! observed, so installing a version is linearizable and losers simply retry.
//!
//! ## OpenWrite
//!
//! ```text
//! 1. load current locator
//! 2. live writer?           -> resolve conflict, goto 1
//! 3. base = resolved value  (post-image if COMMITTED, pre-image if ABORTED)
//! 4. me ABORTED?            -> Err(Aborted);  me COMMITTED? -> base
//! 5. live reader != me?     -> resolve conflict, goto 1
//! 6. CAS in {writer: me, old: base}; lost -> goto 1
//! 7. hand back a private clone of base
//! ```
//!
//! OpenRead performs steps 1-4, then installs a locator carrying the same
//! value with `me` added to the reader chain. Readers that lose the install
//! race retry so they are never missing from the chain.

use crate::locator::Locator;
use crate::manager::ContentionManager;
use arc_swap::ArcSwap;
use std::fmt;
use std::sync::Arc;
use sxm_core::{StmError, StmResult, StopSignal, TxState, TxStatus};
use tracing::{debug, trace};

/// Everything a cell needs to know about the attempt opening it.
pub struct ConflictScope<'a> {
    /// Status of the attempt
    pub me: &'a Arc<TxStatus>,
    /// The attempt's contention manager
    pub manager: &'a mut ContentionManager,
    /// Shutdown flag consulted by blocking strategies
    pub stop: &'a StopSignal,
}

impl ConflictScope<'_> {
    /// Hand `blocker` to the contention manager.
    pub fn resolve(&mut self, blocker: &TxStatus) -> StmResult<()> {
        debug!(
            attempt = self.me.id(),
            priority = self.me.priority(),
            blocker = blocker.id(),
            blocker_priority = blocker.priority(),
            "conflict"
        );
        self.manager.resolve_conflict(self.me, blocker, self.stop)
    }

    /// Fail fast once the attempt has been aborted or the runtime is stopping.
    pub fn ensure_not_aborted(&self) -> StmResult<()> {
        if self.me.state() == TxState::Aborted {
            return Err(StmError::Aborted);
        }
        if self.stop.is_stopped() {
            return Err(StmError::Shutdown);
        }
        Ok(())
    }
}

/// Result of a successful OpenWrite.
pub enum WriteGrant<T> {
    /// A write locator owned by the attempt is now current.
    Installed {
        /// The installed locator; its post-image is published at commit
        locator: Arc<Locator<T>>,
        /// Private copy of the base value for the attempt to mutate
        candidate: Arc<T>,
    },
    /// The attempt had already committed; the base value is returned as is.
    Committed(Arc<T>),
}

/// Atomic slot holding the current version of one object.
pub struct VersionedCell<T> {
    current: ArcSwap<Locator<T>>,
}

impl<T: Clone + Send + Sync + 'static> VersionedCell<T> {
    /// Create a cell whose first version is committed `value`.
    pub fn new(value: T) -> Self {
        Self {
            current: ArcSwap::from_pointee(Locator::initial(Arc::new(value))),
        }
    }

    /// The current locator.
    pub fn current(&self) -> Arc<Locator<T>> {
        self.current.load_full()
    }

    /// Replace `expected` with `next` if `expected` is still current.
    pub(crate) fn try_install(&self, expected: &Arc<Locator<T>>, next: Arc<Locator<T>>) -> bool {
        let previous = self.current.compare_and_swap(expected, next);
        Arc::ptr_eq(&*previous, expected)
    }

    /// Settle the current locator: resolve conflicts with a live writer, then
    /// return the locator together with its authoritative value.
    ///
    /// `None` means a conflict was handled and the caller must start over.
    fn settle(&self, scope: &mut ConflictScope<'_>) -> StmResult<Option<(Arc<Locator<T>>, Arc<T>)>> {
        let locator = self.current();
        let writer = locator.writer();
        if writer.is_live() {
            if Arc::ptr_eq(writer, scope.me) {
                return Err(StmError::invariant(format!(
                    "attempt {} reopened a cell it is already writing",
                    scope.me.id()
                )));
            }
            scope.resolve(writer)?;
            return Ok(None);
        }
        let base = locator.resolved_value()?;
        Ok(Some((locator, base)))
    }

    /// Open the cell for writing on behalf of `scope.me`.
    pub fn open_write(&self, scope: &mut ConflictScope<'_>) -> StmResult<WriteGrant<T>> {
        loop {
            scope.ensure_not_aborted()?;
            let Some((locator, base)) = self.settle(scope)? else {
                continue;
            };

            match scope.me.state() {
                TxState::Aborted => return Err(StmError::Aborted),
                TxState::Committed => return Ok(WriteGrant::Committed(base)),
                TxState::Active | TxState::Waiting => {}
            }

            if let Some(reader) = locator.readers().first_conflict(scope.me) {
                scope.resolve(&reader)?;
                continue;
            }

            let written = Arc::new(Locator::written(Arc::clone(scope.me), Arc::clone(&base)));
            if self.try_install(&locator, Arc::clone(&written)) {
                let candidate = Arc::new(T::clone(&base));
                return Ok(WriteGrant::Installed {
                    locator: written,
                    candidate,
                });
            }
            trace!(attempt = scope.me.id(), "lost write install race");
        }
    }

    /// Open the cell for reading on behalf of `scope.me`.
    ///
    /// Returns the shared value; it is never cloned.
    pub fn open_read(&self, scope: &mut ConflictScope<'_>) -> StmResult<Arc<T>> {
        loop {
            scope.ensure_not_aborted()?;
            let Some((locator, version)) = self.settle(scope)? else {
                continue;
            };

            match scope.me.state() {
                TxState::Aborted => return Err(StmError::Aborted),
                TxState::Committed => return Ok(version),
                TxState::Active | TxState::Waiting => {}
            }

            if locator.readers().contains(scope.me) {
                return Ok(version);
            }

            let next = Locator::read(Arc::clone(&version), locator.readers().with_reader(scope.me));
            if self.try_install(&locator, Arc::new(next)) {
                return Ok(version);
            }
            trace!(attempt = scope.me.id(), "lost read install race");
        }
    }

    /// Promote `scope.me` to a recorded reader if the authoritative value is
    /// still `snapshot`.
    ///
    /// Returns `false`, without recording anything, if the value has changed.
    pub fn upgrade(&self, scope: &mut ConflictScope<'_>, snapshot: &Arc<T>) -> StmResult<bool> {
        loop {
            scope.ensure_not_aborted()?;
            let Some((locator, version)) = self.settle(scope)? else {
                continue;
            };
            if !Arc::ptr_eq(&version, snapshot) {
                return Ok(false);
            }
            if locator.readers().contains(scope.me) {
                return Ok(true);
            }

            let next = Locator::read(version, locator.readers().with_reader(scope.me));
            if self.try_install(&locator, Arc::new(next)) {
                return Ok(true);
            }
            trace!(attempt = scope.me.id(), "lost upgrade install race");
        }
    }

    /// Last committed value. Never blocks and never consults a manager.
    pub fn snapshot(&self) -> StmResult<Arc<T>> {
        self.current().last_committed()
    }
}

impl<T> fmt::Debug for VersionedCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionedCell")
            .field("current", &*self.current.load())
            .finish()
    }
}
