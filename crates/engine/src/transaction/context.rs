//! Per-attempt transaction context
//!
//! A [`Transaction`] is created by the coordinator for every attempt and
//! passed by `&mut` into the body. It caches each cell it opens, keyed by the
//! cell's address, so repeated accesses within the attempt never reopen the
//! version store:
//!
//! - a read entry holds the shared value returned by OpenRead
//! - a write entry holds the installed locator and the private working copy
//!
//! At commit the working copies are published as post-images, then the status
//! is moved to COMMITTED. Dropping a context whose status is still live aborts
//! it, so an unwinding body never leaves a live writer behind.

use rustc_hash::FxHashMap;
use std::any::Any;
use std::sync::Arc;
use sxm_concurrency::{ConflictScope, ContentionManager, Locator, VersionedCell, WriteGrant};
use sxm_core::{StmError, StmResult, StopSignal, TxStatus};
use tracing::{debug, trace};

/// A cell opened for write whose post-image is still pending.
trait PendingWrite {
    fn publish(&self) -> StmResult<()>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct ReadEntry<T> {
    _cell: Arc<VersionedCell<T>>,
    value: Arc<T>,
}

struct WriteEntry<T> {
    _cell: Arc<VersionedCell<T>>,
    // None when the attempt had already committed at open time
    locator: Option<Arc<Locator<T>>>,
    working: Arc<T>,
}

impl<T: Send + Sync + 'static> PendingWrite for WriteEntry<T> {
    fn publish(&self) -> StmResult<()> {
        match &self.locator {
            Some(locator) => locator.publish(Arc::clone(&self.working)),
            None => Ok(()),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

enum Opened {
    Read(Box<dyn Any>),
    Write(Box<dyn PendingWrite>),
}

fn cell_key<T>(cell: &Arc<VersionedCell<T>>) -> usize {
    Arc::as_ptr(cell) as *const () as usize
}

fn wrong_type(key: usize) -> StmError {
    StmError::invariant(format!("cached entry for cell {:#x} has the wrong type", key))
}

/// One attempt of a transaction.
pub struct Transaction<'w> {
    status: Arc<TxStatus>,
    manager: &'w mut ContentionManager,
    stop: &'w StopSignal,
    depth: usize,
    opened: FxHashMap<usize, Opened>,
}

impl<'w> Transaction<'w> {
    pub(crate) fn new(
        status: Arc<TxStatus>,
        manager: &'w mut ContentionManager,
        stop: &'w StopSignal,
    ) -> Self {
        Self {
            status,
            manager,
            stop,
            depth: 1,
            opened: FxHashMap::default(),
        }
    }

    /// Status of this attempt.
    pub fn status(&self) -> &Arc<TxStatus> {
        &self.status
    }

    /// Attempt identifier.
    pub fn id(&self) -> u64 {
        self.status.id()
    }

    /// Priority the attempt runs with.
    pub fn priority(&self) -> i64 {
        self.status.priority()
    }

    /// Nesting depth: 1 for the outermost body.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of distinct cells opened so far.
    pub fn opened_cells(&self) -> usize {
        self.opened.len()
    }

    /// Ask to be re-run once something this attempt read has changed.
    ///
    /// The returned error must be propagated out of the body.
    pub fn retry<R>(&self) -> StmResult<R> {
        debug!(attempt = self.id(), "retry requested");
        Err(StmError::RetryRequested)
    }

    /// Run `body` as a nested transaction.
    ///
    /// The nested body shares this attempt's status and cache: its writes
    /// only take effect if the outermost attempt commits, and any error it
    /// returns propagates unchanged.
    pub fn nested<R, F>(&mut self, body: F) -> StmResult<R>
    where
        F: FnOnce(&mut Transaction<'w>) -> StmResult<R>,
    {
        self.depth += 1;
        let outcome = body(self);
        self.depth -= 1;
        if let Err(err) = &outcome {
            trace!(attempt = self.id(), depth = self.depth, error = %err, "nested body unwound");
        }
        outcome
    }

    fn scope(&mut self) -> ConflictScope<'_> {
        ConflictScope {
            me: &self.status,
            manager: &mut *self.manager,
            stop: self.stop,
        }
    }

    /// Cached OpenRead.
    pub(crate) fn open_read<T>(&mut self, cell: &Arc<VersionedCell<T>>) -> StmResult<Arc<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        let key = cell_key(cell);
        match self.opened.get(&key) {
            Some(Opened::Read(entry)) => {
                trace!(attempt = self.id(), "read cache hit");
                let entry = entry
                    .downcast_ref::<ReadEntry<T>>()
                    .ok_or_else(|| wrong_type(key))?;
                return Ok(Arc::clone(&entry.value));
            }
            Some(Opened::Write(entry)) => {
                let entry = entry
                    .as_any()
                    .downcast_ref::<WriteEntry<T>>()
                    .ok_or_else(|| wrong_type(key))?;
                return Ok(Arc::clone(&entry.working));
            }
            None => {}
        }

        let value = cell.open_read(&mut self.scope())?;
        self.opened.insert(
            key,
            Opened::Read(Box::new(ReadEntry {
                _cell: Arc::clone(cell),
                value: Arc::clone(&value),
            })),
        );
        Ok(value)
    }

    /// Cached OpenWrite. Repeated writes mutate the same working copy.
    pub(crate) fn open_write<T>(&mut self, cell: &Arc<VersionedCell<T>>) -> StmResult<&mut T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let key = cell_key(cell);
        if !matches!(self.opened.get(&key), Some(Opened::Write(_))) {
            let entry = match cell.open_write(&mut self.scope())? {
                WriteGrant::Installed { locator, candidate } => WriteEntry {
                    _cell: Arc::clone(cell),
                    locator: Some(locator),
                    working: candidate,
                },
                WriteGrant::Committed(base) => WriteEntry {
                    _cell: Arc::clone(cell),
                    locator: None,
                    working: base,
                },
            };
            self.opened.insert(key, Opened::Write(Box::new(entry)));
        }

        match self.opened.get_mut(&key) {
            Some(Opened::Write(entry)) => {
                let entry = entry
                    .as_any_mut()
                    .downcast_mut::<WriteEntry<T>>()
                    .ok_or_else(|| wrong_type(key))?;
                Ok(Arc::make_mut(&mut entry.working))
            }
            _ => Err(wrong_type(key)),
        }
    }

    /// Cached Upgrade.
    pub(crate) fn upgrade<T>(
        &mut self,
        cell: &Arc<VersionedCell<T>>,
        snapshot: &Arc<T>,
    ) -> StmResult<bool>
    where
        T: Clone + Send + Sync + 'static,
    {
        let key = cell_key(cell);
        if self.opened.contains_key(&key) {
            let current = self.open_read(cell)?;
            return Ok(Arc::ptr_eq(&current, snapshot));
        }

        let upgraded = cell.upgrade(&mut self.scope(), snapshot)?;
        if upgraded {
            self.opened.insert(
                key,
                Opened::Read(Box::new(ReadEntry {
                    _cell: Arc::clone(cell),
                    value: Arc::clone(snapshot),
                })),
            );
        }
        Ok(upgraded)
    }

    /// Publish every post-image, then try to commit the status.
    ///
    /// Returns whether this attempt won the commit.
    pub(crate) fn commit(self) -> StmResult<bool> {
        for opened in self.opened.values() {
            if let Opened::Write(entry) = opened {
                entry.publish()?;
            }
        }
        Ok(self.status.commit())
    }

    /// Block until the status leaves ACTIVE, announcing that this attempt is
    /// waiting in the meantime.
    pub(crate) fn wait_for_invalidation(&self) -> StmResult<()> {
        self.status.set_waiting();
        let outcome = self.status.block_while_active(self.stop);
        self.status.clear_waiting();
        outcome
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.status.abort() {
            debug!(attempt = self.status.id(), "abandoned attempt aborted");
        }
    }
}
