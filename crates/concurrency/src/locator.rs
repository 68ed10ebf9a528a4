//! Version records
//!
//! A [`Locator`] is one immutable entry in a cell's history. It names the
//! transaction that produced it and carries both possible outcomes:
//!
//! - `old`: the pre-image, authoritative if the writer ends up ABORTED
//! - `new`: the post-image, authoritative if the writer ends up COMMITTED
//!
//! Write locators are installed with an empty post-image slot; the writer
//! publishes its candidate into the slot immediately before it commits, so a
//! COMMITTED writer always has a post-image. Read locators (and the initial
//! locator) use the COMMITTED sentinel as writer and carry the shared value as
//! their post-image.
//!
//! Readers are tracked as a persistent linked chain, newest first. Building a
//! successor chain drops entries whose transaction is no longer live.

use once_cell::sync::OnceCell;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;
use sxm_core::{StmError, StmResult, TxState, TxStatus};

/// One immutable version record.
pub struct Locator<T> {
    writer: Arc<TxStatus>,
    old: Option<Arc<T>>,
    new: OnceCell<Arc<T>>,
    readers: ReaderChain,
}

impl<T> Locator<T> {
    /// First locator of a cell: committed, no readers.
    pub fn initial(value: Arc<T>) -> Self {
        Self::read(value, ReaderChain::empty())
    }

    /// Locator installed by OpenWrite. The post-image is published later.
    pub fn written(writer: Arc<TxStatus>, base: Arc<T>) -> Self {
        Self {
            writer,
            old: Some(base),
            new: OnceCell::new(),
            readers: ReaderChain::empty(),
        }
    }

    /// Locator installed by OpenRead: same value, extended reader chain.
    pub fn read(value: Arc<T>, readers: ReaderChain) -> Self {
        Self {
            writer: TxStatus::committed(),
            old: None,
            new: OnceCell::with_value(value),
            readers,
        }
    }

    /// Transaction that produced this version.
    #[inline]
    pub fn writer(&self) -> &Arc<TxStatus> {
        &self.writer
    }

    /// Transactions that opened this exact version for read.
    #[inline]
    pub fn readers(&self) -> &ReaderChain {
        &self.readers
    }

    /// Pre-image, if this is a write locator.
    pub fn old_value(&self) -> Option<&Arc<T>> {
        self.old.as_ref()
    }

    /// Post-image, once published.
    pub fn new_value(&self) -> Option<&Arc<T>> {
        self.new.get()
    }

    /// Store the writer's post-image. Must happen before the writer commits.
    pub fn publish(&self, value: Arc<T>) -> StmResult<()> {
        self.new.set(value).map_err(|_| {
            StmError::invariant(format!(
                "post-image published twice for attempt {}",
                self.writer.id()
            ))
        })
    }

    /// Value authoritative under the writer's terminal state.
    ///
    /// Fails if the writer is still live, or if the image its state selects
    /// is missing.
    pub fn resolved_value(&self) -> StmResult<Arc<T>> {
        match self.writer.state() {
            TxState::Committed => self.committed_image(),
            TxState::Aborted => self.aborted_image(),
            state @ (TxState::Active | TxState::Waiting) => Err(StmError::invariant(format!(
                "resolved a locator whose writer is still {}",
                state
            ))),
        }
    }

    /// Last committed value without waiting on a live writer.
    pub fn last_committed(&self) -> StmResult<Arc<T>> {
        match self.writer.state() {
            TxState::Committed => self.committed_image(),
            TxState::Aborted | TxState::Active | TxState::Waiting => self.aborted_image(),
        }
    }

    fn committed_image(&self) -> StmResult<Arc<T>> {
        self.new.get().cloned().ok_or_else(|| {
            StmError::invariant(format!(
                "committed attempt {} left no post-image",
                self.writer.id()
            ))
        })
    }

    fn aborted_image(&self) -> StmResult<Arc<T>> {
        self.old.clone().ok_or_else(|| {
            StmError::invariant(format!(
                "attempt {} has no pre-image to fall back to",
                self.writer.id()
            ))
        })
    }
}

impl<T> fmt::Debug for Locator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Locator")
            .field("writer", &self.writer)
            .field("published", &self.new.get().is_some())
            .field("readers", &self.readers.len())
            .finish()
    }
}

struct ReaderLink {
    status: Arc<TxStatus>,
    prev: Option<Arc<ReaderLink>>,
}

/// Persistent chain of reader statuses, newest first.
#[derive(Clone, Default)]
pub struct ReaderChain {
    head: Option<Arc<ReaderLink>>,
}

impl ReaderChain {
    /// Chain with no readers.
    pub fn empty() -> Self {
        Self { head: None }
    }

    /// Iterate over every recorded reader, live or not.
    pub fn iter(&self) -> ReaderIter<'_> {
        ReaderIter {
            next: self.head.as_deref(),
        }
    }

    /// Number of recorded readers.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Whether no reader is recorded.
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Whether `status` is recorded in this chain.
    pub fn contains(&self, status: &Arc<TxStatus>) -> bool {
        self.iter().any(|reader| Arc::ptr_eq(reader, status))
    }

    /// First live reader other than `me`.
    pub fn first_conflict(&self, me: &Arc<TxStatus>) -> Option<Arc<TxStatus>> {
        self.iter()
            .find(|reader| reader.is_live() && !Arc::ptr_eq(reader, me))
            .cloned()
    }

    /// Successor chain with `me` as the newest reader.
    ///
    /// Readers that are no longer live are dropped. When nothing needs to be
    /// dropped the existing chain is shared as the tail.
    pub fn with_reader(&self, me: &Arc<TxStatus>) -> ReaderChain {
        let all_live = self
            .iter()
            .all(|reader| reader.is_live() && !Arc::ptr_eq(reader, me));
        if all_live {
            return ReaderChain {
                head: Some(Arc::new(ReaderLink {
                    status: Arc::clone(me),
                    prev: self.head.clone(),
                })),
            };
        }

        let survivors: SmallVec<[&Arc<TxStatus>; 8]> = self
            .iter()
            .filter(|reader| reader.is_live() && !Arc::ptr_eq(reader, me))
            .collect();
        // Rebuild oldest first so the newest survivor stays closest to the head
        let mut head = None;
        for reader in survivors.into_iter().rev() {
            head = Some(Arc::new(ReaderLink {
                status: Arc::clone(reader),
                prev: head,
            }));
        }
        ReaderChain {
            head: Some(Arc::new(ReaderLink {
                status: Arc::clone(me),
                prev: head,
            })),
        }
    }
}

impl fmt::Debug for ReaderChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Iterator over a [`ReaderChain`].
pub struct ReaderIter<'a> {
    next: Option<&'a ReaderLink>,
}

impl<'a> Iterator for ReaderIter<'a> {
    type Item = &'a Arc<TxStatus>;

    fn next(&mut self) -> Option<Self::Item> {
        let link = self.next?;
        self.next = link.prev.as_deref();
        Some(&link.status)
    }
}
