//! Transaction status
//!
//! One [`TxStatus`] tracks one attempt of a transaction. It starts ACTIVE and
//! moves to COMMITTED or ABORTED exactly once, through a compare-and-swap on
//! the state word. Every transition wakes threads blocked on the status.
//!
//! WAITING is not a terminal state: it is an ACTIVE status whose `waiting`
//! flag is raised, announcing that its owner is itself blocked on another
//! transaction. [`TxStatus::state`] folds the flag into the reported state.
//!
//! Two shared sentinels, [`TxStatus::committed`] and [`TxStatus::aborted`],
//! stand in for "no real writer". They carry `i64::MAX` priority so they never
//! lose a priority comparison, and their state can never change.

use crate::error::{StmError, StmResult};
use crate::stop::StopSignal;
use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

const ACTIVE: u8 = 0;
const COMMITTED: u8 = 1;
const ABORTED: u8 = 2;

static COMMITTED_SENTINEL: Lazy<Arc<TxStatus>> =
    Lazy::new(|| Arc::new(TxStatus::sentinel(COMMITTED)));
static ABORTED_SENTINEL: Lazy<Arc<TxStatus>> =
    Lazy::new(|| Arc::new(TxStatus::sentinel(ABORTED)));

/// Observable lifecycle state of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxState {
    /// Running.
    Active,
    /// Running, but blocked on another transaction.
    Waiting,
    /// Committed; its writes are authoritative.
    Committed,
    /// Aborted; its writes are discarded.
    Aborted,
}

impl TxState {
    /// ACTIVE or WAITING.
    pub fn is_live(self) -> bool {
        matches!(self, TxState::Active | TxState::Waiting)
    }
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TxState::Active => "ACTIVE",
            TxState::Waiting => "WAITING",
            TxState::Committed => "COMMITTED",
            TxState::Aborted => "ABORTED",
        };
        f.write_str(name)
    }
}

/// Mutable record of one transaction attempt.
pub struct TxStatus {
    id: u64,
    state: AtomicU8,
    priority: i64,
    waiting: AtomicBool,
    monitor: Mutex<()>,
    changed: Condvar,
}

impl TxStatus {
    /// Create an ACTIVE status.
    ///
    /// Higher `priority` means more important.
    pub fn new(id: u64, priority: i64) -> Self {
        Self {
            id,
            state: AtomicU8::new(ACTIVE),
            priority,
            waiting: AtomicBool::new(false),
            monitor: Mutex::new(()),
            changed: Condvar::new(),
        }
    }

    fn sentinel(state: u8) -> Self {
        Self {
            id: 0,
            state: AtomicU8::new(state),
            priority: i64::MAX,
            waiting: AtomicBool::new(false),
            monitor: Mutex::new(()),
            changed: Condvar::new(),
        }
    }

    /// Shared permanently-COMMITTED status.
    pub fn committed() -> Arc<TxStatus> {
        Arc::clone(&COMMITTED_SENTINEL)
    }

    /// Shared permanently-ABORTED status.
    pub fn aborted() -> Arc<TxStatus> {
        Arc::clone(&ABORTED_SENTINEL)
    }

    /// Attempt identifier (0 for sentinels).
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Priority assigned when the attempt started.
    #[inline]
    pub fn priority(&self) -> i64 {
        self.priority
    }

    /// Current state, with the waiting flag folded in.
    pub fn state(&self) -> TxState {
        match self.state.load(Ordering::SeqCst) {
            ACTIVE if self.waiting.load(Ordering::SeqCst) => TxState::Waiting,
            ACTIVE => TxState::Active,
            COMMITTED => TxState::Committed,
            ABORTED => TxState::Aborted,
            other => unreachable!("transaction status holds invalid state tag {}", other),
        }
    }

    /// ACTIVE or WAITING.
    #[inline]
    pub fn is_live(&self) -> bool {
        self.state.load(Ordering::SeqCst) == ACTIVE
    }

    /// Whether the owner has announced that it is blocked.
    #[inline]
    pub fn is_waiting(&self) -> bool {
        self.waiting.load(Ordering::SeqCst)
    }

    /// ACTIVE -> COMMITTED. Returns whether this caller won the transition.
    pub fn commit(&self) -> bool {
        self.transition(COMMITTED)
    }

    /// ACTIVE (waiting or not) -> ABORTED. Returns whether this caller won.
    ///
    /// May be called by the owner or by a contention manager acting for
    /// another transaction.
    pub fn abort(&self) -> bool {
        self.transition(ABORTED)
    }

    fn transition(&self, target: u8) -> bool {
        let won = self
            .state
            .compare_exchange(ACTIVE, target, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        self.notify();
        won
    }

    /// Announce that the owner is blocked on another transaction.
    pub fn set_waiting(&self) {
        self.waiting.store(true, Ordering::SeqCst);
        self.notify();
    }

    /// Withdraw the waiting announcement.
    pub fn clear_waiting(&self) {
        self.waiting.store(false, Ordering::SeqCst);
        self.notify();
    }

    fn notify(&self) {
        let _guard = self.monitor.lock();
        self.changed.notify_all();
    }

    /// Block while this status is ACTIVE (waiting or not).
    ///
    /// Wakes at least once per poll interval; returns
    /// [`StmError::Shutdown`] once the stop flag is raised.
    pub fn block_while_active(&self, stop: &StopSignal) -> StmResult<()> {
        self.block_until(stop, |status| !status.is_live())
    }

    /// Block while this status is ACTIVE and not waiting.
    pub fn block_while_active_and_not_waiting(&self, stop: &StopSignal) -> StmResult<()> {
        self.block_until(stop, |status| !status.is_live() || status.is_waiting())
    }

    fn block_until(&self, stop: &StopSignal, resolved: impl Fn(&Self) -> bool) -> StmResult<()> {
        let mut guard = self.monitor.lock();
        while !resolved(self) {
            if stop.is_stopped() {
                tracing::warn!(attempt = self.id, "wait interrupted by shutdown");
                return Err(StmError::Shutdown);
            }
            self.changed.wait_for(&mut guard, stop.poll_interval());
        }
        Ok(())
    }
}

impl fmt::Debug for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxStatus")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("state", &self.state())
            .finish()
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxStatus[{}, {}, {}]", self.id, self.priority, self.state())
    }
}
