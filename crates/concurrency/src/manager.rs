//! Contention managers
//!
//! When transaction A is about to conflict with a live transaction B, A's
//! contention manager decides whether A waits for B, aborts B, or both.
//!
//! | Strategy | On conflict | Priority |
//! |----------|-------------|----------|
//! | Aggressive | abort B | 0 |
//! | Passive | wait until B leaves ACTIVE (can deadlock) | 0 |
//! | Backoff | sleep in `[0, 2^attempts)` ms, then abort B if still live | 0 |
//! | Priority | abort B if `B.priority <= A.priority`, else wait | clock |
//! | Greedy | abort B if waiting or lower priority, else announce waiting and wait | clock |
//! | Wait | abort B if waiting, else announce waiting and wait | 0 |
//!
//! "clock" priorities come from a shared [`PriorityClock`] and strictly
//! decrease, so earlier transactions outrank later ones.
//!
//! Aggressive and Backoff can livelock under adversarial scheduling.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicI64, Ordering};
use std::thread;
use std::time::Duration;
use sxm_core::config::{DEFAULT_MAX_BACKOFF_EXPONENT, MAX_BACKOFF_EXPONENT_LIMIT};
use sxm_core::{ManagerKind, StmConfig, StmResult, StopSignal, TxStatus};
use tracing::trace;

/// Shared source of strictly decreasing priorities.
#[derive(Debug, Default)]
pub struct PriorityClock {
    ticks: AtomicI64,
}

impl PriorityClock {
    /// Create a clock whose first priority is `i64::MAX - 1`.
    pub fn new() -> Self {
        Self {
            ticks: AtomicI64::new(0),
        }
    }

    /// Next priority: lower than every priority handed out before.
    pub fn next(&self) -> i64 {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        i64::MAX - tick
    }
}

/// State for the exponential backoff strategy.
#[derive(Debug)]
pub struct Backoff {
    attempts: u32,
    max_exponent: u32,
    rng: StdRng,
}

impl Backoff {
    /// Create with the given exponent cap, clamped to
    /// [`MAX_BACKOFF_EXPONENT_LIMIT`].
    pub fn new(max_exponent: u32) -> Self {
        Self {
            attempts: 0,
            max_exponent: max_exponent.min(MAX_BACKOFF_EXPONENT_LIMIT),
            rng: StdRng::from_entropy(),
        }
    }

    /// Current exponent.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    fn resolve(&mut self, blocker: &TxStatus) {
        let window = 1u64 << self.attempts;
        let sleep_ms = self.rng.gen_range(0..window);
        if sleep_ms > 0 {
            thread::sleep(Duration::from_millis(sleep_ms));
        }
        if !blocker.is_live() {
            self.attempts = 0;
        } else {
            blocker.abort();
            if self.attempts < self.max_exponent {
                self.attempts += 1;
            }
        }
    }
}

/// A contention strategy instance.
///
/// Each worker thread owns one; the Backoff variant keeps per-thread state.
#[derive(Debug)]
pub enum ContentionManager {
    /// Abort the blocker immediately
    Aggressive,
    /// Wait for the blocker, never abort
    Passive,
    /// Randomized exponential backoff, then abort
    Backoff(Backoff),
    /// Older transaction wins
    Priority,
    /// Maximal-independent-set greedy strategy
    Greedy,
    /// Abort only blockers that are themselves waiting
    Wait,
}

impl ContentionManager {
    /// Build the strategy named by `kind` with default tuning.
    pub fn new(kind: ManagerKind) -> Self {
        Self::build(kind, DEFAULT_MAX_BACKOFF_EXPONENT)
    }

    /// Build the strategy selected by a runtime configuration.
    pub fn from_config(config: &StmConfig) -> Self {
        Self::build(config.manager, config.max_backoff_exponent)
    }

    fn build(kind: ManagerKind, max_backoff_exponent: u32) -> Self {
        match kind {
            ManagerKind::Aggressive => ContentionManager::Aggressive,
            ManagerKind::Passive => ContentionManager::Passive,
            ManagerKind::Backoff => ContentionManager::Backoff(Backoff::new(max_backoff_exponent)),
            ManagerKind::Priority => ContentionManager::Priority,
            ManagerKind::Greedy => ContentionManager::Greedy,
            ManagerKind::Wait => ContentionManager::Wait,
        }
    }

    /// Which strategy this is.
    pub fn kind(&self) -> ManagerKind {
        match self {
            ContentionManager::Aggressive => ManagerKind::Aggressive,
            ContentionManager::Passive => ManagerKind::Passive,
            ContentionManager::Backoff(_) => ManagerKind::Backoff,
            ContentionManager::Priority => ManagerKind::Priority,
            ContentionManager::Greedy => ManagerKind::Greedy,
            ContentionManager::Wait => ManagerKind::Wait,
        }
    }

    /// Backoff exponent, for the Backoff strategy.
    pub fn backoff_attempts(&self) -> Option<u32> {
        match self {
            ContentionManager::Backoff(backoff) => Some(backoff.attempts()),
            _ => None,
        }
    }

    /// Priority for a transaction about to start.
    pub fn priority(&self, clock: &PriorityClock) -> i64 {
        if self.kind().uses_priority_clock() {
            clock.next()
        } else {
            0
        }
    }

    /// Give `blocker` a chance to finish, abort it, or both.
    ///
    /// Returns [`sxm_core::StmError::Shutdown`] if a wait is interrupted by
    /// the stop flag. The caller re-reads the cell afterwards either way.
    pub fn resolve_conflict(
        &mut self,
        me: &TxStatus,
        blocker: &TxStatus,
        stop: &StopSignal,
    ) -> StmResult<()> {
        trace!(
            strategy = %self.kind(),
            me = me.id(),
            blocker = blocker.id(),
            "resolving conflict"
        );
        match self {
            ContentionManager::Aggressive => {
                blocker.abort();
                Ok(())
            }
            ContentionManager::Passive => blocker.block_while_active(stop),
            ContentionManager::Backoff(backoff) => {
                backoff.resolve(blocker);
                Ok(())
            }
            ContentionManager::Priority => {
                if blocker.priority() <= me.priority() {
                    blocker.abort();
                    Ok(())
                } else {
                    blocker.block_while_active(stop)
                }
            }
            ContentionManager::Greedy => {
                if blocker.is_waiting() || blocker.priority() < me.priority() {
                    blocker.abort();
                    Ok(())
                } else {
                    wait_announced(me, blocker, stop)
                }
            }
            ContentionManager::Wait => {
                if blocker.is_waiting() {
                    blocker.abort();
                    Ok(())
                } else {
                    wait_announced(me, blocker, stop)
                }
            }
        }
    }
}

/// Announce that `me` is waiting, block on `blocker`, then withdraw.
fn wait_announced(me: &TxStatus, blocker: &TxStatus, stop: &StopSignal) -> StmResult<()> {
    me.set_waiting();
    let outcome = blocker.block_while_active_and_not_waiting(stop);
    me.clear_waiting();
    outcome
}
