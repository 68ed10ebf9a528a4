//! Cooperative shutdown signal
//!
//! Every blocking wait in the runtime wakes at least once per poll interval to
//! check this flag, so a stuck or crashed writer can never hold other threads
//! past shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Process-wide stop flag plus the interval at which waiters re-check it.
#[derive(Debug)]
pub struct StopSignal {
    stopped: AtomicBool,
    poll_interval: Duration,
}

impl StopSignal {
    /// Create a cleared signal.
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            stopped: AtomicBool::new(false),
            poll_interval,
        }
    }

    /// Ask every running transaction to unwind.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Clear the flag so the runtime can be reused.
    pub fn resume(&self) {
        self.stopped.store(false, Ordering::SeqCst);
    }

    /// Whether stop has been requested.
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Upper bound on how long a blocked thread sleeps between checks.
    #[inline]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new(Duration::from_millis(crate::config::DEFAULT_POLL_INTERVAL_MS))
    }
}
