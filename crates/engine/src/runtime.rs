//! Runtime handle
//!
//! A [`Runtime`] owns the state shared by all transactions of a process: the
//! configuration, the stop flag, the priority clock, the attempt id counter
//! and the commit/abort counters. It is cheap to clone; every clone
//! refers to the same state. Threads obtain a [`Worker`] from it to run
//! transactions.

use crate::transaction::{Transaction, Worker};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use sxm_concurrency::{ContentionManager, PriorityClock};
use sxm_core::{ConfigError, ManagerKind, StmConfig, StmResult, StopSignal};
use tracing::debug;

/// Process-wide commit and abort counters.
///
/// Updated only at attempt boundaries.
#[derive(Debug, Default)]
pub struct TxMetrics {
    committed: AtomicU64,
    aborted: AtomicU64,
}

/// Point-in-time copy of [`TxMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    /// Attempts that committed
    pub committed: u64,
    /// Attempts that aborted or were abandoned for retry
    pub aborted: u64,
}

impl MetricsSnapshot {
    /// Committed plus aborted.
    pub fn attempts(&self) -> u64 {
        self.committed + self.aborted
    }
}

impl TxMetrics {
    pub(crate) fn record_commit(&self) {
        self.committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_abort(&self) {
        self.aborted.fetch_add(1, Ordering::Relaxed);
    }

    /// Current totals.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            committed: self.committed.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
        }
    }

    /// Zero both counters.
    pub fn reset(&self) {
        self.committed.store(0, Ordering::Relaxed);
        self.aborted.store(0, Ordering::Relaxed);
    }
}

struct RuntimeInner {
    config: StmConfig,
    stop: StopSignal,
    clock: PriorityClock,
    next_attempt: AtomicU64,
    metrics: TxMetrics,
}

/// Shared transactional runtime.
///
/// # Example
///
/// ```ignore
/// let runtime = Runtime::builder().manager(ManagerKind::Greedy).build()?;
/// let counter = TCell::new(0u64);
/// let mut worker = runtime.worker();
/// worker.run(|tx| counter.modify(tx, |n| *n += 1))?;
/// ```
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    /// Runtime with the default configuration.
    pub fn new() -> Self {
        Self::from_parts(StmConfig::default())
    }

    /// Create a builder.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Runtime from an already validated configuration.
    pub fn with_config(config: StmConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_parts(config))
    }

    fn from_parts(config: StmConfig) -> Self {
        debug!(
            manager = %config.manager,
            poll_interval_ms = config.poll_interval_ms,
            "runtime started"
        );
        Self {
            inner: Arc::new(RuntimeInner {
                stop: StopSignal::new(config.poll_interval()),
                config,
                clock: PriorityClock::new(),
                next_attempt: AtomicU64::new(1),
                metrics: TxMetrics::default(),
            }),
        }
    }

    /// Configuration the runtime was built with.
    pub fn config(&self) -> &StmConfig {
        &self.inner.config
    }

    /// Contention strategy every worker uses.
    pub fn manager_kind(&self) -> ManagerKind {
        self.inner.config.manager
    }

    /// New per-thread worker with its own contention manager instance.
    pub fn worker(&self) -> Worker {
        Worker::new(self.clone(), ContentionManager::from_config(&self.inner.config))
    }

    /// Run one transaction on a temporary worker.
    pub fn run<R, F>(&self, body: F) -> StmResult<R>
    where
        F: FnMut(&mut Transaction<'_>) -> StmResult<R>,
    {
        self.worker().run(body)
    }

    /// Ask every worker to unwind with a shutdown error.
    pub fn stop(&self) {
        debug!("stop requested");
        self.inner.stop.stop();
    }

    /// Clear the stop flag.
    pub fn resume(&self) {
        self.inner.stop.resume();
    }

    /// Whether stop has been requested.
    pub fn is_stopped(&self) -> bool {
        self.inner.stop.is_stopped()
    }

    /// Current commit/abort totals.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Zero the commit/abort totals.
    pub fn reset_metrics(&self) {
        self.inner.metrics.reset();
    }

    pub(crate) fn stop_signal(&self) -> &StopSignal {
        &self.inner.stop
    }

    pub(crate) fn clock(&self) -> &PriorityClock {
        &self.inner.clock
    }

    pub(crate) fn tx_metrics(&self) -> &TxMetrics {
        &self.inner.metrics
    }

    pub(crate) fn next_attempt_id(&self) -> u64 {
        self.inner.next_attempt.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("stopped", &self.is_stopped())
            .field("metrics", &self.metrics())
            .finish()
    }
}

/// Builder for [`Runtime`].
///
/// Problems are collected and reported by [`RuntimeBuilder::build`], before
/// any transaction can run.
#[derive(Debug, Default)]
pub struct RuntimeBuilder {
    config: StmConfig,
    error: Option<ConfigError>,
}

impl RuntimeBuilder {
    /// Builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn config(mut self, config: StmConfig) -> Self {
        self.config = config;
        self
    }

    /// Start from a TOML document.
    pub fn toml(mut self, text: &str) -> Self {
        match StmConfig::from_toml(text) {
            Ok(config) => self.config = config,
            Err(err) => self.error = Some(err),
        }
        self
    }

    /// Select the contention strategy.
    pub fn manager(mut self, kind: ManagerKind) -> Self {
        self.config.manager = kind;
        self
    }

    /// Select the contention strategy by name (`"greedy"`, `"BackoffManager"`, ...).
    pub fn manager_name(mut self, name: &str) -> Self {
        match name.parse() {
            Ok(kind) => self.config.manager = kind,
            Err(err) => self.error = Some(err),
        }
        self
    }

    /// How often blocked threads re-check the stop flag.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Cap on the Backoff strategy's exponent.
    pub fn max_backoff_exponent(mut self, exponent: u32) -> Self {
        self.config.max_backoff_exponent = exponent;
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<Runtime, ConfigError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Runtime::with_config(self.config)
    }
}
