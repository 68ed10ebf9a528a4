//! Main entry point for SXM.
//!
//! This module provides the `Stm` struct, the handle applications hold to run
//! transactions.

use crate::error::{Error, Result};
use std::time::Duration;
use sxm_core::{ManagerKind, StmConfig, StmResult};
use sxm_engine::{Runtime, RuntimeBuilder, Transaction, Worker};

/// A software transactional memory runtime.
///
/// Create one with [`Stm::new`] or [`Stm::builder`]. Cloning is cheap and
/// every clone drives the same runtime.
///
/// # Example
///
/// ```ignore
/// use sxm::prelude::*;
///
/// let stm = Stm::builder().manager(ManagerKind::Greedy).build()?;
/// let from = TCell::new(100);
/// let to = TCell::new(0);
///
/// stm.atomically(|tx| {
///     from.modify(tx, |v| *v -= 10)?;
///     to.modify(tx, |v| *v += 10)
/// })?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Stm {
    inner: Runtime,
}

impl Stm {
    /// Runtime with default settings (Backoff strategy, 2s poll interval).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for runtime configuration.
    pub fn builder() -> StmBuilder {
        StmBuilder::new()
    }

    /// Runtime from a TOML configuration document.
    pub fn from_toml(text: &str) -> Result<Self> {
        Self::builder().toml(text).build()
    }

    /// Run `body` atomically on a temporary worker.
    ///
    /// Threads that run many transactions should hold a [`Worker`] instead,
    /// so the contention manager keeps its state between transactions.
    ///
    /// Calling this from inside another body on the same thread fails with
    /// [`Error::Internal`]; use [`Transaction::nested`] to nest.
    pub fn atomically<R, F>(&self, body: F) -> Result<R>
    where
        F: FnMut(&mut Transaction<'_>) -> StmResult<R>,
    {
        self.inner.run(body).map_err(Error::from)
    }

    /// New per-thread worker.
    pub fn worker(&self) -> Worker {
        self.inner.worker()
    }

    /// Ask every running transaction to unwind.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Clear the stop flag.
    pub fn resume(&self) {
        self.inner.resume();
    }

    /// Whether stop has been requested.
    pub fn is_stopped(&self) -> bool {
        self.inner.is_stopped()
    }

    /// Contention strategy in use.
    pub fn manager(&self) -> ManagerKind {
        self.inner.manager_kind()
    }

    /// Configuration in use.
    pub fn config(&self) -> &StmConfig {
        self.inner.config()
    }

    /// The underlying engine runtime.
    pub fn runtime(&self) -> &Runtime {
        &self.inner
    }

    /// Get runtime metrics.
    pub fn metrics(&self) -> StmMetrics {
        let totals = self.inner.metrics();
        let attempts = totals.attempts();
        StmMetrics {
            transactions_committed: totals.committed,
            transactions_aborted: totals.aborted,
            attempts,
            commit_rate: if attempts == 0 {
                0.0
            } else {
                totals.committed as f64 / attempts as f64
            },
        }
    }

    /// Zero the commit and abort counters.
    pub fn reset_metrics(&self) {
        self.inner.reset_metrics();
    }
}

/// Runtime metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct StmMetrics {
    /// Total committed transaction attempts
    pub transactions_committed: u64,
    /// Total aborted transaction attempts
    pub transactions_aborted: u64,
    /// Total attempts (commits + aborts)
    pub attempts: u64,
    /// Commit success rate (0.0 - 1.0)
    pub commit_rate: f64,
}

/// Builder for runtime configuration.
///
/// # Example
///
/// ```ignore
/// let stm = Stm::builder()
///     .manager_name("mis")
///     .poll_interval(Duration::from_millis(100))
///     .build()?;
/// ```
#[derive(Debug, Default)]
pub struct StmBuilder {
    inner: RuntimeBuilder,
}

impl StmBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an existing configuration.
    pub fn config(mut self, config: StmConfig) -> Self {
        self.inner = self.inner.config(config);
        self
    }

    /// Load configuration from TOML.
    pub fn toml(mut self, text: &str) -> Self {
        self.inner = self.inner.toml(text);
        self
    }

    /// Select the contention strategy.
    pub fn manager(mut self, kind: ManagerKind) -> Self {
        self.inner = self.inner.manager(kind);
        self
    }

    /// Select the contention strategy by name.
    pub fn manager_name(mut self, name: &str) -> Self {
        self.inner = self.inner.manager_name(name);
        self
    }

    /// How often blocked threads re-check the stop flag.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.inner = self.inner.poll_interval(interval);
        self
    }

    /// Cap on the Backoff strategy's exponent.
    pub fn max_backoff_exponent(mut self, exponent: u32) -> Self {
        self.inner = self.inner.max_backoff_exponent(exponent);
        self
    }

    /// Validate the configuration and build the runtime.
    pub fn build(self) -> Result<Stm> {
        let inner = self.inner.build().map_err(Error::from)?;
        Ok(Stm { inner })
    }
}
