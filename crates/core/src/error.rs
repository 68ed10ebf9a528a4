//! Error types for the transactional runtime
//!
//! Two families live here:
//!
//! - [`StmError`]: the control signals a transaction body propagates with `?`.
//!   `Ok(v)` means the body completed; the variants unwind to the outermost
//!   attempt, which decides whether to restart, block, or give up.
//! - [`ConfigError`]: setup problems detected while building a runtime, before
//!   any transaction runs.

use thiserror::Error;

/// Result type used inside transaction bodies.
pub type StmResult<T> = std::result::Result<T, StmError>;

/// Control signal raised while a transaction attempt is running.
///
/// `Aborted` and `RetryRequested` are only handled at the outermost attempt;
/// nested bodies must pass them through unchanged. `Invariant` is never
/// retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StmError {
    /// The attempt's own status moved to ABORTED.
    #[error("transaction aborted")]
    Aborted,

    /// User code asked to block until something it read changes, then retry.
    #[error("transaction requested retry")]
    RetryRequested,

    /// The runtime stop flag was observed; unwind without a result.
    #[error("runtime is shutting down")]
    Shutdown,

    /// An unreachable combination of states was observed.
    #[error("system invariant violated: {0}")]
    Invariant(String),
}

impl StmError {
    /// Build an [`StmError::Invariant`] from any message.
    pub fn invariant(message: impl Into<String>) -> Self {
        StmError::Invariant(message.into())
    }

    /// Whether the outermost attempt should start over with a fresh status.
    pub fn is_restart(&self) -> bool {
        matches!(self, StmError::Aborted | StmError::RetryRequested)
    }

    /// Whether this is the graceful shutdown signal.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, StmError::Shutdown)
    }

    /// Whether this indicates a bug rather than contention.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StmError::Invariant(_))
    }
}

/// Configuration rejected at runtime construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Contention strategy name did not match any known strategy
    #[error("unknown contention manager: {0}")]
    UnknownManager(String),

    /// A field held a value outside its accepted range
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// The configuration text could not be parsed
    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}
