//! Unified error types for SXM.
//!
//! Inside a transaction body everything is an [`sxm_core::StmError`]; once a
//! transaction has finished, the outcome is reported with this smaller type,
//! which only keeps the cases a caller can act on.

use thiserror::Error;

/// All SXM errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The runtime was stopped before the transaction could commit
    #[error("runtime is shutting down")]
    Shutdown,

    /// Rejected configuration (unknown strategy, out-of-range value, bad TOML)
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error (bug or invariant violation)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for SXM operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error came from a shutdown request.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Error::Shutdown)
    }

    /// Check if this is a configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// Check if this is a serious/unrecoverable error.
    pub fn is_serious(&self) -> bool {
        matches!(self, Error::Internal(_))
    }
}

// Convert from transaction outcomes
impl From<sxm_core::StmError> for Error {
    fn from(e: sxm_core::StmError) -> Self {
        use sxm_core::StmError;
        match e {
            StmError::Shutdown => Error::Shutdown,
            StmError::Invariant(msg) => Error::Internal(msg),
            // The coordinator consumes these; seeing one here is a bug
            StmError::Aborted | StmError::RetryRequested => {
                Error::Internal(format!("{} escaped the coordinator", e))
            }
        }
    }
}

// Convert from configuration errors
impl From<sxm_core::ConfigError> for Error {
    fn from(e: sxm_core::ConfigError) -> Self {
        Error::Config(e.to_string())
    }
}
