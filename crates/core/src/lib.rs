//! Core types for the SXM transactional runtime
//!
//! This crate holds the pieces every other layer shares:
//! - TxStatus: per-attempt lifecycle record (ACTIVE / WAITING / COMMITTED / ABORTED)
//! - StopSignal: cooperative shutdown flag with a bounded wake-up interval
//! - StmError / ConfigError: control signals and setup errors
//! - StmConfig / ManagerKind: runtime configuration

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod status;
pub mod stop;

pub use config::{ManagerKind, StmConfig};
pub use error::{ConfigError, StmError, StmResult};
pub use status::{TxState, TxStatus};
pub use stop::StopSignal;
