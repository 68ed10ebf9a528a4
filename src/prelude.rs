//! Convenient imports for SXM.
//!
//! ```ignore
//! use sxm::prelude::*;
//!
//! let stm = Stm::new();
//! let cell = TCell::new(0);
//! stm.atomically(|tx| cell.modify(tx, |v| *v += 1))?;
//! ```

// Main entry point
pub use crate::stm::{Stm, StmBuilder, StmMetrics};

// Error handling
pub use crate::error::{Error, Result};

// Transactions
pub use crate::types::{retry, StmError, StmResult, TCell, Transaction, Worker};

// Configuration
pub use crate::types::ManagerKind;
