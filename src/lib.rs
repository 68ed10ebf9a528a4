//! # SXM
//!
//! Software transactional memory for Rust.
//!
//! SXM lets many threads update shared values through transactions that
//! appear atomic and isolated. There are no locks: each value lives in a
//! versioned cell whose current version is swapped in with a single
//! compare-and-swap, and a pluggable contention manager decides who waits and
//! who is aborted when two transactions collide.
//!
//! ## Quick Start
//!
//! ```ignore
//! use sxm::prelude::*;
//!
//! let stm = Stm::new();
//! let account = TCell::new(100i64);
//!
//! stm.atomically(|tx| {
//!     let balance = *account.read(tx)?;
//!     if balance < 10 {
//!         // Block until someone changes the balance, then run again
//!         return retry();
//!     }
//!     account.set(tx, balance - 10)
//! })?;
//! ```
//!
//! ## Contention managers
//!
//! - `aggressive` - always abort the other transaction
//! - `passive` - always wait (can deadlock)
//! - `backoff` - randomized exponential backoff, then abort (default)
//! - `priority` - older transaction wins
//! - `greedy` (`mis`) - abort waiting or younger transactions, otherwise wait
//! - `wait` - abort waiting transactions, otherwise wait
//!
//! ## Threads
//!
//! [`Stm::atomically`] is convenient for one-off transactions. A thread that
//! runs many should take a [`Worker`] from [`Stm::worker`] and call
//! [`Worker::run`], which keeps the contention manager's state between
//! transactions.

#![warn(missing_docs)]

mod error;
mod stm;
mod types;

pub mod prelude;

// Re-export main entry points
pub use error::{Error, Result};
pub use stm::{Stm, StmBuilder, StmMetrics};

// Re-export types
pub use types::*;
