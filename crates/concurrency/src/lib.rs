//! Version store and contention management for SXM
//!
//! This crate implements the lock-free half of the runtime:
//! - Locator: immutable version records with a pruned reader chain
//! - VersionedCell: the CAS-installed current pointer with OpenRead/OpenWrite
//! - ContentionManager: the six conflict resolution strategies
//!
//! The only cross-thread mutation is the compare-and-swap that installs a new
//! locator; everything else reads atomics or blocks on a transaction status.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cell;
pub mod locator;
pub mod manager;

pub use cell::{ConflictScope, VersionedCell, WriteGrant};
pub use locator::{Locator, ReaderChain, ReaderIter};
pub use manager::{Backoff, ContentionManager, PriorityClock};
