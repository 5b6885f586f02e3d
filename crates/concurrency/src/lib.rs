//! Concurrency layer for memdb
//!
//! This crate implements snapshot-isolated transactions over the radix
//! trees in `memdb-storage`:
//! - TransactionManager: committed roots, single-writer lock, versions
//! - ReadTxn: lock-free reads pinned to one committed version
//! - WriteTxn: index maintenance on working trees, commit/abort, change
//!   tracking, deferred callbacks
//! - TransactionOps: the query surface both transaction kinds share

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod changes;
pub mod manager;
pub mod ops;
pub mod snapshot;
pub mod transaction;

pub use changes::Change;
pub use manager::TransactionManager;
pub use ops::{ResultIter, TransactionOps};
pub use snapshot::{IndexTree, IndexValue, Roots};
pub use transaction::{ReadTxn, WriteState, WriteTxn};
