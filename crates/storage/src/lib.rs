//! Storage layer for memdb
//!
//! This crate provides the two building blocks the transaction layer sits on:
//! - `radix`: persistent (copy-on-write) radix tree with ordered scans
//! - `watch`: single-fire channels and wait sets for change notification
//!
//! Nothing here knows about tables, indexes or records; values are generic.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod radix;
pub mod watch;

pub use radix::{Iter, Leaf, Notifier, Tree, TreeTxn};
pub use watch::{CancelToken, WatchCh, WatchOutcome, WatchSet};
