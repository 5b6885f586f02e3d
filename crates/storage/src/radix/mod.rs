//! Persistent ordered map
//!
//! An immutable radix tree with compressed edges. A [`Tree`] is one
//! version; a [`TreeTxn`] builds the next version by path-copying only the
//! nodes it touches, so every older version stays valid and readable.
//!
//! | Operation | Tree | TreeTxn |
//! |-----------|------|---------|
//! | point lookup | `get`, `get_watch` | same |
//! | ordered scans | `iter`, `seek_prefix`, `lower_bound` | same |
//! | extremes | `min`, `max` | same |
//! | writes | - | `insert`, `delete`, `delete_prefix` |
//! | publish | - | `commit`, `commit_only` |
//!
//! Each node and leaf carries a [`WatchCh`](crate::WatchCh). Committing
//! fires the channel of every node the transaction replaced, which is what
//! lets readers block until the part of the tree they looked at changes.

mod iter;
mod node;
mod tree;
mod txn;

pub use iter::Iter;
pub use node::Leaf;
pub use tree::Tree;
pub use txn::{Notifier, TreeTxn};
