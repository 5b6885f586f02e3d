use super::iter::Iter;
use super::node::{lower_bound_stack, seek_prefix, Node};
use super::txn::TreeTxn;
use crate::watch::WatchCh;
use std::fmt;
use std::sync::Arc;

/// Immutable version of the map.
///
/// Cloning is an `Arc` bump; all versions share every node they have in
/// common.
pub struct Tree<V> {
    pub(crate) root: Arc<Node<V>>,
    pub(crate) size: usize,
}

impl<V> Clone for Tree<V> {
    fn clone(&self) -> Self {
        Self {
            root: Arc::clone(&self.root),
            size: self.size,
        }
    }
}

impl<V> Default for Tree<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Tree<V> {
    /// Create an empty tree
    pub fn new() -> Self {
        Self {
            root: Arc::new(Node::empty()),
            size: 0,
        }
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.size
    }

    /// True when the tree holds no keys
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Channel fired by any commit that changes this tree
    pub fn root_watch(&self) -> WatchCh {
        self.root.mutate_ch.clone()
    }

    /// Iterate over every key in order
    pub fn iter(&self) -> Iter<V> {
        Iter::from_node(Arc::clone(&self.root))
    }

    /// Iterate over keys starting with `prefix`
    pub fn seek_prefix(&self, prefix: &[u8]) -> Iter<V> {
        self.seek_prefix_watch(prefix).1
    }

    /// Iterate over keys starting with `prefix`, plus a channel that fires
    /// when any such key changes
    pub fn seek_prefix_watch(&self, prefix: &[u8]) -> (WatchCh, Iter<V>) {
        let (ch, node) = seek_prefix(&self.root, prefix);
        (ch, node.map_or_else(Iter::empty, Iter::from_node))
    }

    /// Iterate in order over keys `>= key`
    pub fn lower_bound(&self, key: &[u8]) -> Iter<V> {
        Iter::from_stack(lower_bound_stack(&self.root, key))
    }

    /// Start a transaction against this version
    pub fn txn(&self) -> TreeTxn<V> {
        TreeTxn::new(self.clone())
    }
}

impl<V: Clone> Tree<V> {
    /// Look up a key
    pub fn get(&self, key: &[u8]) -> Option<V> {
        self.root.find(key).1.map(|leaf| leaf.val.clone())
    }

    /// Look up a key, plus a channel that fires when it changes
    pub fn get_watch(&self, key: &[u8]) -> (WatchCh, Option<V>) {
        let (ch, leaf) = self.root.find(key);
        (ch.clone(), leaf.map(|leaf| leaf.val.clone()))
    }

    /// Smallest key and its value
    pub fn min(&self) -> Option<(Vec<u8>, V)> {
        self.root
            .min_leaf()
            .map(|leaf| (leaf.key.to_vec(), leaf.val.clone()))
    }

    /// Largest key and its value
    pub fn max(&self) -> Option<(Vec<u8>, V)> {
        self.root
            .max_leaf()
            .map(|leaf| (leaf.key.to_vec(), leaf.val.clone()))
    }
}

impl<V> fmt::Debug for Tree<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("len", &self.size)
            .field("root", &self.root.mutate_ch)
            .finish()
    }
}
