//! Radix nodes and the read paths shared by trees and transactions

use crate::watch::WatchCh;
use std::cmp::Ordering;
use std::sync::Arc;

/// A stored key/value pair.
///
/// Leaves are immutable and shared between every tree version that still
/// holds the key; replacing or removing the key fires [`Leaf::watch`].
#[derive(Debug)]
pub struct Leaf<V> {
    pub(crate) mutate_ch: WatchCh,
    pub(crate) key: Box<[u8]>,
    pub(crate) val: V,
}

impl<V> Leaf<V> {
    pub(crate) fn new(key: &[u8], val: V) -> Self {
        Self {
            mutate_ch: WatchCh::new(),
            key: key.into(),
            val,
        }
    }

    /// Full key
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Stored value
    pub fn value(&self) -> &V {
        &self.val
    }

    /// Channel fired when this key is updated or removed
    pub fn watch(&self) -> &WatchCh {
        &self.mutate_ch
    }
}

pub(crate) struct Edge<V> {
    pub(crate) label: u8,
    pub(crate) node: Arc<Node<V>>,
}

impl<V> Clone for Edge<V> {
    fn clone(&self) -> Self {
        Self {
            label: self.label,
            node: Arc::clone(&self.node),
        }
    }
}

/// Interior node.
///
/// `prefix` is the key segment consumed by this node, starting with the
/// label byte of the edge leading to it. The root has an empty prefix.
/// Edges are kept sorted by label.
pub(crate) struct Node<V> {
    pub(crate) mutate_ch: WatchCh,
    pub(crate) prefix: Vec<u8>,
    pub(crate) leaf: Option<Arc<Leaf<V>>>,
    pub(crate) edges: Vec<Edge<V>>,
}

/// Copying a node yields a new version of it, so the copy gets a fresh
/// channel. Children and leaf stay shared.
impl<V> Clone for Node<V> {
    fn clone(&self) -> Self {
        Self {
            mutate_ch: WatchCh::new(),
            prefix: self.prefix.clone(),
            leaf: self.leaf.clone(),
            edges: self.edges.clone(),
        }
    }
}

impl<V> Node<V> {
    pub(crate) fn empty() -> Self {
        Self::with_prefix(Vec::new())
    }

    pub(crate) fn with_prefix(prefix: Vec<u8>) -> Self {
        Self {
            mutate_ch: WatchCh::new(),
            prefix,
            leaf: None,
            edges: Vec::new(),
        }
    }

    /// New node holding just a leaf.
    pub(crate) fn leaf_node(prefix: &[u8], key: &[u8], val: V) -> Self {
        let mut node = Self::with_prefix(prefix.to_vec());
        node.leaf = Some(Arc::new(Leaf::new(key, val)));
        node
    }

    pub(crate) fn edge_index(&self, label: u8) -> Result<usize, usize> {
        self.edges.binary_search_by_key(&label, |e| e.label)
    }

    pub(crate) fn get_edge(&self, label: u8) -> Option<&Arc<Node<V>>> {
        self.edge_index(label).ok().map(|i| &self.edges[i].node)
    }

    pub(crate) fn add_edge(&mut self, edge: Edge<V>) {
        match self.edge_index(edge.label) {
            Ok(i) => self.edges[i] = edge,
            Err(i) => self.edges.insert(i, edge),
        }
    }

    pub(crate) fn min_leaf(&self) -> Option<&Arc<Leaf<V>>> {
        let mut n = self;
        loop {
            if let Some(leaf) = &n.leaf {
                return Some(leaf);
            }
            n = n.edges.first()?.node.as_ref();
        }
    }

    pub(crate) fn max_leaf(&self) -> Option<&Arc<Leaf<V>>> {
        let mut n = self;
        loop {
            match n.edges.last() {
                Some(edge) => n = edge.node.as_ref(),
                None => return n.leaf.as_ref(),
            }
        }
    }

    /// Find the leaf for `key`, along with the most specific channel that
    /// covers it: the leaf's own channel when present, otherwise the
    /// deepest node visited, which fires if the key is ever inserted.
    pub(crate) fn find(&self, key: &[u8]) -> (&WatchCh, Option<&Arc<Leaf<V>>>) {
        let mut n = self;
        let mut search = key;
        loop {
            if search.is_empty() {
                return match &n.leaf {
                    Some(leaf) => (&leaf.mutate_ch, Some(leaf)),
                    None => (&n.mutate_ch, None),
                };
            }
            let Some(child) = n.get_edge(search[0]) else {
                return (&n.mutate_ch, None);
            };
            n = child.as_ref();
            if !search.starts_with(&n.prefix) {
                return (&n.mutate_ch, None);
            }
            search = &search[n.prefix.len()..];
        }
    }
}

/// Locate the subtree holding every key that starts with `prefix`.
///
/// Returns the channel of the last node visited, which fires on any change
/// below it, and the subtree root if one exists.
pub(crate) fn seek_prefix<V>(root: &Arc<Node<V>>, prefix: &[u8]) -> (WatchCh, Option<Arc<Node<V>>>) {
    let mut n = root;
    let mut search = prefix;
    loop {
        if search.is_empty() {
            return (n.mutate_ch.clone(), Some(Arc::clone(n)));
        }
        let Some(child) = n.get_edge(search[0]) else {
            return (n.mutate_ch.clone(), None);
        };
        n = child;
        if search.starts_with(&n.prefix) {
            search = &search[n.prefix.len()..];
        } else if n.prefix.starts_with(search) {
            return (n.mutate_ch.clone(), Some(Arc::clone(n)));
        } else {
            return (n.mutate_ch.clone(), None);
        }
    }
}

/// Build the traversal stack for an in-order scan starting at the first
/// key `>= key`. The stack is popped from the end.
pub(crate) fn lower_bound_stack<V>(root: &Arc<Node<V>>, key: &[u8]) -> Vec<Arc<Node<V>>> {
    let mut stack = Vec::new();
    let mut n = Arc::clone(root);
    let mut search = key;
    loop {
        let common = n.prefix.len().min(search.len());
        match n.prefix[..common].cmp(&search[..common]) {
            // Everything below sorts after the key.
            Ordering::Greater => {
                stack.push(n);
                break;
            }
            // Everything below sorts before the key.
            Ordering::Less => break,
            Ordering::Equal => {}
        }
        if n.prefix.len() >= search.len() {
            // The key ends inside or exactly at this node: the node's own
            // leaf is >= key, and so is everything below it.
            stack.push(n);
            break;
        }
        search = &search[n.prefix.len()..];

        // Our leaf is a strict prefix of the key, so it sorts before it.
        let label = search[0];
        let split = n.edges.partition_point(|e| e.label <= label);
        for edge in n.edges[split..].iter().rev() {
            stack.push(Arc::clone(&edge.node));
        }
        let next = match n.get_edge(label) {
            Some(child) => Arc::clone(child),
            None => break,
        };
        n = next;
    }
    stack
}

pub(crate) fn longest_common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}
