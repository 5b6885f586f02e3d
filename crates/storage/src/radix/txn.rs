use super::iter::Iter;
use super::node::{longest_common_prefix, lower_bound_stack, seek_prefix, Edge, Leaf, Node};
use super::tree::Tree;
use crate::watch::WatchCh;
use rustc_hash::FxHashSet;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Working copy of a [`Tree`] owned by a single writer.
///
/// The first write to a node still shared with another version copies it
/// (`Arc::make_mut`) and remembers the old node's channel; later writes to
/// the copy happen in place. Committing produces a new [`Tree`] and fires
/// every remembered channel, unless tracking was turned off.
pub struct TreeTxn<V> {
    root: Arc<Node<V>>,
    size: usize,
    tracker: Tracker,
}

/// Channels of nodes and leaves replaced by this transaction.
struct Tracker {
    channels: Option<FxHashSet<WatchCh>>,
}

impl Tracker {
    fn track(&mut self, ch: &WatchCh) {
        if let Some(channels) = &mut self.channels {
            channels.insert(ch.clone());
        }
    }

    /// Get a mutable node for `slot`, copying it first if another version
    /// still references it.
    fn writable<'a, V>(&mut self, slot: &'a mut Arc<Node<V>>) -> &'a mut Node<V> {
        if Arc::strong_count(slot) > 1 {
            self.track(&slot.mutate_ch);
        }
        Arc::make_mut(slot)
    }

    /// Fold a node's only child into it.
    fn merge_child<V>(&mut self, n: &mut Node<V>) {
        let child = n.edges.remove(0).node;
        self.track(&child.mutate_ch);
        n.prefix.extend_from_slice(&child.prefix);
        n.leaf = child.leaf.clone();
        n.edges = child.edges.clone();
    }

    /// Track every channel under `node` and count its leaves.
    fn track_subtree<V>(&mut self, node: &Node<V>) -> usize {
        let mut count = 0;
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            self.track(&n.mutate_ch);
            if let Some(leaf) = &n.leaf {
                self.track(&leaf.mutate_ch);
                count += 1;
            }
            stack.extend(n.edges.iter().map(|e| e.node.as_ref()));
        }
        count
    }
}

/// Channels to fire once a committed tree has been published.
#[must_use = "dropping a Notifier without calling notify() loses change notifications"]
pub struct Notifier {
    channels: Vec<WatchCh>,
}

impl Notifier {
    /// Number of channels pending
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// True when there is nothing to fire
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Fire every pending channel; returns how many were fired
    pub fn notify(self) -> usize {
        for ch in &self.channels {
            ch.fire();
        }
        trace!(channels = self.channels.len(), "fired mutation channels");
        self.channels.len()
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("channels", &self.channels.len())
            .finish()
    }
}

impl<V> TreeTxn<V> {
    pub(crate) fn new(tree: Tree<V>) -> Self {
        Self {
            root: tree.root,
            size: tree.size,
            tracker: Tracker {
                channels: Some(FxHashSet::default()),
            },
        }
    }

    /// Turn channel tracking on or off. Tracking is on by default; turning
    /// it off discards anything tracked so far.
    pub fn track_mutations(&mut self, enabled: bool) {
        match (enabled, self.tracker.channels.is_some()) {
            (true, false) => self.tracker.channels = Some(FxHashSet::default()),
            (false, true) => self.tracker.channels = None,
            _ => {}
        }
    }

    /// Number of keys in the working state
    pub fn len(&self) -> usize {
        self.size
    }

    /// True when the working state holds no keys
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Channel of the working root
    pub fn root_watch(&self) -> WatchCh {
        self.root.mutate_ch.clone()
    }

    /// Iterate over every key in the working state
    pub fn iter(&self) -> Iter<V> {
        Iter::from_node(Arc::clone(&self.root))
    }

    /// Iterate over working keys starting with `prefix`
    pub fn seek_prefix(&self, prefix: &[u8]) -> Iter<V> {
        self.seek_prefix_watch(prefix).1
    }

    /// Iterate over working keys starting with `prefix`, with a channel
    pub fn seek_prefix_watch(&self, prefix: &[u8]) -> (WatchCh, Iter<V>) {
        let (ch, node) = seek_prefix(&self.root, prefix);
        (ch, node.map_or_else(Iter::empty, Iter::from_node))
    }

    /// Iterate in order over working keys `>= key`
    pub fn lower_bound(&self, key: &[u8]) -> Iter<V> {
        Iter::from_stack(lower_bound_stack(&self.root, key))
    }

    /// Immutable view of the working state.
    ///
    /// The view shares nodes with the transaction, so the next write to
    /// any of them copies it first; the view never observes later writes.
    pub fn snapshot(&self) -> Tree<V> {
        Tree {
            root: Arc::clone(&self.root),
            size: self.size,
        }
    }

    /// Finish the transaction and fire tracked channels
    pub fn commit(self) -> Tree<V> {
        let (tree, notifier) = self.commit_only();
        notifier.notify();
        tree
    }

    /// Finish the transaction without firing anything.
    ///
    /// The caller publishes the returned tree and then calls
    /// [`Notifier::notify`], so woken readers always see the new version.
    pub fn commit_only(self) -> (Tree<V>, Notifier) {
        let channels = self
            .tracker
            .channels
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        let tree = Tree {
            root: self.root,
            size: self.size,
        };
        (tree, Notifier { channels })
    }
}

impl<V: Clone> TreeTxn<V> {
    /// Look up a key in the working state
    pub fn get(&self, key: &[u8]) -> Option<V> {
        self.root.find(key).1.map(|leaf| leaf.val.clone())
    }

    /// Look up a key in the working state, with a channel
    pub fn get_watch(&self, key: &[u8]) -> (WatchCh, Option<V>) {
        let (ch, leaf) = self.root.find(key);
        (ch.clone(), leaf.map(|leaf| leaf.val.clone()))
    }

    /// Smallest working key and its value
    pub fn min(&self) -> Option<(Vec<u8>, V)> {
        self.root
            .min_leaf()
            .map(|leaf| (leaf.key.to_vec(), leaf.val.clone()))
    }

    /// Largest working key and its value
    pub fn max(&self) -> Option<(Vec<u8>, V)> {
        self.root
            .max_leaf()
            .map(|leaf| (leaf.key.to_vec(), leaf.val.clone()))
    }

    /// Insert or replace a key; returns the previous value
    pub fn insert(&mut self, key: &[u8], val: V) -> Option<V> {
        let old = insert_node(&mut self.tracker, &mut self.root, key, key, val);
        if old.is_none() {
            self.size += 1;
        }
        old
    }

    /// Remove a key; returns its value if it was present
    pub fn delete(&mut self, key: &[u8]) -> Option<V> {
        let old = self.root.find(key).1?.val.clone();
        delete_node(&mut self.tracker, &mut self.root, key, true);
        self.size -= 1;
        Some(old)
    }

    /// Remove every key starting with `prefix`; returns how many were
    /// removed
    pub fn delete_prefix(&mut self, prefix: &[u8]) -> usize {
        if self.is_empty() || seek_prefix(&self.root, prefix).1.is_none() {
            return 0;
        }
        let removed = delete_prefix_node(&mut self.tracker, &mut self.root, prefix, true).0;
        self.size -= removed;
        removed
    }
}

impl<V> fmt::Debug for TreeTxn<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeTxn")
            .field("len", &self.size)
            .field(
                "tracked",
                &self.tracker.channels.as_ref().map(FxHashSet::len),
            )
            .finish()
    }
}

// ============================================================================
// Mutation
// ============================================================================

fn insert_node<V: Clone>(
    tr: &mut Tracker,
    slot: &mut Arc<Node<V>>,
    key: &[u8],
    search: &[u8],
    val: V,
) -> Option<V> {
    if search.is_empty() {
        let n = tr.writable(slot);
        let old = n.leaf.replace(Arc::new(Leaf::new(key, val)))?;
        tr.track(&old.mutate_ch);
        return Some(old.val.clone());
    }

    let label = search[0];
    let idx = match slot.edge_index(label) {
        Ok(idx) => idx,
        Err(_) => {
            let n = tr.writable(slot);
            n.add_edge(Edge {
                label,
                node: Arc::new(Node::leaf_node(search, key, val)),
            });
            return None;
        }
    };

    let child_len = slot.edges[idx].node.prefix.len();
    let common = longest_common_prefix(search, &slot.edges[idx].node.prefix);
    let n = tr.writable(slot);
    if common == child_len {
        return insert_node(tr, &mut n.edges[idx].node, key, &search[common..], val);
    }

    // Split the child at the point where it diverges from the key.
    let child_slot = &mut n.edges[idx].node;
    {
        let child = tr.writable(child_slot);
        child.prefix.drain(..common);
    }
    let mut split = Node::with_prefix(search[..common].to_vec());
    split.add_edge(Edge {
        label: child_slot.prefix[0],
        node: Arc::clone(child_slot),
    });
    let rest = &search[common..];
    if rest.is_empty() {
        split.leaf = Some(Arc::new(Leaf::new(key, val)));
    } else {
        split.add_edge(Edge {
            label: rest[0],
            node: Arc::new(Node::leaf_node(rest, key, val)),
        });
    }
    *child_slot = Arc::new(split);
    None
}

/// Remove the leaf at `search` below `slot`. The key must exist.
///
/// Returns `true` when the node at `slot` became empty and its parent
/// should drop the edge to it.
fn delete_node<V>(tr: &mut Tracker, slot: &mut Arc<Node<V>>, search: &[u8], is_root: bool) -> bool {
    let n = tr.writable(slot);
    if search.is_empty() {
        if let Some(leaf) = n.leaf.take() {
            tr.track(&leaf.mutate_ch);
        }
        return !is_root && compact(tr, n);
    }

    let Ok(idx) = n.edge_index(search[0]) else {
        return false;
    };
    let consumed = n.edges[idx].node.prefix.len();
    if delete_node(tr, &mut n.edges[idx].node, &search[consumed..], false) {
        n.edges.remove(idx);
        return !is_root && n.leaf.is_none() && compact(tr, n);
    }
    false
}

/// Remove every key starting with `search` below `slot`.
///
/// Returns the number of keys removed and whether the parent should drop
/// the edge to `slot`.
fn delete_prefix_node<V>(
    tr: &mut Tracker,
    slot: &mut Arc<Node<V>>,
    search: &[u8],
    is_root: bool,
) -> (usize, bool) {
    if search.is_empty() {
        let removed = tr.track_subtree(slot);
        if is_root {
            *slot = Arc::new(Node::empty());
            return (removed, false);
        }
        return (removed, true);
    }

    let Ok(idx) = slot.edge_index(search[0]) else {
        return (0, false);
    };
    let child_prefix = &slot.edges[idx].node.prefix;
    let rest: &[u8] = if search.starts_with(child_prefix) {
        &search[child_prefix.len()..]
    } else if child_prefix.starts_with(search) {
        &[]
    } else {
        return (0, false);
    };

    let n = tr.writable(slot);
    let (removed, prune) = delete_prefix_node(tr, &mut n.edges[idx].node, rest, false);
    if prune {
        n.edges.remove(idx);
        if !is_root && n.leaf.is_none() {
            return (removed, compact(tr, n));
        }
    }
    (removed, false)
}

/// Restore the shape invariants of a non-root node that just lost its leaf
/// or an edge. Returns `true` if the node is now empty.
fn compact<V>(tr: &mut Tracker, n: &mut Node<V>) -> bool {
    match (n.leaf.is_some(), n.edges.len()) {
        (false, 0) => true,
        (false, 1) => {
            tr.merge_child(n);
            false
        }
        _ => false,
    }
}
