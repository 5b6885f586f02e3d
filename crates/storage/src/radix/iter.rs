use super::node::{Leaf, Node};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// In-order iterator over leaves.
///
/// Holds `Arc`s to the nodes still to be visited, so it keeps reading the
/// tree version it was created from even if newer versions are committed
/// meanwhile.
pub struct Iter<V> {
    stack: SmallVec<[Arc<Node<V>>; 8]>,
}

impl<V> Iter<V> {
    pub(crate) fn empty() -> Self {
        Self {
            stack: SmallVec::new(),
        }
    }

    pub(crate) fn from_node(node: Arc<Node<V>>) -> Self {
        let mut stack = SmallVec::new();
        stack.push(node);
        Self { stack }
    }

    pub(crate) fn from_stack(nodes: Vec<Arc<Node<V>>>) -> Self {
        Self {
            stack: SmallVec::from_vec(nodes),
        }
    }

    /// Adapt into an iterator over cloned values
    pub fn values(self) -> impl Iterator<Item = V>
    where
        V: Clone,
    {
        self.map(|leaf| leaf.val.clone())
    }
}

impl<V> Iterator for Iter<V> {
    type Item = Arc<Leaf<V>>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            for edge in node.edges.iter().rev() {
                self.stack.push(Arc::clone(&edge.node));
            }
            if let Some(leaf) = &node.leaf {
                return Some(Arc::clone(leaf));
            }
        }
        None
    }
}

impl<V> fmt::Debug for Iter<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iter")
            .field("pending", &self.stack.len())
            .finish()
    }
}
