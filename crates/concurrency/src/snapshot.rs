//! Index roots
//!
//! A [`Roots`] value is one immutable radix tree per (table, index) pair,
//! indexed by the dense [`IndexId`] the schema assigned. Holding an
//! `Arc<Roots>` is holding a consistent snapshot of the whole store.

use memdb_core::IndexId;
use memdb_storage::Tree;
use std::fmt;
use std::sync::Arc;

/// Separator between a non-unique index value and the primary key appended
/// to make its tree key distinct.
pub(crate) const KEY_SEPARATOR: u8 = 0x00;

/// Value stored in an index tree
pub enum IndexValue<T> {
    /// Primary index entry: the object itself
    Object(Arc<T>),
    /// Secondary index entry: primary key of the object
    PrimaryKey(Arc<[u8]>),
}

impl<T> IndexValue<T> {
    /// The object, for primary index entries
    pub fn object(&self) -> Option<&Arc<T>> {
        match self {
            IndexValue::Object(obj) => Some(obj),
            IndexValue::PrimaryKey(_) => None,
        }
    }

    /// The primary key, for secondary index entries
    pub fn primary_key(&self) -> Option<&[u8]> {
        match self {
            IndexValue::Object(_) => None,
            IndexValue::PrimaryKey(pk) => Some(pk),
        }
    }
}

impl<T> Clone for IndexValue<T> {
    fn clone(&self) -> Self {
        match self {
            IndexValue::Object(obj) => IndexValue::Object(Arc::clone(obj)),
            IndexValue::PrimaryKey(pk) => IndexValue::PrimaryKey(Arc::clone(pk)),
        }
    }
}

impl<T> fmt::Debug for IndexValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexValue::Object(_) => f.write_str("Object(..)"),
            IndexValue::PrimaryKey(pk) => f.debug_tuple("PrimaryKey").field(pk).finish(),
        }
    }
}

/// Tree type used for every index
pub type IndexTree<T> = Tree<IndexValue<T>>;

/// One committed (or staged) version of every index
pub struct Roots<T> {
    trees: Vec<IndexTree<T>>,
}

impl<T> Roots<T> {
    /// Empty trees for `index_count` indexes
    pub fn empty(index_count: usize) -> Self {
        Self {
            trees: (0..index_count).map(|_| Tree::new()).collect(),
        }
    }

    pub(crate) fn from_trees(trees: Vec<IndexTree<T>>) -> Self {
        Self { trees }
    }

    /// Tree for one index
    ///
    /// # Panics
    ///
    /// Panics if `id` was not assigned by the schema these roots belong to.
    pub fn tree(&self, id: IndexId) -> &IndexTree<T> {
        &self.trees[id.0]
    }

    /// Number of index trees
    pub fn len(&self) -> usize {
        self.trees.len()
    }

    /// True when there are no index trees
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}

impl<T> Clone for Roots<T> {
    fn clone(&self) -> Self {
        Self {
            trees: self.trees.clone(),
        }
    }
}

impl<T> fmt::Debug for Roots<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Roots")
            .field("indexes", &self.trees.len())
            .finish()
    }
}

/// Tree key for a non-unique index entry: `value ++ 0x00 ++ primary key`.
pub(crate) fn secondary_key(value: &[u8], pk: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(value.len() + 1 + pk.len());
    key.extend_from_slice(value);
    key.push(KEY_SEPARATOR);
    key.extend_from_slice(pk);
    key
}

/// Prefix matching every non-unique entry whose value is exactly `value`.
pub(crate) fn secondary_prefix(value: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(value.len() + 1);
    key.extend_from_slice(value);
    key.push(KEY_SEPARATOR);
    key
}
