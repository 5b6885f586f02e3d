//! Per-object change records for write transactions

use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// One object's net change within a write transaction.
///
/// `before` is the committed object the transaction started from and
/// `after` is what it leaves behind; `None` means absent.
pub struct Change<T> {
    /// Table the object lives in
    pub table: String,
    /// Primary key of the object
    pub primary_key: Vec<u8>,
    /// Object before the transaction
    pub before: Option<Arc<T>>,
    /// Object after the transaction
    pub after: Option<Arc<T>>,
}

impl<T> Change<T> {
    /// Object did not exist before
    pub fn created(&self) -> bool {
        self.before.is_none() && self.after.is_some()
    }

    /// Object existed before and after
    pub fn updated(&self) -> bool {
        self.before.is_some() && self.after.is_some()
    }

    /// Object no longer exists
    pub fn deleted(&self) -> bool {
        self.before.is_some() && self.after.is_none()
    }
}

impl<T> Clone for Change<T> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            primary_key: self.primary_key.clone(),
            before: self.before.clone(),
            after: self.after.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Change<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Change")
            .field("table", &self.table)
            .field("primary_key", &self.primary_key)
            .field("before", &self.before)
            .field("after", &self.after)
            .finish()
    }
}

/// Change log, coalesced per (table, primary key) in first-touch order.
pub(crate) struct ChangeSet<T> {
    changes: Vec<Change<T>>,
    positions: FxHashMap<(String, Vec<u8>), usize>,
}

impl<T> ChangeSet<T> {
    pub(crate) fn new() -> Self {
        Self {
            changes: Vec::new(),
            positions: FxHashMap::default(),
        }
    }

    pub(crate) fn record(
        &mut self,
        table: &str,
        primary_key: &[u8],
        before: Option<Arc<T>>,
        after: Option<Arc<T>>,
    ) {
        let slot = (table.to_string(), primary_key.to_vec());
        match self.positions.get(&slot) {
            Some(&i) => self.changes[i].after = after,
            None => {
                self.positions.insert(slot, self.changes.len());
                self.changes.push(Change {
                    table: table.to_string(),
                    primary_key: primary_key.to_vec(),
                    before,
                    after,
                });
            }
        }
    }

    /// Net changes, leaving out objects created and deleted again.
    pub(crate) fn to_vec(&self) -> Vec<Change<T>> {
        self.changes
            .iter()
            .filter(|c| c.before.is_some() || c.after.is_some())
            .cloned()
            .collect()
    }
}
