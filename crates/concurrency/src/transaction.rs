//! Read and write transactions
//!
//! ## Index maintenance
//!
//! | Index | Tree key | Tree value |
//! |-------|----------|------------|
//! | primary (`id`) | id key | the object |
//! | unique secondary | index key | primary key |
//! | non-unique secondary | index key `++ 0x00 ++` primary key | primary key |
//!
//! An insert computes every index key before touching any tree, so an
//! indexer error, a missing value or a uniqueness violation leaves the
//! transaction exactly as it was.

use crate::changes::{Change, ChangeSet};
use crate::manager::TransactionManager;
use crate::ops::TransactionOps;
use crate::snapshot::{secondary_key, IndexTree, IndexValue, Roots};
use memdb_core::{Arg, DbSchema, Error, IndexId, IndexSchema, Record, Result, TableSchema};
use memdb_storage::{Notifier, TreeTxn};
use parking_lot::MutexGuard;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

// ============================================================================
// ReadTxn
// ============================================================================

/// Read-only view of one committed version.
///
/// Never blocks and never observes later commits. [`close`](Self::close)
/// releases the snapshot early; dropping the transaction does the same.
pub struct ReadTxn<T> {
    schema: Arc<DbSchema<T>>,
    roots: Option<Arc<Roots<T>>>,
    txn_id: u64,
    version: u64,
    watch_limit: usize,
}

impl<T: Record> ReadTxn<T> {
    pub(crate) fn new(
        schema: Arc<DbSchema<T>>,
        roots: Arc<Roots<T>>,
        txn_id: u64,
        version: u64,
        watch_limit: usize,
    ) -> Self {
        Self {
            schema,
            roots: Some(roots),
            txn_id,
            version,
            watch_limit,
        }
    }

    /// Transaction ID
    pub fn txn_id(&self) -> u64 {
        self.txn_id
    }

    /// Version this transaction reads
    pub fn version(&self) -> u64 {
        self.version
    }

    /// True until [`close`](Self::close) is called
    pub fn is_open(&self) -> bool {
        self.roots.is_some()
    }

    /// Release the snapshot. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.roots.take().is_some() {
            debug!(txn_id = self.txn_id, "closed read transaction");
        }
    }

    /// The snapshot this transaction reads
    pub fn roots(&self) -> Result<&Arc<Roots<T>>> {
        self.roots
            .as_ref()
            .ok_or(Error::TransactionAlreadyFinalized { state: "closed" })
    }
}

impl<T: Record> TransactionOps<T> for ReadTxn<T> {
    fn schema(&self) -> &DbSchema<T> {
        &self.schema
    }

    fn ensure_open(&self) -> Result<()> {
        self.roots().map(|_| ())
    }

    fn index_tree(&self, id: IndexId) -> Result<IndexTree<T>> {
        Ok(self.roots()?.tree(id).clone())
    }

    fn watch_limit(&self) -> usize {
        self.watch_limit
    }
}

impl<T> fmt::Debug for ReadTxn<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadTxn")
            .field("txn_id", &self.txn_id)
            .field("version", &self.version)
            .field("open", &self.roots.is_some())
            .finish()
    }
}

// ============================================================================
// WriteTxn
// ============================================================================

/// Lifecycle of a write transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteState {
    /// Accepting operations
    Open,
    /// Changes published
    Committed,
    /// Changes discarded
    Aborted,
}

impl WriteState {
    fn name(self) -> &'static str {
        match self {
            WriteState::Open => "open",
            WriteState::Committed => "committed",
            WriteState::Aborted => "aborted",
        }
    }
}

type Deferred<'db> = Box<dyn FnOnce() + 'db>;

/// The store's single write transaction.
///
/// Holds the write lock from creation until [`commit`](Self::commit) or
/// [`abort`](Self::abort). Dropping an open transaction aborts it.
pub struct WriteTxn<'db, T: Record> {
    manager: &'db TransactionManager<T>,
    guard: Option<MutexGuard<'db, ()>>,
    base: Arc<Roots<T>>,
    working: Vec<Option<TreeTxn<IndexValue<T>>>>,
    state: WriteState,
    txn_id: u64,
    base_version: u64,
    changes: Option<ChangeSet<T>>,
    deferred: Vec<Deferred<'db>>,
}

impl<'db, T: Record> WriteTxn<'db, T> {
    pub(crate) fn new(
        manager: &'db TransactionManager<T>,
        guard: MutexGuard<'db, ()>,
        base: Arc<Roots<T>>,
        txn_id: u64,
        base_version: u64,
        track_changes: bool,
    ) -> Self {
        let working = (0..base.len()).map(|_| None).collect();
        Self {
            manager,
            guard: Some(guard),
            base,
            working,
            state: WriteState::Open,
            txn_id,
            base_version,
            changes: track_changes.then(ChangeSet::new),
            deferred: Vec::new(),
        }
    }

    /// Transaction ID
    pub fn txn_id(&self) -> u64 {
        self.txn_id
    }

    /// Current state
    pub fn state(&self) -> WriteState {
        self.state
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Insert an object, replacing any object with the same primary key.
    ///
    /// Fails without staging anything if an indexer rejects the object, a
    /// required index value is missing, or a unique index already maps one
    /// of its keys to a different object.
    pub fn insert(&mut self, table: &str, obj: impl Into<Arc<T>>) -> Result<()> {
        self.ensure_open()?;
        let manager = self.manager;
        let table_schema = manager.schema().table(table)?;
        let obj: Arc<T> = obj.into();

        let mut staged = Vec::with_capacity(table_schema.index_count());
        for (id, index) in table_schema.indexes() {
            let keys = index.indexer.keys(&obj)?;
            if keys.is_empty() && !index.allow_missing {
                return Err(Error::MissingIndexValue {
                    table: table.to_string(),
                    index: index.name.clone(),
                });
            }
            staged.push((id, index, keys));
        }
        let pk = primary_key_of(table_schema, &staged)?;

        for (id, index, keys) in &staged {
            if !index.unique || index.is_primary() {
                continue;
            }
            for key in keys {
                let held = self.tree_get(*id, key);
                if matches!(held, Some(IndexValue::PrimaryKey(ref other)) if **other != *pk) {
                    return Err(Error::DuplicateUniqueKey {
                        table: table.to_string(),
                        index: index.name.clone(),
                    });
                }
            }
        }

        let existing = self.lookup(table_schema, &pk);
        if let Some(old) = &existing {
            self.remove_secondary(table_schema, old, &pk)?;
        }

        let pk_ref: Arc<[u8]> = Arc::from(pk.as_slice());
        for (id, index, keys) in staged {
            let tree = self.tree_mut(id);
            if index.is_primary() {
                tree.insert(&pk, IndexValue::Object(Arc::clone(&obj)));
            } else if index.unique {
                for key in keys {
                    tree.insert(&key, IndexValue::PrimaryKey(Arc::clone(&pk_ref)));
                }
            } else {
                for key in keys {
                    tree.insert(
                        &secondary_key(&key, &pk),
                        IndexValue::PrimaryKey(Arc::clone(&pk_ref)),
                    );
                }
            }
        }

        trace!(
            txn_id = self.txn_id,
            table,
            update = existing.is_some(),
            "staged insert"
        );
        if let Some(changes) = &mut self.changes {
            changes.record(table, &pk, existing, Some(obj));
        }
        Ok(())
    }

    /// Delete the stored object with the same primary key as `obj`.
    ///
    /// Index keys are computed from the stored object, so `obj` only needs
    /// a correct primary key. Fails with [`Error::NotFound`] if no such
    /// object exists.
    pub fn delete(&mut self, table: &str, obj: &T) -> Result<()> {
        self.ensure_open()?;
        let manager = self.manager;
        let table_schema = manager.schema().table(table)?;
        let (_, primary) = table_schema.primary();
        let pk = single_key(primary.indexer.keys(obj)?).ok_or_else(|| Error::MissingIndexValue {
            table: table.to_string(),
            index: primary.name.clone(),
        })?;
        self.delete_by_key(table_schema, &pk)
    }

    /// Delete every object [`get`](TransactionOps::get) would return;
    /// returns how many were deleted
    pub fn delete_all(&mut self, table: &str, index: &str, args: &[Arg]) -> Result<usize> {
        let matched: Vec<Arc<T>> = self.get(table, index, args)?.collect();
        self.delete_objects(table, matched)
    }

    /// Delete every object [`prefix`](TransactionOps::prefix) would return;
    /// returns how many were deleted
    pub fn delete_prefix(&mut self, table: &str, index: &str, args: &[Arg]) -> Result<usize> {
        let matched: Vec<Arc<T>> = self.prefix(table, index, args)?.collect();
        self.delete_objects(table, matched)
    }

    fn delete_objects(&mut self, table: &str, objects: Vec<Arc<T>>) -> Result<usize> {
        let manager = self.manager;
        let table_schema = manager.schema().table(table)?;
        let (_, primary) = table_schema.primary();
        let mut deleted = 0;
        for obj in objects {
            let Some(pk) = single_key(primary.indexer.keys(&obj)?) else {
                continue;
            };
            // Multi-valued indexes can yield the same object more than once.
            if self.lookup(table_schema, &pk).is_some() {
                self.delete_by_key(table_schema, &pk)?;
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    fn delete_by_key(&mut self, table_schema: &TableSchema<T>, pk: &[u8]) -> Result<()> {
        let existing = self.lookup(table_schema, pk).ok_or_else(|| {
            Error::NotFound(format!("object not found in table '{}'", table_schema.name))
        })?;
        self.remove_secondary(table_schema, &existing, pk)?;
        let (primary_id, _) = table_schema.primary();
        self.tree_mut(primary_id).delete(pk);

        trace!(txn_id = self.txn_id, table = %table_schema.name, "staged delete");
        if let Some(changes) = &mut self.changes {
            changes.record(&table_schema.name, pk, Some(existing), None);
        }
        Ok(())
    }

    /// Remove the secondary entries of a stored object.
    fn remove_secondary(&mut self, table_schema: &TableSchema<T>, obj: &T, pk: &[u8]) -> Result<()> {
        for (id, index) in table_schema.indexes() {
            if index.is_primary() {
                continue;
            }
            for key in index.indexer.keys(obj)? {
                let tree = self.tree_mut(id);
                if index.unique {
                    let owned = matches!(tree.get(&key), Some(IndexValue::PrimaryKey(ref held)) if **held == *pk);
                    if owned {
                        tree.delete(&key);
                    }
                } else {
                    tree.delete(&secondary_key(&key, pk));
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Working trees
    // ========================================================================

    fn tree_mut(&mut self, id: IndexId) -> &mut TreeTxn<IndexValue<T>> {
        let base = &self.base;
        self.working[id.0].get_or_insert_with(|| base.tree(id).txn())
    }

    fn tree_get(&self, id: IndexId, key: &[u8]) -> Option<IndexValue<T>> {
        match &self.working[id.0] {
            Some(txn) => txn.get(key),
            None => self.base.tree(id).get(key),
        }
    }

    fn lookup(&self, table_schema: &TableSchema<T>, pk: &[u8]) -> Option<Arc<T>> {
        let (primary_id, _) = table_schema.primary();
        match self.tree_get(primary_id, pk)? {
            IndexValue::Object(obj) => Some(obj),
            IndexValue::PrimaryKey(_) => None,
        }
    }

    fn current_roots(&self) -> Roots<T> {
        let trees = self
            .working
            .iter()
            .enumerate()
            .map(|(i, working)| match working {
                Some(txn) => txn.snapshot(),
                None => self.base.tree(IndexId(i)).clone(),
            })
            .collect();
        Roots::from_trees(trees)
    }

    // ========================================================================
    // Extras
    // ========================================================================

    /// Start recording changes for [`changes`](Self::changes), if not
    /// already recording
    pub fn track_changes(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.changes.is_none() {
            self.changes = Some(ChangeSet::new());
        }
        Ok(())
    }

    /// Net per-object changes made so far.
    ///
    /// Empty unless change tracking is on. Still available after commit.
    pub fn changes(&self) -> Vec<Change<T>> {
        self.changes
            .as_ref()
            .map(ChangeSet::to_vec)
            .unwrap_or_default()
    }

    /// Run `f` after a successful commit.
    ///
    /// Callbacks run in reverse registration order once the new version is
    /// visible and watchers have been notified. They are dropped unrun on
    /// abort.
    pub fn defer(&mut self, f: impl FnOnce() + 'db) -> Result<()> {
        self.ensure_open()?;
        self.deferred.push(Box::new(f));
        Ok(())
    }

    /// Read-only view of the staged state.
    ///
    /// The view is isolated from writes made after it was taken.
    pub fn snapshot(&self) -> Result<ReadTxn<T>> {
        self.ensure_open()?;
        Ok(ReadTxn::new(
            Arc::clone(self.manager.schema()),
            Arc::new(self.current_roots()),
            self.txn_id,
            self.base_version,
            self.manager.watch_limit(),
        ))
    }

    // ========================================================================
    // Finalization
    // ========================================================================

    /// Publish the staged state; returns the committed version.
    ///
    /// A transaction that never wrote publishes nothing and returns the
    /// version it started from.
    pub fn commit(&mut self) -> Result<u64> {
        self.ensure_open()?;

        let mut notifiers: Vec<Notifier> = Vec::new();
        let mut trees = Vec::with_capacity(self.working.len());
        for (i, working) in self.working.iter_mut().enumerate() {
            match working.take() {
                Some(txn) => {
                    let (tree, notifier) = txn.commit_only();
                    notifiers.push(notifier);
                    trees.push(tree);
                }
                None => trees.push(self.base.tree(IndexId(i)).clone()),
            }
        }

        let version = if notifiers.is_empty() {
            self.base_version
        } else {
            self.manager.publish(Arc::new(Roots::from_trees(trees)))
        };
        self.state = WriteState::Committed;
        self.guard.take();

        let fired: usize = notifiers.into_iter().map(Notifier::notify).sum();
        debug!(txn_id = self.txn_id, version, fired, "committed write transaction");

        while let Some(f) = self.deferred.pop() {
            f();
        }
        Ok(version)
    }

    /// Discard the staged state
    pub fn abort(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.discard();
        Ok(())
    }

    fn discard(&mut self) {
        self.working.iter_mut().for_each(|w| *w = None);
        self.deferred.clear();
        self.changes = None;
        self.state = WriteState::Aborted;
        self.guard.take();
        debug!(txn_id = self.txn_id, "aborted write transaction");
    }
}

impl<'db, T: Record> TransactionOps<T> for WriteTxn<'db, T> {
    fn schema(&self) -> &DbSchema<T> {
        self.manager.schema()
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            WriteState::Open => Ok(()),
            other => Err(Error::TransactionAlreadyFinalized {
                state: other.name(),
            }),
        }
    }

    fn index_tree(&self, id: IndexId) -> Result<IndexTree<T>> {
        self.ensure_open()?;
        Ok(match &self.working[id.0] {
            Some(txn) => txn.snapshot(),
            None => self.base.tree(id).clone(),
        })
    }

    fn watch_limit(&self) -> usize {
        self.manager.watch_limit()
    }
}

impl<'db, T: Record> Drop for WriteTxn<'db, T> {
    fn drop(&mut self) {
        if self.state == WriteState::Open {
            self.discard();
        }
    }
}

impl<'db, T: Record> fmt::Debug for WriteTxn<'db, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteTxn")
            .field("txn_id", &self.txn_id)
            .field("state", &self.state)
            .field("base_version", &self.base_version)
            .field(
                "dirty_indexes",
                &self.working.iter().filter(|w| w.is_some()).count(),
            )
            .finish()
    }
}

/// Primary key from the staged keys of the table's `id` index.
fn primary_key_of<T>(
    table_schema: &TableSchema<T>,
    staged: &[(IndexId, &IndexSchema<T>, Vec<Vec<u8>>)],
) -> Result<Vec<u8>> {
    let (primary_id, primary) = table_schema.primary();
    staged
        .iter()
        .find(|(id, _, _)| *id == primary_id)
        .and_then(|(_, _, keys)| keys.first().cloned())
        .ok_or_else(|| Error::MissingIndexValue {
            table: table_schema.name.clone(),
            index: primary.name.clone(),
        })
}

fn single_key(mut keys: Vec<Vec<u8>>) -> Option<Vec<u8>> {
    if keys.len() == 1 {
        keys.pop()
    } else {
        None
    }
}
