//! Transaction manager
//!
//! Owns the committed index roots and hands out transactions against them:
//!
//! - any number of [`ReadTxn`]s, each pinned to the roots current when it
//!   began, never blocking and never blocked;
//! - at most one [`WriteTxn`] at a time, serialized by the write lock.
//!
//! ## Commit Sequence
//!
//! ```text
//! 1. begin_write() - acquire write lock, capture latest committed roots
//! 2. insert/delete - path-copy into per-index working trees
//! 3. commit()      - publish new roots (single swap under the roots lock),
//!                    bump version
//! 4.               - release write lock
//! 5.               - fire channels of every replaced node
//! 6.               - run deferred callbacks
//! ```
//!
//! Readers that wake from step 5 always find the new roots, because the
//! swap in step 3 happens first.

use crate::snapshot::Roots;
use crate::transaction::{ReadTxn, WriteTxn};
use memdb_core::{DbSchema, Error, Record, Result};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Coordinates read and write transactions over one store
pub struct TransactionManager<T> {
    schema: Arc<DbSchema<T>>,

    /// Committed roots
    ///
    /// Held only long enough to clone or replace the `Arc`.
    roots: RwLock<Arc<Roots<T>>>,

    /// Single-writer lock
    ///
    /// Held by the open [`WriteTxn`] from `begin_write` until commit or
    /// abort.
    write_lock: Mutex<()>,

    /// Committed version
    ///
    /// Incremented once per commit that changed anything.
    version: AtomicU64,

    /// Next transaction ID
    next_txn_id: AtomicU64,

    watch_limit: usize,
    track_changes: bool,
}

impl<T: Record> TransactionManager<T> {
    /// Create a manager with empty trees for every index in `schema`
    pub fn new(schema: Arc<DbSchema<T>>) -> Self {
        let roots = Arc::new(Roots::empty(schema.index_count()));
        Self::with_roots(schema, roots, 0)
    }

    /// Create a manager that starts from existing roots
    ///
    /// The roots must have been built for `schema`. Used to fork a store
    /// from a snapshot.
    pub fn with_roots(schema: Arc<DbSchema<T>>, roots: Arc<Roots<T>>, version: u64) -> Self {
        TransactionManager {
            schema,
            roots: RwLock::new(roots),
            write_lock: Mutex::new(()),
            version: AtomicU64::new(version),
            next_txn_id: AtomicU64::new(1),
            watch_limit: usize::MAX,
            track_changes: false,
        }
    }

    /// Cap on channels per watch set before falling back to table channels
    pub fn with_watch_limit(mut self, limit: usize) -> Self {
        self.watch_limit = limit;
        self
    }

    /// Record changes in every write transaction by default
    pub fn with_change_tracking(mut self, enabled: bool) -> Self {
        self.track_changes = enabled;
        self
    }

    /// Store schema
    pub fn schema(&self) -> &Arc<DbSchema<T>> {
        &self.schema
    }

    /// Current committed version
    pub fn current_version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Current committed roots and their version
    pub fn current_roots(&self) -> (Arc<Roots<T>>, u64) {
        let roots = self.roots.read();
        (Arc::clone(&roots), self.version.load(Ordering::SeqCst))
    }

    /// Configured watch limit
    pub fn watch_limit(&self) -> usize {
        self.watch_limit
    }

    /// Begin a read transaction on the latest committed state
    pub fn begin_read(&self) -> ReadTxn<T> {
        let (roots, version) = self.current_roots();
        let txn_id = self.next_txn_id();
        debug!(txn_id, version, "began read transaction");
        ReadTxn::new(
            Arc::clone(&self.schema),
            roots,
            txn_id,
            version,
            self.watch_limit,
        )
    }

    /// Begin the write transaction
    ///
    /// Blocks until no other write transaction is open. With a `timeout`,
    /// gives up after it elapses with [`Error::WriteAcquisitionTimeout`];
    /// `None` waits indefinitely.
    pub fn begin_write(&self, timeout: Option<Duration>) -> Result<WriteTxn<'_, T>> {
        let guard = match timeout {
            Some(timeout) => self.write_lock.try_lock_for(timeout).ok_or_else(|| {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "write transaction acquisition timed out"
                );
                Error::WriteAcquisitionTimeout(timeout)
            })?,
            None => self.write_lock.lock(),
        };
        let (base, version) = self.current_roots();
        let txn_id = self.next_txn_id();
        debug!(txn_id, version, "began write transaction");
        Ok(WriteTxn::new(
            self,
            guard,
            base,
            txn_id,
            version,
            self.track_changes,
        ))
    }

    /// Publish new roots; returns the new version.
    ///
    /// Only called by a write transaction holding the write lock.
    pub(crate) fn publish(&self, roots: Arc<Roots<T>>) -> u64 {
        let mut current = self.roots.write();
        *current = roots;
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn next_txn_id(&self) -> u64 {
        self.next_txn_id.fetch_add(1, Ordering::SeqCst)
    }
}

impl<T> fmt::Debug for TransactionManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionManager")
            .field("version", &self.version.load(Ordering::SeqCst))
            .field("write_locked", &self.write_lock.is_locked())
            .field("watch_limit", &self.watch_limit)
            .field("track_changes", &self.track_changes)
            .finish()
    }
}
