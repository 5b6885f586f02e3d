//! Main store entry point.
//!
//! This module provides [`MemDb`], the handle every caller works through,
//! and [`MemDbBuilder`] for assembling one from tables and configuration.

use crate::config::MemDbConfig;
use memdb_concurrency::{ReadTxn, TransactionManager, WriteTxn};
use memdb_core::{DbSchema, Error, Record, Result, SchemaConfig, TableSchema};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// An in-memory, multi-indexed object store.
///
/// Cloning a `MemDb` is cheap and yields another handle to the same store.
/// Use [`snapshot`](Self::snapshot) for an independent copy.
///
/// # Example
///
/// ```ignore
/// use memdb::prelude::*;
///
/// let db = MemDb::builder()
///     .table(
///         TableSchema::new("nodes").with_index(
///             IndexSchema::new("id", Indexer::single(UuidFieldIndex::new("ID"))).unique(true),
///         ),
///     )
///     .build()?;
///
/// db.update(|txn| txn.insert("nodes", node))?;
///
/// let read = db.read();
/// let found = read.first("nodes", "id", &[node_id.into()])?;
/// ```
pub struct MemDb<T: Record> {
    manager: Arc<TransactionManager<T>>,
    config: MemDbConfig,
}

impl<T: Record> MemDb<T> {
    /// Create a store over `schema` with default configuration.
    ///
    /// The schema was validated when it was built, so this cannot fail.
    pub fn new(schema: DbSchema<T>) -> Self {
        Self::from_parts(Arc::new(schema), MemDbConfig::default())
    }

    /// Create a store over `schema` with the given configuration.
    ///
    /// # Errors
    ///
    /// `Config` if `config` does not validate.
    pub fn with_config(schema: DbSchema<T>, config: MemDbConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(Arc::new(schema), config))
    }

    /// Create a builder for store configuration.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let db = MemDb::builder()
    ///     .table(nodes_table())
    ///     .table(jobs_table())
    ///     .write_timeout(Some(Duration::from_millis(500)))
    ///     .track_changes(true)
    ///     .build()?;
    /// ```
    pub fn builder() -> MemDbBuilder<T> {
        MemDbBuilder::new()
    }

    fn from_parts(schema: Arc<DbSchema<T>>, config: MemDbConfig) -> Self {
        let manager = TransactionManager::new(schema);
        Self::from_manager(manager, config)
    }

    fn from_manager(manager: TransactionManager<T>, config: MemDbConfig) -> Self {
        let manager = manager
            .with_watch_limit(config.watch_limit)
            .with_change_tracking(config.track_changes);
        Self {
            manager: Arc::new(manager),
            config,
        }
    }

    /// Begin a read transaction on the latest committed state.
    ///
    /// Never blocks, including while a write transaction is open.
    pub fn read(&self) -> ReadTxn<T> {
        self.manager.begin_read()
    }

    /// Begin the write transaction.
    ///
    /// Waits for the write lock up to the configured
    /// [`write_timeout_ms`](MemDbConfig::write_timeout_ms).
    ///
    /// # Errors
    ///
    /// `WriteAcquisitionTimeout` if another writer held the lock for the
    /// whole timeout.
    pub fn write(&self) -> Result<WriteTxn<'_, T>> {
        self.manager.begin_write(self.config.write_timeout())
    }

    /// Begin the write transaction with an explicit lock timeout.
    ///
    /// `None` waits indefinitely.
    pub fn write_with_timeout(&self, timeout: Option<Duration>) -> Result<WriteTxn<'_, T>> {
        self.manager.begin_write(timeout)
    }

    /// Run `f` in a write transaction.
    ///
    /// Commits when `f` returns `Ok` and aborts when it returns `Err`,
    /// passing the error through.
    ///
    /// # Example
    ///
    /// ```ignore
    /// db.update(|txn| {
    ///     txn.insert("nodes", a)?;
    ///     txn.insert("nodes", b)
    /// })?;
    /// ```
    pub fn update<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut WriteTxn<'_, T>) -> Result<R>,
    {
        let mut txn = self.write()?;
        match f(&mut txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(e) => {
                debug!(txn_id = txn.txn_id(), error = %e, "update failed, aborting");
                txn.abort()?;
                Err(e)
            }
        }
    }

    /// Run `f` in a read transaction.
    pub fn view<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&ReadTxn<T>) -> Result<R>,
    {
        let mut txn = self.read();
        let result = f(&txn);
        txn.close();
        result
    }

    /// Fork an independent store from the latest committed state.
    ///
    /// The fork shares every tree node with this store, so it is O(1).
    /// Writes to either store are invisible to the other.
    pub fn snapshot(&self) -> Self {
        let (roots, version) = self.manager.current_roots();
        debug!(version, "forking store");
        let manager =
            TransactionManager::with_roots(Arc::clone(self.manager.schema()), roots, version);
        Self::from_manager(manager, self.config.clone())
    }

    /// Store schema
    pub fn schema(&self) -> &DbSchema<T> {
        self.manager.schema()
    }

    /// Latest committed version
    ///
    /// Starts at 0 and grows by one per commit that changed anything.
    pub fn version(&self) -> u64 {
        self.manager.current_version()
    }

    /// Configuration in effect
    pub fn config(&self) -> &MemDbConfig {
        &self.config
    }
}

impl<T: Record> Clone for MemDb<T> {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
            config: self.config.clone(),
        }
    }
}

impl<T: Record> fmt::Debug for MemDb<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemDb")
            .field("manager", &self.manager)
            .field("config", &self.config)
            .finish()
    }
}

/// Builder for store configuration.
///
/// Tables come either from [`table`](Self::table) calls or from a
/// deserialized [`SchemaConfig`], never both.
///
/// # Example
///
/// ```ignore
/// // In code
/// let db = MemDb::builder().table(nodes_table()).build()?;
///
/// // From configuration files
/// let schema: SchemaConfig = toml::from_str(&schema_toml)?;
/// let db = MemDb::builder()
///     .schema_config(schema)
///     .config(MemDbConfig::from_file("memdb.toml")?)
///     .build()?;
/// ```
pub struct MemDbBuilder<T> {
    tables: Vec<TableSchema<T>>,
    schema_config: Option<SchemaConfig>,
    config: MemDbConfig,
}

impl<T: Record> MemDbBuilder<T> {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            tables: Vec::new(),
            schema_config: None,
            config: MemDbConfig::default(),
        }
    }

    /// Add a table.
    pub fn table(mut self, table: TableSchema<T>) -> Self {
        self.tables.push(table);
        self
    }

    /// Take tables from a deserialized schema description.
    pub fn schema_config(mut self, schema: SchemaConfig) -> Self {
        self.schema_config = Some(schema);
        self
    }

    /// Replace all settings with `config`.
    pub fn config(mut self, config: MemDbConfig) -> Self {
        self.config = config;
        self
    }

    /// Write lock timeout; `None` waits indefinitely.
    pub fn write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.write_timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    /// Cap on channels per watch set before falling back to table channels.
    pub fn watch_limit(mut self, limit: usize) -> Self {
        self.config.watch_limit = limit;
        self
    }

    /// Record per-object changes in every write transaction.
    pub fn track_changes(mut self, enabled: bool) -> Self {
        self.config.track_changes = enabled;
        self
    }

    /// Validate the schema and configuration and build the store.
    ///
    /// # Errors
    ///
    /// - `SchemaValidationFailed` for an invalid or missing schema, or one
    ///   given both as tables and as a `SchemaConfig`
    /// - `Config` for invalid settings
    pub fn build(self) -> Result<MemDb<T>> {
        self.config.validate()?;
        let schema = match self.schema_config {
            Some(_) if !self.tables.is_empty() => {
                return Err(Error::SchemaValidationFailed(
                    "tables given both in code and as schema config".to_string(),
                ))
            }
            Some(schema) => schema.build()?,
            None => DbSchema::new(self.tables)?,
        };
        debug!(
            tables = schema.tables().count(),
            indexes = schema.index_count(),
            "built store"
        );
        Ok(MemDb::from_parts(Arc::new(schema), self.config))
    }
}

impl<T: Record> Default for MemDbBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
