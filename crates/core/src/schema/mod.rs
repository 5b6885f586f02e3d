//! Table and index schema
//!
//! A [`DbSchema`] is built once, validated, and then shared read-only by the
//! store and every transaction. Validation runs at construction so a store
//! can never exist with an invalid layout:
//!
//! - at least one table, table names unique and non-empty
//! - every table has an index named [`ID_INDEX`]
//! - the `id` index is unique, single-valued and does not allow missing values
//! - index names within a table are unique and non-empty
//!
//! Each (table, index) pair gets a dense [`IndexId`] used by the storage
//! layer to address that index's tree.

mod config;

pub use config::{IndexConfig, IndexerConfig, SchemaConfig, TableConfig};

use crate::error::{Error, Result};
use crate::indexer::Indexer;
use rustc_hash::FxHashMap;
use std::fmt;

/// Name of the primary index every table must define.
pub const ID_INDEX: &str = "id";

/// Dense identifier of a (table, index) pair within one schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexId(pub usize);

impl fmt::Display for IndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One index on a table.
#[derive(Debug)]
pub struct IndexSchema<T> {
    /// Index name, unique within its table
    pub name: String,
    /// At most one object per key
    pub unique: bool,
    /// Objects without a key are left out of the index instead of rejected
    pub allow_missing: bool,
    /// Key extractor
    pub indexer: Indexer<T>,
}

impl<T> IndexSchema<T> {
    /// Create a non-unique index that requires a value
    pub fn new(name: impl Into<String>, indexer: Indexer<T>) -> Self {
        Self {
            name: name.into(),
            unique: false,
            allow_missing: false,
            indexer,
        }
    }

    /// Set the uniqueness flag
    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    /// Set the allow-missing flag
    pub fn allow_missing(mut self, allow_missing: bool) -> Self {
        self.allow_missing = allow_missing;
        self
    }

    /// True if this is the table's primary index
    pub fn is_primary(&self) -> bool {
        self.name == ID_INDEX
    }

    fn validate(&self, table: &str) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::SchemaValidationFailed(format!(
                "table '{}' has an index with an empty name",
                table
            )));
        }
        Ok(())
    }
}

/// A table and its indexes.
#[derive(Debug)]
pub struct TableSchema<T> {
    /// Table name
    pub name: String,
    indexes: Vec<IndexSchema<T>>,
    /// IndexId of this table's first index; assigned by `DbSchema::new`
    base_id: usize,
    primary: usize,
}

impl<T> TableSchema<T> {
    /// Create an empty table
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            indexes: Vec::new(),
            base_id: 0,
            primary: 0,
        }
    }

    /// Add an index
    pub fn with_index(mut self, index: IndexSchema<T>) -> Self {
        self.indexes.push(index);
        self
    }

    /// Iterate over indexes in declaration order with their ids
    pub fn indexes(&self) -> impl Iterator<Item = (IndexId, &IndexSchema<T>)> {
        let base = self.base_id;
        self.indexes
            .iter()
            .enumerate()
            .map(move |(i, idx)| (IndexId(base + i), idx))
    }

    /// Look up an index by name
    pub fn index(&self, name: &str) -> Result<(IndexId, &IndexSchema<T>)> {
        self.indexes
            .iter()
            .position(|idx| idx.name == name)
            .map(|i| (IndexId(self.base_id + i), &self.indexes[i]))
            .ok_or_else(|| Error::UnknownIndex {
                table: self.name.clone(),
                index: name.to_string(),
            })
    }

    /// The primary (`id`) index
    pub fn primary(&self) -> (IndexId, &IndexSchema<T>) {
        (
            IndexId(self.base_id + self.primary),
            &self.indexes[self.primary],
        )
    }

    /// Number of indexes
    pub fn index_count(&self) -> usize {
        self.indexes.len()
    }

    fn validate(&mut self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::SchemaValidationFailed(
                "table with an empty name".to_string(),
            ));
        }
        if self.indexes.is_empty() {
            return Err(Error::SchemaValidationFailed(format!(
                "table '{}' has no indexes",
                self.name
            )));
        }

        let mut seen = FxHashMap::default();
        for (i, index) in self.indexes.iter().enumerate() {
            index.validate(&self.name)?;
            if seen.insert(index.name.as_str(), i).is_some() {
                return Err(Error::SchemaValidationFailed(format!(
                    "table '{}' defines index '{}' more than once",
                    self.name, index.name
                )));
            }
        }

        let primary = *seen.get(ID_INDEX).ok_or_else(|| {
            Error::SchemaValidationFailed(format!(
                "table '{}' must have an '{}' index",
                self.name, ID_INDEX
            ))
        })?;
        let id = &self.indexes[primary];
        if !id.unique {
            return Err(Error::SchemaValidationFailed(format!(
                "'{}' index of table '{}' must be unique",
                ID_INDEX, self.name
            )));
        }
        if id.allow_missing {
            return Err(Error::SchemaValidationFailed(format!(
                "'{}' index of table '{}' must not allow missing values",
                ID_INDEX, self.name
            )));
        }
        if id.indexer.is_multi() {
            return Err(Error::SchemaValidationFailed(format!(
                "'{}' index of table '{}' must be single-valued",
                ID_INDEX, self.name
            )));
        }
        self.primary = primary;
        Ok(())
    }
}

/// Validated schema for a whole store.
#[derive(Debug)]
pub struct DbSchema<T> {
    tables: Vec<TableSchema<T>>,
    by_name: FxHashMap<String, usize>,
    index_count: usize,
}

impl<T> DbSchema<T> {
    /// Validate `tables` and assign index ids
    ///
    /// # Errors
    ///
    /// `SchemaValidationFailed` describing the first problem found.
    pub fn new(tables: Vec<TableSchema<T>>) -> Result<Self> {
        if tables.is_empty() {
            return Err(Error::SchemaValidationFailed(
                "schema has no tables defined".to_string(),
            ));
        }

        let mut by_name = FxHashMap::default();
        let mut tables = tables;
        let mut next_id = 0;
        for (i, table) in tables.iter_mut().enumerate() {
            table.validate()?;
            if by_name.insert(table.name.clone(), i).is_some() {
                return Err(Error::SchemaValidationFailed(format!(
                    "table '{}' is defined more than once",
                    table.name
                )));
            }
            table.base_id = next_id;
            next_id += table.indexes.len();
        }

        Ok(Self {
            tables,
            by_name,
            index_count: next_id,
        })
    }

    /// Start a schema builder
    pub fn builder() -> DbSchemaBuilder<T> {
        DbSchemaBuilder { tables: Vec::new() }
    }

    /// Look up a table by name
    pub fn table(&self, name: &str) -> Result<&TableSchema<T>> {
        self.by_name
            .get(name)
            .map(|&i| &self.tables[i])
            .ok_or_else(|| Error::UnknownTable(name.to_string()))
    }

    /// Look up an index by table and index name
    pub fn index(&self, table: &str, index: &str) -> Result<(IndexId, &IndexSchema<T>)> {
        self.table(table)?.index(index)
    }

    /// Iterate over tables in declaration order
    pub fn tables(&self) -> impl Iterator<Item = &TableSchema<T>> {
        self.tables.iter()
    }

    /// Total number of indexes across all tables
    pub fn index_count(&self) -> usize {
        self.index_count
    }
}

/// Builder collecting tables before validation.
pub struct DbSchemaBuilder<T> {
    tables: Vec<TableSchema<T>>,
}

impl<T> DbSchemaBuilder<T> {
    /// Add a table
    pub fn table(mut self, table: TableSchema<T>) -> Self {
        self.tables.push(table);
        self
    }

    /// Validate and build
    pub fn build(self) -> Result<DbSchema<T>> {
        DbSchema::new(self.tables)
    }
}
