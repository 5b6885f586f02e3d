//! Declarative schema description
//!
//! Mirrors [`DbSchema`](super::DbSchema) as plain data so a layout can be
//! deserialized from configuration (toml, json, ...) and turned into a
//! validated schema for any [`Record`] type.
//!
//! ```toml
//! [[tables]]
//! name = "nodes"
//!
//! [[tables.indexes]]
//! name = "id"
//! unique = true
//! indexer = { type = "uuid", field = "ID" }
//!
//! [[tables.indexes]]
//! name = "name"
//! indexer = { type = "string", field = "Name", lowercase = true }
//! ```

use super::{DbSchema, IndexSchema, TableSchema};
use crate::error::{Error, Result};
use crate::indexer::{
    BoolFieldIndex, CompoundIndex, Indexer, SingleIndexer, StringFieldIndex,
    StringSliceFieldIndex, UintFieldIndex, UuidFieldIndex,
};
use crate::value::Record;
use serde::{Deserialize, Serialize};

/// Whole-store schema description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Tables in declaration order
    pub tables: Vec<TableConfig>,
}

/// One table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Table name
    pub name: String,
    /// Indexes in declaration order
    pub indexes: Vec<IndexConfig>,
}

/// One index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Index name
    pub name: String,
    /// Uniqueness flag
    #[serde(default)]
    pub unique: bool,
    /// Allow-missing flag
    #[serde(default)]
    pub allow_missing: bool,
    /// Indexer configuration
    pub indexer: IndexerConfig,
}

/// Indexer variant and its settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IndexerConfig {
    /// [`StringFieldIndex`]
    String {
        /// Field name
        field: String,
        /// Case-fold keys
        #[serde(default)]
        lowercase: bool,
    },
    /// [`UuidFieldIndex`]
    Uuid {
        /// Field name
        field: String,
    },
    /// [`UintFieldIndex`]
    Uint {
        /// Field name
        field: String,
    },
    /// [`BoolFieldIndex`]
    Bool {
        /// Field name
        field: String,
    },
    /// [`StringSliceFieldIndex`]
    StringSlice {
        /// Field name
        field: String,
        /// Case-fold keys
        #[serde(default)]
        lowercase: bool,
    },
    /// [`CompoundIndex`] over single-valued parts
    Compound {
        /// Sub-indexers in key order
        parts: Vec<IndexerConfig>,
        /// End the key early on a missing part
        #[serde(default)]
        allow_missing: bool,
    },
}

impl IndexerConfig {
    /// Build the indexer this configuration describes
    pub fn build<T: Record>(&self) -> Result<Indexer<T>> {
        match self {
            IndexerConfig::StringSlice { field, lowercase } => Ok(Indexer::multi(
                StringSliceFieldIndex::new(field.clone(), *lowercase),
            )),
            other => other.build_single().map(Indexer::Single),
        }
    }

    fn build_single<T: Record>(&self) -> Result<Box<dyn SingleIndexer<T>>> {
        let indexer: Box<dyn SingleIndexer<T>> = match self {
            IndexerConfig::String { field, lowercase } => {
                Box::new(StringFieldIndex::new(field.clone(), *lowercase))
            }
            IndexerConfig::Uuid { field } => Box::new(UuidFieldIndex::new(field.clone())),
            IndexerConfig::Uint { field } => Box::new(UintFieldIndex::new(field.clone())),
            IndexerConfig::Bool { field } => Box::new(BoolFieldIndex::new(field.clone())),
            IndexerConfig::Compound {
                parts,
                allow_missing,
            } => {
                if parts.is_empty() {
                    return Err(Error::SchemaValidationFailed(
                        "compound indexer needs at least one part".to_string(),
                    ));
                }
                let mut built = Vec::with_capacity(parts.len());
                for part in parts {
                    built.push(part.build_single()?);
                }
                Box::new(CompoundIndex::new(built, *allow_missing))
            }
            IndexerConfig::StringSlice { field, .. } => {
                return Err(Error::SchemaValidationFailed(format!(
                    "multi-valued indexer on '{}' cannot be part of a compound index",
                    field
                )));
            }
        };
        Ok(indexer)
    }
}

impl SchemaConfig {
    /// Build and validate a schema for record type `T`
    pub fn build<T: Record>(&self) -> Result<DbSchema<T>> {
        let mut tables = Vec::with_capacity(self.tables.len());
        for table in &self.tables {
            let mut schema = TableSchema::new(table.name.clone());
            for index in &table.indexes {
                schema = schema.with_index(
                    IndexSchema::new(index.name.clone(), index.indexer.build()?)
                        .unique(index.unique)
                        .allow_missing(index.allow_missing),
                );
            }
            tables.push(schema);
        }
        DbSchema::new(tables)
    }
}
