//! Core types for memdb
//!
//! This crate defines the pieces every other layer builds on:
//! - [`Record`], [`FieldValue`], [`Arg`]: how objects and query arguments are seen
//! - [`indexer`]: field indexers turning records and arguments into byte keys
//! - [`schema`]: validated table/index layout
//! - [`Error`]: the single error type of the workspace

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod indexer;
pub mod schema;
pub mod value;

pub use error::{Error, Result};
pub use indexer::{
    format_uuid, parse_uuid, BoolFieldIndex, CompoundIndex, Indexer, MultiIndexer, SingleIndexer,
    StringFieldIndex, StringSliceFieldIndex, UintFieldIndex, UuidFieldIndex,
};
pub use schema::{
    DbSchema, DbSchemaBuilder, IndexConfig, IndexId, IndexSchema, IndexerConfig, SchemaConfig,
    TableConfig, TableSchema, ID_INDEX,
};
pub use value::{Arg, FieldValue, Record};
