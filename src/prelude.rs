//! Convenient imports for memdb.
//!
//! This module re-exports the most commonly used types so you can get started
//! with a single import:
//!
//! ```ignore
//! use memdb::prelude::*;
//!
//! let db = MemDb::builder().table(nodes_table()).build()?;
//! let node = db.read().first("nodes", "id", &[node_id.into()])?;
//! ```

// Main entry point
pub use crate::config::MemDbConfig;
pub use crate::database::{MemDb, MemDbBuilder};

// Error handling
pub use memdb_core::{Error, Result};

// Records and schema
pub use memdb_core::{
    Arg, FieldValue, IndexSchema, Indexer, Record, StringFieldIndex, StringSliceFieldIndex,
    TableSchema, UintFieldIndex, UuidFieldIndex,
};

// Transactions
pub use memdb_concurrency::{ReadTxn, TransactionOps, WriteTxn};

// Watches
pub use memdb_storage::{CancelToken, WatchOutcome, WatchSet};
