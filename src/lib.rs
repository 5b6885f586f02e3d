//! # memdb
//!
//! Embeddable in-memory object store with multiple indexes per table,
//! snapshot-isolated transactions and change notification.
//!
//! Objects are kept in immutable radix trees, one per index. A write
//! transaction path-copies the nodes it touches and publishes new roots
//! on commit; readers keep whatever roots they started with, so they never
//! block and never see a partial commit.
//!
//! ## Quick Start
//!
//! ```ignore
//! use memdb::prelude::*;
//!
//! let db = MemDb::builder()
//!     .table(
//!         TableSchema::new("services")
//!             .with_index(
//!                 IndexSchema::new("id", Indexer::single(StringFieldIndex::new("ID", false)))
//!                     .unique(true),
//!             )
//!             .with_index(IndexSchema::new(
//!                 "node",
//!                 Indexer::single(StringFieldIndex::new("Node", false)),
//!             )),
//!     )
//!     .build()?;
//!
//! // Write
//! db.update(|txn| txn.insert("services", web))?;
//!
//! // Read, and learn when the answer changes
//! let read = db.read();
//! let (ch, services) = read.get_watch("services", "node", &["node-1".into()])?;
//! let mut ws = WatchSet::new();
//! ws.add(ch);
//! ws.watch(Some(Duration::from_secs(5)));
//! ```
//!
//! ## Layers
//!
//! - [`memdb_core`]: records, field indexers, schema, errors
//! - [`memdb_storage`]: persistent radix tree and watch channels
//! - [`memdb_concurrency`]: transaction manager and transactions
//! - this crate: [`MemDb`], configuration, listener capability

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
mod database;
pub mod listener;

pub mod prelude;

// Re-export main entry points
pub use config::MemDbConfig;
pub use database::{MemDb, MemDbBuilder};
pub use listener::{Listener, ListenerAddr, PushListener, TcpListenerAdapter};

// Re-export the layers
pub use memdb_concurrency::{
    Change, ReadTxn, ResultIter, TransactionManager, TransactionOps, WriteState, WriteTxn,
};
pub use memdb_core::{
    format_uuid, parse_uuid, Arg, BoolFieldIndex, CompoundIndex, DbSchema, Error, FieldValue,
    IndexSchema, Indexer, MultiIndexer, Record, Result, SchemaConfig, SingleIndexer,
    StringFieldIndex, StringSliceFieldIndex, TableSchema, UintFieldIndex, UuidFieldIndex,
};
pub use memdb_storage::{CancelToken, WatchCh, WatchOutcome, WatchSet};
