//! memdb Integration Tests
//!
//! Exercises the public store API end to end: index maintenance across
//! tables, snapshot isolation, watches across threads, transaction
//! lifecycle and the listener capability.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test memdb
//! cargo test --test memdb watch::
//! ```

use memdb::prelude::*;
use memdb::{BoolFieldIndex, CompoundIndex, SchemaConfig, SingleIndexer};
use uuid::Uuid;

mod crud;
mod isolation;
mod lifecycle;
mod watch;

// =============================================================================
// SHARED TEST UTILITIES
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub datacenter: String,
    pub status: String,
    pub drain: bool,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alloc {
    pub id: String,
    pub node_id: String,
    pub job: String,
    pub index: u64,
}

/// Every object kind the test store holds.
#[derive(Debug, Clone, PartialEq)]
pub enum Obj {
    Node(Node),
    Alloc(Alloc),
}

impl Record for Obj {
    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match self {
            Obj::Node(n) => match name {
                "ID" => Some(FieldValue::Str(&n.id)),
                "Name" => Some(FieldValue::Str(&n.name)),
                "Datacenter" => Some(FieldValue::Str(&n.datacenter)),
                "Status" => Some(FieldValue::Str(&n.status)),
                "Drain" => Some(FieldValue::Bool(n.drain)),
                "Tags" => Some(FieldValue::StrList(&n.tags)),
                _ => None,
            },
            Obj::Alloc(a) => match name {
                "ID" => Some(FieldValue::Str(&a.id)),
                "NodeID" => Some(FieldValue::Str(&a.node_id)),
                "Job" => Some(FieldValue::Str(&a.job)),
                "Index" => Some(FieldValue::Uint(a.index)),
                _ => None,
            },
        }
    }
}

impl Obj {
    pub fn node(&self) -> &Node {
        match self {
            Obj::Node(n) => n,
            Obj::Alloc(_) => panic!("not a node: {:?}", self),
        }
    }

    pub fn alloc(&self) -> &Alloc {
        match self {
            Obj::Alloc(a) => a,
            Obj::Node(_) => panic!("not an alloc: {:?}", self),
        }
    }
}

pub fn node(name: &str, datacenter: &str, status: &str) -> Obj {
    Obj::Node(Node {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        datacenter: datacenter.to_string(),
        status: status.to_string(),
        drain: false,
        tags: Vec::new(),
    })
}

pub fn alloc(id: &str, node_id: &str, job: &str, index: u64) -> Obj {
    Obj::Alloc(Alloc {
        id: id.to_string(),
        node_id: node_id.to_string(),
        job: job.to_string(),
        index,
    })
}

pub fn nodes_table() -> TableSchema<Obj> {
    let dc_status: Vec<Box<dyn SingleIndexer<Obj>>> = vec![
        Box::new(StringFieldIndex::new("Datacenter", false)),
        Box::new(StringFieldIndex::new("Status", false)),
    ];
    TableSchema::new("nodes")
        .with_index(IndexSchema::new("id", Indexer::single(UuidFieldIndex::new("ID"))).unique(true))
        .with_index(
            IndexSchema::new("name", Indexer::single(StringFieldIndex::new("Name", true)))
                .unique(true),
        )
        .with_index(IndexSchema::new(
            "datacenter",
            Indexer::single(StringFieldIndex::new("Datacenter", false)),
        ))
        .with_index(IndexSchema::new(
            "dc_status",
            Indexer::single(CompoundIndex::new(dc_status, false)),
        ))
        .with_index(IndexSchema::new("drain", Indexer::single(BoolFieldIndex::new("Drain"))))
        .with_index(
            IndexSchema::new("tags", Indexer::multi(StringSliceFieldIndex::new("Tags", false)))
                .allow_missing(true),
        )
}

pub fn allocs_table() -> TableSchema<Obj> {
    TableSchema::new("allocs")
        .with_index(
            IndexSchema::new("id", Indexer::single(StringFieldIndex::new("ID", false)))
                .unique(true),
        )
        .with_index(IndexSchema::new("node", Indexer::single(UuidFieldIndex::new("NodeID"))))
        .with_index(IndexSchema::new("job", Indexer::single(StringFieldIndex::new("Job", false))))
        .with_index(IndexSchema::new("index", Indexer::single(UintFieldIndex::new("Index"))))
}

/// Route store logs to the test output; `RUST_LOG` overrides the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Store with the `nodes` and `allocs` tables
pub fn create_db() -> MemDb<Obj> {
    init_tracing();
    MemDb::builder()
        .table(nodes_table())
        .table(allocs_table())
        .build()
        .expect("Failed to create test store")
}

/// Store with change tracking on
pub fn create_tracking_db() -> MemDb<Obj> {
    init_tracing();
    MemDb::builder()
        .table(nodes_table())
        .table(allocs_table())
        .track_changes(true)
        .build()
        .expect("Failed to create test store")
}

/// Names of a result set, in result order
pub fn names<I: IntoIterator<Item = std::sync::Arc<Obj>>>(iter: I) -> Vec<String> {
    iter.into_iter().map(|o| o.node().name.clone()).collect()
}
