//! Query surface shared by read and write transactions
//!
//! Both transaction kinds implement the required methods of
//! [`TransactionOps`]; every query is a provided method on top of them, so
//! a write transaction answers queries against its own staged state with
//! exactly the same semantics a read transaction uses for committed state.
//!
//! ## Lookup rules
//!
//! | Index kind | Exact lookup | Prefix / range |
//! |------------|--------------|----------------|
//! | unique (incl. `id`) | point lookup on the key | scan from the key |
//! | non-unique | scan of `key ++ 0x00` | scan from the key |
//!
//! Secondary entries hold the primary key; [`ResultIter`] resolves them
//! through the primary index of the same snapshot.

use crate::snapshot::{secondary_prefix, IndexTree, IndexValue};
use memdb_core::{Arg, DbSchema, IndexId, IndexSchema, Record, Result};
use memdb_storage::{Iter, WatchCh, WatchSet};
use std::fmt;
use std::sync::Arc;

/// Read operations available inside any transaction
pub trait TransactionOps<T: Record> {
    /// Schema of the store
    fn schema(&self) -> &DbSchema<T>;

    /// Fails with `TransactionAlreadyFinalized` once the transaction ended.
    ///
    /// Every query checks this before touching its arguments.
    fn ensure_open(&self) -> Result<()>;

    /// Tree for one index, as seen by this transaction
    ///
    /// Fails with `TransactionAlreadyFinalized` once the transaction ended.
    fn index_tree(&self, id: IndexId) -> Result<IndexTree<T>>;

    /// Channel cap used by [`add_watch`](Self::add_watch)
    fn watch_limit(&self) -> usize {
        usize::MAX
    }

    /// Objects whose `index` key equals the key built from `args`
    fn get(&self, table: &str, index: &str, args: &[Arg]) -> Result<ResultIter<T>> {
        self.get_watch(table, index, args).map(|(_, iter)| iter)
    }

    /// Like [`get`](Self::get), plus a channel that fires when the result
    /// may have changed
    fn get_watch(
        &self,
        table: &str,
        index: &str,
        args: &[Arg],
    ) -> Result<(WatchCh, ResultIter<T>)> {
        self.ensure_open()?;
        let (id, schema) = self.schema().index(table, index)?;
        let key = schema.indexer.from_args(args)?;
        let tree = self.index_tree(id)?;
        let primary = primary_for(self, table, schema)?;
        if schema.unique {
            let (ch, value) = tree.get_watch(&key);
            Ok((ch, ResultIter::one(value, primary)))
        } else {
            let (ch, leaves) = tree.seek_prefix_watch(&secondary_prefix(&key));
            Ok((ch, ResultIter::scan(leaves, primary)))
        }
    }

    /// First object matching [`get`](Self::get), in index key order
    fn first(&self, table: &str, index: &str, args: &[Arg]) -> Result<Option<Arc<T>>> {
        Ok(self.get(table, index, args)?.next())
    }

    /// Like [`first`](Self::first), plus a watch channel
    fn first_watch(
        &self,
        table: &str,
        index: &str,
        args: &[Arg],
    ) -> Result<(WatchCh, Option<Arc<T>>)> {
        let (ch, mut iter) = self.get_watch(table, index, args)?;
        Ok((ch, iter.next()))
    }

    /// Last object matching [`get`](Self::get), in index key order
    fn last(&self, table: &str, index: &str, args: &[Arg]) -> Result<Option<Arc<T>>> {
        Ok(self.get(table, index, args)?.last())
    }

    /// Every object in the table, ordered by `index`
    fn all(&self, table: &str, index: &str) -> Result<ResultIter<T>> {
        self.ensure_open()?;
        let (id, schema) = self.schema().index(table, index)?;
        let tree = self.index_tree(id)?;
        let primary = primary_for(self, table, schema)?;
        Ok(ResultIter::scan(tree.iter(), primary))
    }

    /// Objects whose `index` key starts with the prefix built from `args`
    fn prefix(&self, table: &str, index: &str, args: &[Arg]) -> Result<ResultIter<T>> {
        self.prefix_watch(table, index, args).map(|(_, iter)| iter)
    }

    /// Like [`prefix`](Self::prefix), plus a watch channel
    fn prefix_watch(
        &self,
        table: &str,
        index: &str,
        args: &[Arg],
    ) -> Result<(WatchCh, ResultIter<T>)> {
        self.ensure_open()?;
        let (id, schema) = self.schema().index(table, index)?;
        let prefix = schema.indexer.prefix_from_args(args)?;
        let tree = self.index_tree(id)?;
        let primary = primary_for(self, table, schema)?;
        let (ch, leaves) = tree.seek_prefix_watch(&prefix);
        Ok((ch, ResultIter::scan(leaves, primary)))
    }

    /// Objects whose `index` key is `>=` the key built from `args`, in
    /// order
    fn lower_bound(&self, table: &str, index: &str, args: &[Arg]) -> Result<ResultIter<T>> {
        self.ensure_open()?;
        let (id, schema) = self.schema().index(table, index)?;
        let key = schema.indexer.from_args(args)?;
        let tree = self.index_tree(id)?;
        let primary = primary_for(self, table, schema)?;
        Ok(ResultIter::scan(tree.lower_bound(&key), primary))
    }

    /// Number of objects in the table
    fn count(&self, table: &str) -> Result<usize> {
        self.ensure_open()?;
        let (id, _) = self.schema().table(table)?.primary();
        Ok(self.index_tree(id)?.len())
    }

    /// Channel that fires on any change to the table
    fn table_watch(&self, table: &str) -> Result<WatchCh> {
        self.ensure_open()?;
        let (id, _) = self.schema().table(table)?.primary();
        Ok(self.index_tree(id)?.root_watch())
    }

    /// Add `ch` to `ws`, falling back to the table channel once the set
    /// holds [`watch_limit`](Self::watch_limit) channels
    fn add_watch(&self, ws: &mut WatchSet, table: &str, ch: WatchCh) -> Result<()> {
        self.ensure_open()?;
        let limit = self.watch_limit();
        if ws.len() < limit {
            ws.add(ch);
        } else {
            ws.add(self.table_watch(table)?);
        }
        Ok(())
    }
}

/// Primary tree used to resolve back-references, or `None` when `index`
/// is the primary index itself.
fn primary_for<T, O>(ops: &O, table: &str, index: &IndexSchema<T>) -> Result<Option<IndexTree<T>>>
where
    T: Record,
    O: TransactionOps<T> + ?Sized,
{
    if index.is_primary() {
        return Ok(None);
    }
    let (id, _) = ops.schema().table(table)?.primary();
    ops.index_tree(id).map(Some)
}

enum Source<T> {
    One(Option<IndexValue<T>>),
    Scan(Iter<IndexValue<T>>),
}

/// Lazily resolved query results.
///
/// Reads from the snapshot the query ran against; later commits are not
/// visible through it.
pub struct ResultIter<T> {
    source: Source<T>,
    primary: Option<IndexTree<T>>,
}

impl<T> ResultIter<T> {
    fn one(value: Option<IndexValue<T>>, primary: Option<IndexTree<T>>) -> Self {
        Self {
            source: Source::One(value),
            primary,
        }
    }

    fn scan(leaves: Iter<IndexValue<T>>, primary: Option<IndexTree<T>>) -> Self {
        Self {
            source: Source::Scan(leaves),
            primary,
        }
    }

    fn resolve(&self, value: &IndexValue<T>) -> Option<Arc<T>> {
        match value {
            IndexValue::Object(obj) => Some(Arc::clone(obj)),
            IndexValue::PrimaryKey(pk) => match self.primary.as_ref()?.get(pk)? {
                IndexValue::Object(obj) => Some(obj),
                IndexValue::PrimaryKey(_) => None,
            },
        }
    }
}

impl<T> Iterator for ResultIter<T> {
    type Item = Arc<T>;

    fn next(&mut self) -> Option<Arc<T>> {
        loop {
            let value = match &mut self.source {
                Source::One(slot) => slot.take()?,
                Source::Scan(leaves) => leaves.next()?.value().clone(),
            };
            if let Some(obj) = self.resolve(&value) {
                return Some(obj);
            }
        }
    }
}

impl<T> fmt::Debug for ResultIter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.source {
            Source::One(_) => "one",
            Source::Scan(_) => "scan",
        };
        f.debug_struct("ResultIter")
            .field("source", &kind)
            .field("resolves", &self.primary.is_some())
            .finish()
    }
}
