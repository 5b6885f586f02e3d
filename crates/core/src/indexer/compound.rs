use super::SingleIndexer;
use crate::error::{Error, Result};
use crate::value::Arg;
use std::fmt;

/// Separator written between sub-keys.
const SEPARATOR: u8 = 0x00;

/// Index over several fields at once.
///
/// The key is each sub-indexer's key joined by `0x00`. Lookups take one
/// argument per sub-indexer, in order. Prefix lookups take a leading subset
/// of the arguments; the last one given is treated as a prefix itself.
///
/// When `allow_missing` is set, a missing sub-value ends the key early
/// instead of excluding the object, so it is still found by prefix lookups
/// on the leading values.
pub struct CompoundIndex<T> {
    indexes: Vec<Box<dyn SingleIndexer<T>>>,
    allow_missing: bool,
}

impl<T> CompoundIndex<T> {
    /// Create a compound indexer from its parts
    pub fn new(indexes: Vec<Box<dyn SingleIndexer<T>>>, allow_missing: bool) -> Self {
        Self {
            indexes,
            allow_missing,
        }
    }

    /// Number of sub-indexers
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    /// True when there are no sub-indexers
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }
}

impl<T> fmt::Debug for CompoundIndex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompoundIndex")
            .field("indexes", &self.indexes)
            .field("allow_missing", &self.allow_missing)
            .finish()
    }
}

impl<T: Send + Sync + 'static> SingleIndexer<T> for CompoundIndex<T> {
    fn from_object(&self, obj: &T) -> Result<Option<Vec<u8>>> {
        let mut out = Vec::new();
        for (i, sub) in self.indexes.iter().enumerate() {
            match sub.from_object(obj)? {
                Some(key) => {
                    if i > 0 {
                        out.push(SEPARATOR);
                    }
                    out.extend_from_slice(&key);
                }
                None if self.allow_missing => break,
                None => return Ok(None),
            }
        }
        if out.is_empty() {
            Ok(None)
        } else {
            Ok(Some(out))
        }
    }

    fn from_args(&self, args: &[Arg]) -> Result<Vec<u8>> {
        if args.len() != self.indexes.len() {
            return Err(Error::ArgCountMismatch {
                expected: self.indexes.len(),
                actual: args.len(),
            });
        }
        self.join(args, false)
    }

    fn prefix_from_args(&self, args: &[Arg]) -> Result<Vec<u8>> {
        if args.is_empty() || args.len() > self.indexes.len() {
            return Err(Error::ArgCountMismatch {
                expected: self.indexes.len(),
                actual: args.len(),
            });
        }
        self.join(args, true)
    }
}

impl<T: Send + Sync + 'static> CompoundIndex<T> {
    fn join(&self, args: &[Arg], last_is_prefix: bool) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for (i, (sub, arg)) in self.indexes.iter().zip(args).enumerate() {
            let single = std::slice::from_ref(arg);
            let key = if last_is_prefix && i + 1 == args.len() {
                sub.prefix_from_args(single)
            } else {
                sub.from_args(single)
            };
            let key = key.map_err(|e| reposition(e, i))?;
            if i > 0 {
                out.push(SEPARATOR);
            }
            out.extend_from_slice(&key);
        }
        Ok(out)
    }
}

/// Report argument type errors at the compound argument position.
fn reposition(err: Error, position: usize) -> Error {
    match err {
        Error::ArgTypeMismatch {
            expected, actual, ..
        } => Error::ArgTypeMismatch {
            position,
            expected,
            actual,
        },
        other => other,
    }
}
