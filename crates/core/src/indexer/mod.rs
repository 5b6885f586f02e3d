//! Field indexers
//!
//! An indexer turns a record into zero or more ordered byte keys
//! (`from_object`, used when maintaining indexes on write) and turns query
//! arguments into a lookup key (`from_args`, used on read). Keeping the two
//! separate lets an index accept different representations on each side,
//! e.g. a UUID stored as text but queried as raw bytes.
//!
//! Keys compare lexicographically as bytes; that order is the iteration and
//! prefix-scan order of the index.
//!
//! ## Variants
//!
//! | Indexer | Kind | Key |
//! |---------|------|-----|
//! | [`StringFieldIndex`] | single | UTF-8 bytes, optionally lower-cased |
//! | [`UuidFieldIndex`] | single | 16 raw bytes |
//! | [`UintFieldIndex`] | single | 8 bytes big-endian |
//! | [`BoolFieldIndex`] | single | one byte, `0` or `1` |
//! | [`CompoundIndex`] | single | sub-keys joined by `0x00` |
//! | [`StringSliceFieldIndex`] | multi | one key per element |

mod compound;
mod scalar;
mod slice;
mod string;
mod uuid_field;

pub use self::compound::CompoundIndex;
pub use self::scalar::{BoolFieldIndex, UintFieldIndex};
pub use self::slice::StringSliceFieldIndex;
pub use self::string::StringFieldIndex;
pub use self::uuid_field::{format_uuid, parse_uuid, UuidFieldIndex};

use crate::error::{Error, Result};
use crate::value::{Arg, FieldValue, Record};
use std::fmt;

/// Indexer producing at most one key per object.
pub trait SingleIndexer<T>: Send + Sync + fmt::Debug {
    /// Extract the key from a stored object.
    ///
    /// `Ok(None)` means the object is not present in this index; that is
    /// not an error.
    fn from_object(&self, obj: &T) -> Result<Option<Vec<u8>>>;

    /// Build a lookup key from query arguments.
    fn from_args(&self, args: &[Arg]) -> Result<Vec<u8>>;

    /// Build a key prefix for prefix scans.
    fn prefix_from_args(&self, args: &[Arg]) -> Result<Vec<u8>> {
        self.from_args(args)
    }
}

/// Indexer producing any number of keys per object.
pub trait MultiIndexer<T>: Send + Sync + fmt::Debug {
    /// Extract every key for a stored object; `Ok(None)` when there are none.
    fn from_object(&self, obj: &T) -> Result<Option<Vec<Vec<u8>>>>;

    /// Build a lookup key from query arguments.
    fn from_args(&self, args: &[Arg]) -> Result<Vec<u8>>;

    /// Build a key prefix for prefix scans.
    fn prefix_from_args(&self, args: &[Arg]) -> Result<Vec<u8>> {
        self.from_args(args)
    }
}

/// The indexer backing one index, tagged by how many keys it yields.
pub enum Indexer<T> {
    /// Zero or one key per object
    Single(Box<dyn SingleIndexer<T>>),
    /// Zero or more keys per object
    Multi(Box<dyn MultiIndexer<T>>),
}

impl<T> Indexer<T> {
    /// Wrap a single-valued indexer
    pub fn single(indexer: impl SingleIndexer<T> + 'static) -> Self {
        Indexer::Single(Box::new(indexer))
    }

    /// Wrap a multi-valued indexer
    pub fn multi(indexer: impl MultiIndexer<T> + 'static) -> Self {
        Indexer::Multi(Box::new(indexer))
    }

    /// True for multi-valued indexers
    pub fn is_multi(&self) -> bool {
        matches!(self, Indexer::Multi(_))
    }

    /// All keys for `obj`. An empty vector means "not present".
    pub fn keys(&self, obj: &T) -> Result<Vec<Vec<u8>>> {
        match self {
            Indexer::Single(i) => Ok(i.from_object(obj)?.into_iter().collect()),
            Indexer::Multi(i) => Ok(i.from_object(obj)?.unwrap_or_default()),
        }
    }

    /// Lookup key for `args`
    pub fn from_args(&self, args: &[Arg]) -> Result<Vec<u8>> {
        match self {
            Indexer::Single(i) => i.from_args(args),
            Indexer::Multi(i) => i.from_args(args),
        }
    }

    /// Prefix key for `args`
    pub fn prefix_from_args(&self, args: &[Arg]) -> Result<Vec<u8>> {
        match self {
            Indexer::Single(i) => i.prefix_from_args(args),
            Indexer::Multi(i) => i.prefix_from_args(args),
        }
    }
}

impl<T> fmt::Debug for Indexer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Indexer::Single(i) => f.debug_tuple("Single").field(i).finish(),
            Indexer::Multi(i) => f.debug_tuple("Multi").field(i).finish(),
        }
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Resolve `field` on `obj`, failing with `FieldNotFound`.
pub(crate) fn lookup_field<'a, T: Record>(obj: &'a T, field: &str) -> Result<FieldValue<'a>> {
    obj.field(field).ok_or_else(|| Error::FieldNotFound {
        field: field.to_string(),
    })
}

/// Exactly one argument is required.
pub(crate) fn single_arg(args: &[Arg]) -> Result<&Arg> {
    match args {
        [arg] => Ok(arg),
        _ => Err(Error::ArgCountMismatch {
            expected: 1,
            actual: args.len(),
        }),
    }
}

pub(crate) fn unsupported(field: &str, expected: &'static str, actual: &FieldValue<'_>) -> Error {
    Error::UnsupportedFieldType {
        field: field.to_string(),
        expected,
        actual: actual.type_name(),
    }
}

pub(crate) fn arg_mismatch(position: usize, expected: &'static str, actual: &Arg) -> Error {
    Error::ArgTypeMismatch {
        position,
        expected,
        actual: actual.type_name(),
    }
}

/// Text to key bytes, lower-casing when asked.
pub(crate) fn text_key(field: &str, s: &str, lowercase: bool) -> Result<Vec<u8>> {
    if s.contains('\0') {
        return Err(Error::NulInText {
            field: field.to_string(),
        });
    }
    Ok(if lowercase {
        s.to_lowercase().into_bytes()
    } else {
        s.as_bytes().to_vec()
    })
}
