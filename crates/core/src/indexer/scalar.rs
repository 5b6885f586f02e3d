use super::{arg_mismatch, lookup_field, single_arg, unsupported, SingleIndexer};
use crate::error::Result;
use crate::value::{Arg, FieldValue, Record};

/// Index over an unsigned integer field.
///
/// Keys are 8 bytes big-endian, so byte order is numeric order and range
/// scans via `lower_bound` walk values in ascending order. Zero is a valid
/// value, so every record with the field is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UintFieldIndex {
    /// Field to read from the record
    pub field: String,
}

impl UintFieldIndex {
    /// Create a new unsigned integer indexer
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

impl<T: Record> SingleIndexer<T> for UintFieldIndex {
    fn from_object(&self, obj: &T) -> Result<Option<Vec<u8>>> {
        match lookup_field(obj, &self.field)? {
            FieldValue::Uint(u) => Ok(Some(u.to_be_bytes().to_vec())),
            other => Err(unsupported(&self.field, "Uint", &other)),
        }
    }

    fn from_args(&self, args: &[Arg]) -> Result<Vec<u8>> {
        match single_arg(args)? {
            Arg::Uint(u) => Ok(u.to_be_bytes().to_vec()),
            Arg::Int(i) if *i >= 0 => Ok((*i as u64).to_be_bytes().to_vec()),
            other => Err(arg_mismatch(0, "Uint", other)),
        }
    }
}

/// Index over a boolean field; `false` keys as `0x00`, `true` as `0x01`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoolFieldIndex {
    /// Field to read from the record
    pub field: String,
}

impl BoolFieldIndex {
    /// Create a new boolean indexer
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

impl<T: Record> SingleIndexer<T> for BoolFieldIndex {
    fn from_object(&self, obj: &T) -> Result<Option<Vec<u8>>> {
        match lookup_field(obj, &self.field)? {
            FieldValue::Bool(b) => Ok(Some(vec![u8::from(b)])),
            other => Err(unsupported(&self.field, "Bool", &other)),
        }
    }

    fn from_args(&self, args: &[Arg]) -> Result<Vec<u8>> {
        match single_arg(args)? {
            Arg::Bool(b) => Ok(vec![u8::from(*b)]),
            other => Err(arg_mismatch(0, "Bool", other)),
        }
    }
}
