use super::{arg_mismatch, lookup_field, single_arg, text_key, unsupported, SingleIndexer};
use crate::error::Result;
use crate::value::{Arg, FieldValue, Record};

/// Exact-match index over a text field.
///
/// An empty string is treated as "not present". With `lowercase` set, both
/// stored keys and lookup keys are lower-cased, so lookups ignore case.
/// Text containing a NUL byte is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringFieldIndex {
    /// Field to read from the record
    pub field: String,
    /// Fold keys to lower case
    pub lowercase: bool,
}

impl StringFieldIndex {
    /// Create a new string indexer
    pub fn new(field: impl Into<String>, lowercase: bool) -> Self {
        Self {
            field: field.into(),
            lowercase,
        }
    }
}

impl<T: Record> SingleIndexer<T> for StringFieldIndex {
    fn from_object(&self, obj: &T) -> Result<Option<Vec<u8>>> {
        match lookup_field(obj, &self.field)? {
            FieldValue::Str("") => Ok(None),
            FieldValue::Str(s) => text_key(&self.field, s, self.lowercase).map(Some),
            other => Err(unsupported(&self.field, "Str", &other)),
        }
    }

    fn from_args(&self, args: &[Arg]) -> Result<Vec<u8>> {
        match single_arg(args)? {
            Arg::Str(s) => text_key(&self.field, s, self.lowercase),
            other => Err(arg_mismatch(0, "Str", other)),
        }
    }
}
