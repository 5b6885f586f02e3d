use super::{arg_mismatch, lookup_field, single_arg, text_key, unsupported, MultiIndexer};
use crate::error::Result;
use crate::value::{Arg, FieldValue, Record};

/// Multi-valued index over a list-of-strings field.
///
/// Each non-empty element becomes one key, so an object is reachable from
/// every element it carries. Duplicate elements collapse into one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringSliceFieldIndex {
    /// Field to read from the record
    pub field: String,
    /// Fold keys to lower case
    pub lowercase: bool,
}

impl StringSliceFieldIndex {
    /// Create a new string-slice indexer
    pub fn new(field: impl Into<String>, lowercase: bool) -> Self {
        Self {
            field: field.into(),
            lowercase,
        }
    }
}

impl<T: Record> MultiIndexer<T> for StringSliceFieldIndex {
    fn from_object(&self, obj: &T) -> Result<Option<Vec<Vec<u8>>>> {
        let items = match lookup_field(obj, &self.field)? {
            FieldValue::StrList(items) => items,
            other => return Err(unsupported(&self.field, "StrList", &other)),
        };

        let mut keys = items
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| text_key(&self.field, s, self.lowercase))
            .collect::<Result<Vec<_>>>()?;
        keys.sort();
        keys.dedup();

        if keys.is_empty() {
            Ok(None)
        } else {
            Ok(Some(keys))
        }
    }

    fn from_args(&self, args: &[Arg]) -> Result<Vec<u8>> {
        match single_arg(args)? {
            Arg::Str(s) => text_key(&self.field, s, self.lowercase),
            other => Err(arg_mismatch(0, "Str", other)),
        }
    }
}
