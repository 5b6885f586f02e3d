//! Record access and query argument types
//!
//! The engine never inspects objects directly. A stored type implements
//! [`Record`] and hands out [`FieldValue`]s by field name; indexers turn
//! those into byte keys. Queries pass owned [`Arg`]s that the same
//! indexers turn into lookup keys.
//!
//! ## Typing Rules
//!
//! - No implicit coercions: `Str` and `Bytes` are distinct
//! - `Int` and `Uint` are distinct; indexers decide what they accept
//! - A field that does not exist is `None`, not an empty value

use uuid::Uuid;

/// An object that can be stored in a memdb table.
///
/// `field` is the statically typed accessor indexers use to extract values.
/// Returning `None` means the record has no field with that name, which
/// indexers report as [`crate::Error::FieldNotFound`].
///
/// # Example
///
/// ```
/// use memdb_core::{FieldValue, Record};
///
/// struct Node {
///     id: String,
///     name: String,
/// }
///
/// impl Record for Node {
///     fn field(&self, name: &str) -> Option<FieldValue<'_>> {
///         match name {
///             "ID" => Some(FieldValue::Str(&self.id)),
///             "Name" => Some(FieldValue::Str(&self.name)),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait Record: Send + Sync + 'static {
    /// Look up a field by name
    fn field(&self, name: &str) -> Option<FieldValue<'_>>;
}

/// Borrowed view of a single record field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    /// UTF-8 text
    Str(&'a str),
    /// Raw bytes
    Bytes(&'a [u8]),
    /// Signed integer
    Int(i64),
    /// Unsigned integer
    Uint(u64),
    /// Boolean
    Bool(bool),
    /// List of strings (multi-valued indexes)
    StrList(&'a [String]),
}

impl FieldValue<'_> {
    /// Returns the type name as a string (for error messages)
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Str(_) => "Str",
            FieldValue::Bytes(_) => "Bytes",
            FieldValue::Int(_) => "Int",
            FieldValue::Uint(_) => "Uint",
            FieldValue::Bool(_) => "Bool",
            FieldValue::StrList(_) => "StrList",
        }
    }
}

/// Owned query argument
///
/// Built with `From` conversions so call sites read naturally:
///
/// ```
/// use memdb_core::Arg;
///
/// let args: Vec<Arg> = vec!["my-node".into(), 42u64.into()];
/// assert_eq!(args[0].type_name(), "Str");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Arg {
    /// UTF-8 text
    Str(String),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Signed integer
    Int(i64),
    /// Unsigned integer
    Uint(u64),
    /// Boolean
    Bool(bool),
}

impl Arg {
    /// Returns the type name as a string (for error messages)
    pub fn type_name(&self) -> &'static str {
        match self {
            Arg::Str(_) => "Str",
            Arg::Bytes(_) => "Bytes",
            Arg::Int(_) => "Int",
            Arg::Uint(_) => "Uint",
            Arg::Bool(_) => "Bool",
        }
    }

    /// Try to get as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as bytes slice
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Arg::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Str(s.to_string())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::Str(s)
    }
}

impl From<&String> for Arg {
    fn from(s: &String) -> Self {
        Arg::Str(s.clone())
    }
}

impl From<&[u8]> for Arg {
    fn from(b: &[u8]) -> Self {
        Arg::Bytes(b.to_vec())
    }
}

impl From<Vec<u8>> for Arg {
    fn from(b: Vec<u8>) -> Self {
        Arg::Bytes(b)
    }
}

impl From<[u8; 16]> for Arg {
    fn from(b: [u8; 16]) -> Self {
        Arg::Bytes(b.to_vec())
    }
}

impl From<Uuid> for Arg {
    fn from(u: Uuid) -> Self {
        Arg::Bytes(u.as_bytes().to_vec())
    }
}

impl From<i64> for Arg {
    fn from(i: i64) -> Self {
        Arg::Int(i)
    }
}

impl From<i32> for Arg {
    fn from(i: i32) -> Self {
        Arg::Int(i64::from(i))
    }
}

impl From<u64> for Arg {
    fn from(u: u64) -> Self {
        Arg::Uint(u)
    }
}

impl From<u32> for Arg {
    fn from(u: u32) -> Self {
        Arg::Uint(u64::from(u))
    }
}

impl From<bool> for Arg {
    fn from(b: bool) -> Self {
        Arg::Bool(b)
    }
}
