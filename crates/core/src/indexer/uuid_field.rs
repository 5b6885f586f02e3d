use super::{arg_mismatch, lookup_field, single_arg, unsupported, SingleIndexer};
use crate::error::{Error, Result};
use crate::value::{Arg, FieldValue, Record};
use ::uuid::Uuid;

/// Length of the canonical hyphenated form, e.g.
/// `01234567-89ab-cdef-0123-456789abcdef`.
const CANONICAL_LEN: usize = 36;
const HYPHEN_POSITIONS: [usize; 4] = [8, 13, 18, 23];

/// Index over a UUID field.
///
/// The field may hold the canonical 36-character text form or the raw
/// 16 bytes; both normalize to the same 16-byte key, and lookups accept
/// either form as well. Empty text means "not present".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UuidFieldIndex {
    /// Field to read from the record
    pub field: String,
}

impl UuidFieldIndex {
    /// Create a new UUID indexer
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

/// Parse the canonical hyphenated text form into raw bytes.
///
/// Only the 36-character `8-4-4-4-12` layout is accepted; simple, braced
/// and URN forms are rejected. Never panics on bad input.
pub fn parse_uuid(s: &str) -> Result<[u8; 16]> {
    if s.len() != CANONICAL_LEN {
        return Err(Error::MalformedUuid(format!(
            "expected {} characters, got {}",
            CANONICAL_LEN,
            s.len()
        )));
    }
    let bytes = s.as_bytes();
    if HYPHEN_POSITIONS.iter().any(|&pos| bytes[pos] != b'-') {
        return Err(Error::MalformedUuid(format!("'{}' is not hyphenated", s)));
    }
    Uuid::try_parse(s)
        .map(|u| *u.as_bytes())
        .map_err(|e| Error::MalformedUuid(format!("'{}': {}", s, e)))
}

/// Format raw bytes as canonical lower-case hyphenated text.
pub fn format_uuid(bytes: &[u8; 16]) -> String {
    Uuid::from_bytes(*bytes).hyphenated().to_string()
}

fn raw_uuid(bytes: &[u8]) -> Result<Vec<u8>> {
    if bytes.len() != 16 {
        return Err(Error::MalformedUuid(format!(
            "expected 16 raw bytes, got {}",
            bytes.len()
        )));
    }
    Ok(bytes.to_vec())
}

/// Decode a partial UUID (hyphens ignored) into prefix bytes. A trailing
/// odd hex digit is dropped.
fn parse_uuid_prefix(s: &str) -> Result<Vec<u8>> {
    let hex: Vec<u8> = s.bytes().filter(|&b| b != b'-').collect();
    if hex.len() > 32 {
        return Err(Error::MalformedUuid(format!("prefix '{}' is too long", s)));
    }
    let even = hex.len() - hex.len() % 2;
    hex[..even]
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|digits| u8::from_str_radix(digits, 16).ok())
                .ok_or_else(|| Error::MalformedUuid(format!("prefix '{}' is not hex", s)))
        })
        .collect()
}

impl<T: Record> SingleIndexer<T> for UuidFieldIndex {
    fn from_object(&self, obj: &T) -> Result<Option<Vec<u8>>> {
        match lookup_field(obj, &self.field)? {
            FieldValue::Str("") => Ok(None),
            FieldValue::Str(s) => parse_uuid(s).map(|b| Some(b.to_vec())),
            FieldValue::Bytes(b) => raw_uuid(b).map(Some),
            other => Err(unsupported(&self.field, "Str or Bytes", &other)),
        }
    }

    fn from_args(&self, args: &[Arg]) -> Result<Vec<u8>> {
        match single_arg(args)? {
            Arg::Str(s) => parse_uuid(s).map(|b| b.to_vec()),
            Arg::Bytes(b) => raw_uuid(b),
            other => Err(arg_mismatch(0, "Str or Bytes", other)),
        }
    }

    fn prefix_from_args(&self, args: &[Arg]) -> Result<Vec<u8>> {
        match single_arg(args)? {
            Arg::Str(s) => parse_uuid_prefix(s),
            Arg::Bytes(b) if b.len() <= 16 => Ok(b.clone()),
            Arg::Bytes(b) => raw_uuid(b),
            other => Err(arg_mismatch(0, "Str or Bytes", other)),
        }
    }
}
