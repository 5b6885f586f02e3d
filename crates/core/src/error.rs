//! Error types for memdb
//!
//! Every fallible operation in the workspace returns [`Result`]. Indexer
//! errors surface to the caller of the insert, delete or query that triggered
//! them; nothing is silently skipped and nothing is retried internally.
//!
//! | Kind | Raised by | Recoverable |
//! |------|-----------|-------------|
//! | FieldNotFound / UnsupportedFieldType | indexer `from_object` | no (schema/record mismatch) |
//! | MalformedUuid | UUID indexer | no (bad input) |
//! | NulInText | string indexers | no (bad input) |
//! | ArgCountMismatch / ArgTypeMismatch | indexer `from_args` | no (bad query) |
//! | DuplicateUniqueKey | write transaction insert | yes |
//! | SchemaValidationFailed | store construction | no |
//! | WriteAcquisitionTimeout | `begin_write` | yes |
//! | TransactionAlreadyFinalized | any op after commit/abort/close | no |

use std::time::Duration;
use thiserror::Error;

/// All memdb errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The record does not expose the requested field
    #[error("field '{field}' not found on record")]
    FieldNotFound {
        /// Field name the indexer asked for
        field: String,
    },

    /// The field exists but holds a type this indexer cannot use
    #[error("field '{field}' has unsupported type: expected {expected}, got {actual}")]
    UnsupportedFieldType {
        /// Field name
        field: String,
        /// What the indexer accepts
        expected: &'static str,
        /// What the record returned
        actual: &'static str,
    },

    /// UUID text or raw bytes could not be decoded
    #[error("malformed uuid: {0}")]
    MalformedUuid(String),

    /// Text bound for an index key contains a NUL byte, which separates
    /// a non-unique value from the primary key appended to it
    #[error("text for field '{field}' contains a NUL byte")]
    NulInText {
        /// Field the text belongs to
        field: String,
    },

    /// Wrong number of query arguments
    #[error("wrong number of arguments: expected {expected}, got {actual}")]
    ArgCountMismatch {
        /// Number the indexer requires
        expected: usize,
        /// Number supplied
        actual: usize,
    },

    /// Query argument has the wrong runtime type
    #[error("argument {position} has wrong type: expected {expected}, got {actual}")]
    ArgTypeMismatch {
        /// Zero-based position of the offending argument
        position: usize,
        /// What the indexer accepts
        expected: &'static str,
        /// What the caller passed
        actual: &'static str,
    },

    /// A unique index already holds this key for another object
    #[error("duplicate key in unique index '{index}' of table '{table}'")]
    DuplicateUniqueKey {
        /// Table name
        table: String,
        /// Index name
        index: String,
    },

    /// An index without `allow_missing` produced no key for the object
    #[error("missing value for index '{index}' of table '{table}'")]
    MissingIndexValue {
        /// Table name
        table: String,
        /// Index name
        index: String,
    },

    /// Schema rejected at construction time
    #[error("schema validation failed: {0}")]
    SchemaValidationFailed(String),

    /// Another writer held the write lock for longer than the caller allowed
    #[error("timed out after {0:?} waiting for write access")]
    WriteAcquisitionTimeout(Duration),

    /// Operation on a transaction that was already committed, aborted or closed
    #[error("transaction already finalized ({state})")]
    TransactionAlreadyFinalized {
        /// Terminal state the transaction is in
        state: &'static str,
    },

    /// Table is not part of the schema
    #[error("unknown table '{0}'")]
    UnknownTable(String),

    /// Index is not part of the table's schema
    #[error("unknown index '{index}' on table '{table}'")]
    UnknownIndex {
        /// Table name
        table: String,
        /// Index name
        index: String,
    },

    /// Object to delete is not in the table
    #[error("not found: {0}")]
    NotFound(String),

    /// Configuration could not be parsed or is inconsistent
    #[error("config error: {0}")]
    Config(String),
}

/// Result type for memdb operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is retryable.
    ///
    /// A write-acquisition timeout may succeed once the current writer
    /// finishes; a duplicate key may succeed after the conflicting object
    /// is removed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::WriteAcquisitionTimeout(_) | Error::DuplicateUniqueKey { .. }
        )
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Check if this error came from an indexer.
    pub fn is_indexer_error(&self) -> bool {
        matches!(
            self,
            Error::FieldNotFound { .. }
                | Error::UnsupportedFieldType { .. }
                | Error::MalformedUuid(_)
                | Error::NulInText { .. }
                | Error::ArgCountMismatch { .. }
                | Error::ArgTypeMismatch { .. }
        )
    }
}
