//! Error types for table service operations
//!
//! Every failure a [`TableClient`](crate::client::TableClient) can surface is a
//! [`StoreError`]. Absence of an entity is reported as
//! [`StoreError::NotFound`]; callers that treat absence as a valid outcome
//! check [`StoreError::is_not_found`] and convert it locally.

use std::path::PathBuf;

/// Table service error types with detailed context
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No entity with this (partition key, row key) exists in the table
    #[error("entity ({partition_key}, {row_key}) not found in table {table}")]
    NotFound {
        /// Table that was addressed
        table: String,
        /// Partition key of the missing entity
        partition_key: String,
        /// Row key of the missing entity
        row_key: String,
    },

    /// The addressed table has not been created
    #[error("table {table} does not exist")]
    TableNotFound {
        /// Name of the missing table
        table: String,
    },

    /// Table name does not satisfy the service naming rules
    #[error("invalid table name {name:?}: {reason}")]
    InvalidTableName {
        /// Offending name
        name: String,
        /// Which rule was violated
        reason: &'static str,
    },

    /// Key property contains characters the service refuses
    #[error("invalid {component} {key:?}: {reason}")]
    InvalidKey {
        /// `partition key` or `row key`
        component: &'static str,
        /// Offending key
        key: String,
        /// Which rule was violated
        reason: &'static str,
    },

    /// Entity component exceeds the configured maximum
    #[error("entity {component} too large: {entry_size} bytes exceeds limit of {max_size} bytes")]
    OversizedEntry {
        /// Size of the oversized component
        entry_size: u64,
        /// Maximum allowed size
        max_size: u64,
        /// Whether the table name, a key or the value is oversized
        component: &'static str,
    },

    /// I/O operation on the journal failed
    #[error("I/O error{}: {message} ({kind})", .path.as_ref().map(|p| format!(" in {}", p.display())).unwrap_or_default())]
    Io {
        /// The file path where the error occurred
        path: Option<PathBuf>,
        /// The underlying I/O error kind
        kind: std::io::ErrorKind,
        /// Human-readable description
        message: String,
    },

    /// Journal record is structurally invalid
    #[error("journal corrupted in {} at offset {offset}: {reason}", .path.display())]
    JournalCorrupted {
        /// Journal file (or `<buffer>` while decoding)
        path: PathBuf,
        /// Byte offset where corruption was detected
        offset: u64,
        /// Description of the corruption
        reason: String,
    },

    /// Checksum verification failed
    #[error("checksum mismatch in {} at offset {offset}: expected 0x{expected:08x}, got 0x{actual:08x}", .path.display())]
    ChecksumMismatch {
        /// File where checksum failed
        path: PathBuf,
        /// Expected checksum value
        expected: u32,
        /// Actual checksum computed
        actual: u32,
        /// Byte offset of the corrupted data
        offset: u64,
    },

    /// Torn write detected (partial record at end of file)
    #[error("torn write in {} at offset {offset}: expected {expected_size} bytes, only {available_bytes} available", .path.display())]
    TornWrite {
        /// File with torn write
        path: PathBuf,
        /// Expected record size
        expected_size: u32,
        /// Actual bytes available
        available_bytes: u64,
        /// Offset where torn write begins
        offset: u64,
    },

    /// Magic bytes not found at expected location
    #[error("magic bytes not found in {} at offset {offset}: found {found_bytes:02x?}", .path.display())]
    NoMagicFound {
        /// File being read
        path: PathBuf,
        /// Offset where magic was expected
        offset: u64,
        /// Bytes actually found
        found_bytes: [u8; 4],
    },

    /// Configuration rejected by [`Config::validate`](crate::Config::validate)
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl StoreError {
    /// Build a [`StoreError::NotFound`] for the given address.
    pub fn not_found(table: &str, partition_key: &str, row_key: &str) -> Self {
        Self::NotFound {
            table: table.to_string(),
            partition_key: partition_key.to_string(),
            row_key: row_key.to_string(),
        }
    }

    /// True for the service's not-found outcome.
    ///
    /// Only entity absence counts; a missing table is a real failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Convert std::io::Error to StoreError::Io
impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io {
            path: None,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for table service operations
pub type StoreResult<T> = Result<T, StoreError>;
