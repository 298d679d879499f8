//! Error type for table container operations.

use cloudtable_core::{CodecError, StoreError};

/// Container-level failures.
///
/// Absence is never an error here: point lookups and removals return
/// `Ok(None)` for a missing cell.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// Rejected before any service call
    #[error("invalid {component}: {reason}")]
    InvalidArgument {
        /// Which argument was rejected
        component: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// A stored key or value does not decode into its domain type.
    ///
    /// Indicates data written by something other than this adapter, or a
    /// table opened with the wrong key/value types.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Any service failure other than not-found
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TableError {
    /// True for errors raised before reaching the service.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }
}

/// Result type alias for table container operations
pub type TableResult<T> = Result<T, TableError>;
