//! Configuration for the table service and the adapters built on it
//!
//! Provides presets for the two journal sync modes and validation of
//! hand-built configurations.

use crate::error::{StoreError, StoreResult};

/// When journal appends reach persistent storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Every append is followed by a durable sync
    Durable,
    /// Appends land in the OS page cache; sync happens on rotation or
    /// explicit [`LocalTableService::sync`](crate::LocalTableService::sync)
    Fast,
}

/// Table service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum encoded key size in bytes (partition key and row key each)
    pub max_key_size: usize,
    /// Maximum encoded value size in bytes
    pub max_value_size: usize,
    /// Journal file rotation threshold (bytes)
    pub journal_rotation_size_bytes: u64,
    /// Journal sync policy
    pub sync_mode: SyncMode,
}

impl Config {
    /// Durable: fsync per write. Matches the service's own key and
    /// property limits (1 KiB keys, 64 KiB values).
    pub fn durable() -> Self {
        Self {
            max_key_size: 1024,
            max_value_size: 64 * 1024,
            journal_rotation_size_bytes: 100 * 1024 * 1024,
            sync_mode: SyncMode::Durable,
        }
    }

    /// Fast: same limits, no per-write sync
    pub fn fast() -> Self {
        Self {
            journal_rotation_size_bytes: 50 * 1024 * 1024,
            sync_mode: SyncMode::Fast,
            ..Self::durable()
        }
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> StoreResult<()> {
        if self.max_key_size == 0 || self.max_key_size > 1024 {
            return Err(StoreError::InvalidConfig("max_key_size must be in [1, 1024]".into()));
        }
        if self.max_value_size == 0 || self.max_value_size > 1024 * 1024 {
            return Err(StoreError::InvalidConfig("max_value_size must be in [1, 1MB]".into()));
        }
        if self.journal_rotation_size_bytes < 1024 * 1024 {
            return Err(StoreError::InvalidConfig(
                "journal_rotation_size_bytes must be >= 1MB".into(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self { Self::durable() }
}
