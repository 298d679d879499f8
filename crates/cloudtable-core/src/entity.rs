//! The service's native record and its naming rules.

use std::fmt;

use crate::config::Config;
use crate::error::{StoreError, StoreResult};

/// Shortest table name the service accepts
pub const MIN_TABLE_NAME_LEN: usize = 3;

/// Longest table name the service accepts
pub const MAX_TABLE_NAME_LEN: usize = 63;

/// One stored record: a two-part primary key plus an opaque payload.
///
/// (partition key, row key) identifies at most one entity per table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entity {
    /// First half of the primary key
    pub partition_key: String,
    /// Second half of the primary key
    pub row_key: String,
    /// Payload property
    pub value: String,
}

impl Entity {
    /// Create an entity from its three properties.
    pub fn new(
        partition_key: impl Into<String>,
        row_key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            value: value.into(),
        }
    }

    /// Check key characters and component sizes against `config`.
    pub fn validate(&self, config: &Config) -> StoreResult<()> {
        validate_key("partition key", &self.partition_key, config)?;
        validate_key("row key", &self.row_key, config)?;
        if self.value.len() > config.max_value_size {
            return Err(StoreError::OversizedEntry {
                entry_size: self.value.len() as u64,
                max_size: config.max_value_size as u64,
                component: "value",
            });
        }
        Ok(())
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.partition_key, self.row_key)
    }
}

/// Validate one key property.
///
/// Keys may not contain `/`, `\`, `#`, `?` or control characters.
pub fn validate_key(component: &'static str, key: &str, config: &Config) -> StoreResult<()> {
    if key.len() > config.max_key_size {
        return Err(StoreError::OversizedEntry {
            entry_size: key.len() as u64,
            max_size: config.max_key_size as u64,
            component,
        });
    }
    if let Some(c) = key
        .chars()
        .find(|c| matches!(c, '/' | '\\' | '#' | '?') || c.is_control())
    {
        return Err(StoreError::InvalidKey {
            component,
            key: key.to_string(),
            reason: if c.is_control() { "control character" } else { "reserved character" },
        });
    }
    Ok(())
}

/// Validate a table name: ASCII alphanumeric, starting with a letter, 3 to 63
/// characters long.
pub fn validate_table_name(name: &str) -> StoreResult<()> {
    let invalid = |reason| StoreError::InvalidTableName { name: name.to_string(), reason };
    if name.len() < MIN_TABLE_NAME_LEN || name.len() > MAX_TABLE_NAME_LEN {
        return Err(invalid("length must be between 3 and 63"));
    }
    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return Err(invalid("must start with a letter"));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid("must be alphanumeric"));
    }
    Ok(())
}
