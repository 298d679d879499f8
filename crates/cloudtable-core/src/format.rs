//! Binary format of journal records
//!
//! Every record is a 16-byte header followed by its payload:
//!
//! ```text
//! header:  magic "CTBL" (4) | payload length u32 LE | CRC32C u32 LE | op u8 | reserved (3)
//! payload: table_len u8 | pk_len u16 LE | rk_len u16 LE | value_len u32 LE | table | pk | rk | value
//! ```
//!
//! The CRC32C covers the length field, the op and reserved bytes, then the
//! payload: everything after the magic except the checksum itself.
//!
//! Table-level records (`CreateTable`, `DropTable`) carry empty keys and value.

use std::path::PathBuf;

use crate::entity::Entity;
use crate::error::{StoreError, StoreResult};

/// Magic bytes opening every journal record
pub const MAGIC_ARRAY: [u8; 4] = *b"CTBL";

/// Header size in bytes
pub const HEADER_SIZE: usize = 16;

/// Fixed-width length prefix inside the payload
const LENGTHS_SIZE: usize = 1 + 2 + 2 + 4;

/// Journaled operation types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Operation {
    /// Provision a table
    CreateTable = 1,
    /// Drop a table with all its entities
    DropTable = 2,
    /// Insert or replace an entity
    Upsert = 3,
    /// Delete an entity
    Delete = 4,
}

impl TryFrom<u8> for Operation {
    type Error = u8;

    fn try_from(raw: u8) -> Result<Self, u8> {
        match raw {
            1 => Ok(Operation::CreateTable),
            2 => Ok(Operation::DropTable),
            3 => Ok(Operation::Upsert),
            4 => Ok(Operation::Delete),
            other => Err(other),
        }
    }
}

/// A decoded journal record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// What happened
    pub operation: Operation,
    /// Table the operation applies to
    pub table: String,
    /// Affected entity; keys only for `Delete`, empty for table operations
    pub entity: Entity,
}

impl Record {
    /// Record for a table-level operation.
    pub fn table(operation: Operation, table: &str) -> Self {
        Self { operation, table: table.to_string(), entity: Entity::new("", "", "") }
    }

    /// Record for an entity-level operation.
    pub fn entity(operation: Operation, table: &str, entity: Entity) -> Self {
        Self { operation, table: table.to_string(), entity }
    }
}

/// Checksum of a record's length field, op byte, reserved bytes and payload.
pub(crate) fn record_checksum(header: &[u8], payload: &[u8]) -> u32 {
    let crc = crc32c::crc32c(&header[4..8]);
    let crc = crc32c::crc32c_append(crc, &header[12..HEADER_SIZE]);
    crc32c::crc32c_append(crc, payload)
}

fn corrupted(offset: usize, reason: impl Into<String>) -> StoreError {
    StoreError::JournalCorrupted {
        path: PathBuf::from("<buffer>"),
        offset: offset as u64,
        reason: reason.into(),
    }
}

fn oversized(component: &'static str, size: usize, max: usize) -> StoreError {
    StoreError::OversizedEntry { entry_size: size as u64, max_size: max as u64, component }
}

/// Serialize a record into header + payload bytes.
pub fn serialize_record(record: &Record) -> StoreResult<Vec<u8>> {
    let Record { operation, table, entity } = record;
    // Field widths bound what can be framed at all; service limits are stricter
    if table.len() > u8::MAX as usize {
        return Err(oversized("table name", table.len(), u8::MAX as usize));
    }
    if entity.partition_key.len() > u16::MAX as usize {
        return Err(oversized("partition key", entity.partition_key.len(), u16::MAX as usize));
    }
    if entity.row_key.len() > u16::MAX as usize {
        return Err(oversized("row key", entity.row_key.len(), u16::MAX as usize));
    }
    if entity.value.len() > u32::MAX as usize {
        return Err(oversized("value", entity.value.len(), u32::MAX as usize));
    }

    let payload_size = LENGTHS_SIZE
        + table.len()
        + entity.partition_key.len()
        + entity.row_key.len()
        + entity.value.len();

    let mut buffer = Vec::with_capacity(HEADER_SIZE + payload_size);
    buffer.extend_from_slice(&MAGIC_ARRAY);
    buffer.extend_from_slice(&(payload_size as u32).to_le_bytes());
    buffer.extend_from_slice(&[0; 4]); // checksum, patched below
    buffer.push(*operation as u8);
    buffer.extend_from_slice(&[0; 3]);

    buffer.push(table.len() as u8);
    buffer.extend_from_slice(&(entity.partition_key.len() as u16).to_le_bytes());
    buffer.extend_from_slice(&(entity.row_key.len() as u16).to_le_bytes());
    buffer.extend_from_slice(&(entity.value.len() as u32).to_le_bytes());
    buffer.extend_from_slice(table.as_bytes());
    buffer.extend_from_slice(entity.partition_key.as_bytes());
    buffer.extend_from_slice(entity.row_key.as_bytes());
    buffer.extend_from_slice(entity.value.as_bytes());

    let checksum = record_checksum(&buffer[..HEADER_SIZE], &buffer[HEADER_SIZE..]);
    buffer[8..12].copy_from_slice(&checksum.to_le_bytes());
    Ok(buffer)
}

/// Payload length announced by the header at the start of `data`.
pub fn payload_length(data: &[u8]) -> Option<usize> {
    let bytes: [u8; 4] = data.get(4..8)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes) as usize)
}

/// Deserialize one record from the start of `data`.
pub fn deserialize_record(data: &[u8]) -> StoreResult<Record> {
    if data.len() < HEADER_SIZE {
        return Err(corrupted(
            0,
            format!("record too short: {} bytes, need at least {}", data.len(), HEADER_SIZE),
        ));
    }

    let mut magic = [0u8; 4];
    magic.copy_from_slice(&data[0..4]);
    if magic != MAGIC_ARRAY {
        return Err(StoreError::NoMagicFound {
            path: PathBuf::from("<buffer>"),
            offset: 0,
            found_bytes: magic,
        });
    }

    let length = payload_length(data).unwrap_or_default();
    let expected = u32::from_le_bytes([data[8], data[9], data[10], data[11]]);
    let raw_op = data[12];

    let payload = match data.get(HEADER_SIZE..HEADER_SIZE + length) {
        Some(payload) => payload,
        None => {
            return Err(StoreError::TornWrite {
                path: PathBuf::from("<buffer>"),
                expected_size: length as u32,
                available_bytes: (data.len() - HEADER_SIZE) as u64,
                offset: HEADER_SIZE as u64,
            })
        }
    };

    let actual = record_checksum(&data[..HEADER_SIZE], payload);
    if actual != expected {
        return Err(StoreError::ChecksumMismatch {
            path: PathBuf::from("<buffer>"),
            expected,
            actual,
            offset: HEADER_SIZE as u64,
        });
    }

    let operation = Operation::try_from(raw_op)
        .map_err(|other| corrupted(12, format!("invalid operation type: {other}")))?;

    if payload.len() < LENGTHS_SIZE {
        return Err(corrupted(HEADER_SIZE, "payload too short for length fields"));
    }
    let table_len = payload[0] as usize;
    let pk_len = u16::from_le_bytes([payload[1], payload[2]]) as usize;
    let rk_len = u16::from_le_bytes([payload[3], payload[4]]) as usize;
    let value_len = u32::from_le_bytes([payload[5], payload[6], payload[7], payload[8]]) as usize;

    let mut fields = Vec::with_capacity(4);
    let mut start = LENGTHS_SIZE;
    for len in [table_len, pk_len, rk_len, value_len] {
        let bytes = payload.get(start..start + len).ok_or_else(|| {
            corrupted(HEADER_SIZE + start, format!("field of {len} bytes overruns payload"))
        })?;
        let text = std::str::from_utf8(bytes)
            .map_err(|e| corrupted(HEADER_SIZE + start, format!("field is not UTF-8: {e}")))?;
        fields.push(text.to_string());
        start += len;
    }

    let value = fields.pop().unwrap_or_default();
    let row_key = fields.pop().unwrap_or_default();
    let partition_key = fields.pop().unwrap_or_default();
    let table = fields.pop().unwrap_or_default();

    Ok(Record { operation, table, entity: Entity { partition_key, row_key, value } })
}
