//! In-process table service.
//!
//! `LocalTableService` implements [`TableClient`] over RAM hash tables,
//! optionally journaled to disk so tables survive a restart. It behaves the
//! way the managed service does at the interface: tables must be created
//! before use, point operations report not-found, scans are unordered.
//!
//! **Read path**: shared read lock, point lookups in partition → row maps
//! **Write path**: exclusive lock, validate, journal append, then RAM update
//! **Scan**: matching entities are copied out under the read lock and
//! streamed after it is released, so a slow consumer never blocks writers

use std::path::{Path, PathBuf};

use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};
use tracing::info;

use crate::client::{EntityStream, TableClient, Upserted};
use crate::config::Config;
use crate::entity::{validate_key, validate_table_name, Entity};
use crate::error::{StoreError, StoreResult};
use crate::filter::Filter;
use crate::format::{Operation, Record};
use crate::journal::{JournalReader, JournalWriter};

/// row key → value
type Rows = HashMap<String, String>;

/// partition key → rows
type Partitions = HashMap<String, Rows>;

/// table name → partitions
type Tables = HashMap<String, Partitions>;

/// Table service held in process memory.
///
/// All methods take `&self`; share it behind an `Arc`.
pub struct LocalTableService {
    tables: RwLock<Tables>,
    /// `None` for a purely in-memory service
    journal: Option<Mutex<JournalWriter>>,
    path: Option<PathBuf>,
    config: Config,
}

impl LocalTableService {
    /// A service that keeps everything in memory.
    pub fn in_memory(config: Config) -> StoreResult<Self> {
        config.validate()?;
        Ok(Self { tables: RwLock::new(Tables::new()), journal: None, path: None, config })
    }

    /// Open or create a journaled service in `path`, replaying its journal.
    pub fn open<P: AsRef<Path>>(path: P, config: Config) -> StoreResult<Self> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();
        let journal_dir = path.join("journal");

        let mut tables = Tables::new();
        let records = JournalReader::new(&journal_dir).recover_records();
        let records = match records {
            Ok(records) => records,
            Err(StoreError::Io { kind: std::io::ErrorKind::NotFound, .. }) => Vec::new(),
            Err(e) => return Err(e),
        };
        for record in &records {
            apply(&mut tables, record);
        }
        if !records.is_empty() {
            info!(
                records = records.len(),
                tables = tables.len(),
                path = %journal_dir.display(),
                "replayed table journal"
            );
        }

        let writer = JournalWriter::open(&journal_dir, config.journal_rotation_size_bytes, config.sync_mode)?;
        Ok(Self {
            tables: RwLock::new(tables),
            journal: Some(Mutex::new(writer)),
            path: Some(path),
            config,
        })
    }

    /// Service configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Data directory, if journaled.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Make every journaled write durable.
    ///
    /// Only needed under [`SyncMode::Fast`](crate::SyncMode::Fast).
    pub fn sync(&self) -> StoreResult<()> {
        match &self.journal {
            Some(journal) => journal.lock().sync(),
            None => Ok(()),
        }
    }

    /// Number of entities across all tables.
    pub fn entity_count(&self) -> usize {
        let tables = self.tables.read();
        tables.values().flat_map(|p| p.values()).map(|rows| rows.len()).sum()
    }

    /// Journal then apply, returning the replaced value. Callers hold the
    /// tables write lock and have already validated the record against the
    /// current state.
    fn commit(&self, tables: &mut Tables, record: &Record) -> StoreResult<Option<String>> {
        if let Some(journal) = &self.journal {
            journal.lock().append(record)?;
        }
        Ok(apply(tables, record))
    }
}

/// Apply a record to the in-memory tables.
///
/// Replay tolerates records that no longer fit (an upsert into a dropped
/// table is ignored), so a partially recovered journal still loads.
fn apply(tables: &mut Tables, record: &Record) -> Option<String> {
    let entity = &record.entity;
    match record.operation {
        Operation::CreateTable => {
            tables.entry(record.table.clone()).or_default();
            None
        }
        Operation::DropTable => {
            tables.remove(&record.table);
            None
        }
        Operation::Upsert => tables
            .get_mut(&record.table)?
            .entry(entity.partition_key.clone())
            .or_default()
            .insert(entity.row_key.clone(), entity.value.clone()),
        Operation::Delete => {
            let partitions = tables.get_mut(&record.table)?;
            let rows = partitions.get_mut(&entity.partition_key)?;
            let previous = rows.remove(&entity.row_key);
            if rows.is_empty() {
                partitions.remove(&entity.partition_key);
            }
            previous
        }
    }
}

fn missing_table(table: &str) -> StoreError {
    StoreError::TableNotFound { table: table.to_string() }
}

impl TableClient for LocalTableService {
    fn create_table(&self, table: &str) -> StoreResult<()> {
        validate_table_name(table)?;
        let mut tables = self.tables.write();
        if tables.contains_key(table) {
            return Ok(());
        }
        self.commit(&mut tables, &Record::table(Operation::CreateTable, table))?;
        Ok(())
    }

    fn drop_table(&self, table: &str) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if !tables.contains_key(table) {
            return Err(missing_table(table));
        }
        self.commit(&mut tables, &Record::table(Operation::DropTable, table))?;
        Ok(())
    }

    fn table_exists(&self, table: &str) -> StoreResult<bool> {
        Ok(self.tables.read().contains_key(table))
    }

    fn list_tables(&self) -> StoreResult<Vec<String>> {
        Ok(self.tables.read().keys().cloned().collect())
    }

    fn retrieve(&self, table: &str, partition_key: &str, row_key: &str) -> StoreResult<Entity> {
        let tables = self.tables.read();
        let partitions = tables.get(table).ok_or_else(|| missing_table(table))?;
        partitions
            .get(partition_key)
            .and_then(|rows| rows.get(row_key))
            .map(|value| Entity::new(partition_key, row_key, value.as_str()))
            .ok_or_else(|| StoreError::not_found(table, partition_key, row_key))
    }

    fn upsert(&self, table: &str, entity: Entity) -> StoreResult<Upserted> {
        entity.validate(&self.config)?;
        let mut tables = self.tables.write();
        if !tables.contains_key(table) {
            return Err(missing_table(table));
        }
        let record = Record::entity(Operation::Upsert, table, entity);
        let previous = self.commit(&mut tables, &record)?;
        let entity = record.entity;
        Ok(Upserted {
            previous: previous.map(|value| Entity::new(entity.partition_key.as_str(), entity.row_key.as_str(), value)),
            entity,
        })
    }

    fn delete(&self, table: &str, partition_key: &str, row_key: &str) -> StoreResult<()> {
        validate_key("partition key", partition_key, &self.config)?;
        validate_key("row key", row_key, &self.config)?;
        let mut tables = self.tables.write();
        let partitions = tables.get(table).ok_or_else(|| missing_table(table))?;
        let exists = partitions.get(partition_key).is_some_and(|rows| rows.contains_key(row_key));
        if !exists {
            return Err(StoreError::not_found(table, partition_key, row_key));
        }
        let record = Record::entity(Operation::Delete, table, Entity::new(partition_key, row_key, ""));
        self.commit(&mut tables, &record)?;
        Ok(())
    }

    fn scan(&self, table: &str, filter: Option<&Filter>) -> StoreResult<EntityStream<'_>> {
        let tables = self.tables.read();
        let partitions = tables.get(table).ok_or_else(|| missing_table(table))?;

        let mut matched = Vec::new();
        let mut collect = |partition_key: &String, rows: &Rows| {
            for (row_key, value) in rows {
                let entity = Entity::new(partition_key.as_str(), row_key.as_str(), value.as_str());
                if filter.map_or(true, |f| f.matches(&entity)) {
                    matched.push(entity);
                }
            }
        };
        match filter.and_then(Filter::partition_key) {
            Some(pk) => {
                if let Some((pk, rows)) = partitions.get_key_value(pk) {
                    collect(pk, rows);
                }
            }
            None => partitions.iter().for_each(|(pk, rows)| collect(pk, rows)),
        }
        drop(tables);

        Ok(Box::new(matched.into_iter().map(Ok)))
    }
}

impl std::fmt::Debug for LocalTableService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTableService")
            .field("path", &self.path)
            .field("tables", &self.tables.read().len())
            .field("journaled", &self.journal.is_some())
            .finish()
    }
}
