//! Backup and restore of whole tables
//!
//! A backup copies every cell of a source table into a fresh snapshot table
//! named `{backup name}{timestamp}`. Progress is tracked in a metadata table,
//! itself a plain [`RemoteTable`]: row key = backup name, column key =
//! timestamp, value = [`BackupStatus`].
//!
//! Backup lifecycle:
//! 1. Record `IN_PROGRESS`
//! 2. Create the snapshot table and copy every cell into it
//! 3. Record `COMPLETED`
//!
//! A failure during step 2 leaves the `IN_PROGRESS` row behind, which is how
//! [`BackupManager::incomplete_backups`] finds it.
//!
//! Deletion marks the row `BEING_DELETED` before dropping the snapshot, so a
//! crash part way is finished by [`BackupManager::resume_deletions`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use cloudtable_core::entity::validate_table_name;
use cloudtable_core::{Codec, TableClient};
use tracing::{debug, info, warn};

use crate::error::{TableError, TableResult};
use crate::table::RemoteTable;

/// Default name of the metadata table
pub const DEFAULT_METADATA_TABLE: &str = "backups";

/// Timestamp layout used in metadata rows and snapshot table names
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Lifecycle state of one backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackupStatus {
    InProgress,
    Completed,
    BeingDeleted,
}

impl BackupStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BackupStatus::InProgress => "IN_PROGRESS",
            BackupStatus::Completed => "COMPLETED",
            BackupStatus::BeingDeleted => "BEING_DELETED",
        }
    }
}

impl fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackupStatus {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN_PROGRESS" => Ok(BackupStatus::InProgress),
            "COMPLETED" => Ok(BackupStatus::Completed),
            "BEING_DELETED" => Ok(BackupStatus::BeingDeleted),
            other => Err(TableError::InvalidArgument {
                component: "backup status",
                reason: format!("unknown status {other:?}"),
            }),
        }
    }
}

/// One metadata row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    pub name: String,
    pub timestamp: String,
    pub status: BackupStatus,
}

impl BackupRecord {
    /// Name of the snapshot table holding this backup's cells.
    pub fn table_name(&self) -> String {
        format!("{}{}", self.name, self.timestamp)
    }
}

/// Creates, restores and deletes table snapshots.
pub struct BackupManager<S> {
    client: Arc<S>,
    metadata: RemoteTable<String, String, String, S>,
}

impl<S: TableClient> BackupManager<S> {
    /// Use the default metadata table.
    pub fn new(client: Arc<S>) -> Self {
        Self::with_metadata_table(client, DEFAULT_METADATA_TABLE)
    }

    pub fn with_metadata_table(client: Arc<S>, table: impl Into<String>) -> Self {
        let metadata = RemoteTable::new(table, Arc::clone(&client));
        Self { client, metadata }
    }

    /// Create the metadata table if needed.
    pub fn ensure_metadata_table(&self) -> TableResult<()> {
        self.metadata.ensure_table()
    }

    /// The metadata table itself.
    pub fn metadata(&self) -> &RemoteTable<String, String, String, S> {
        &self.metadata
    }

    fn record(&self, name: &str, timestamp: &str, status: BackupStatus) -> TableResult<()> {
        self.metadata.put(&name.to_string(), &timestamp.to_string(), &status.as_str().to_string())?;
        Ok(())
    }

    /// Current status of a backup, `None` if there is no such row.
    pub fn status(&self, name: &str, timestamp: &str) -> TableResult<Option<BackupStatus>> {
        self.metadata
            .get(&name.to_string(), &timestamp.to_string())?
            .map(|status| status.parse())
            .transpose()
    }

    /// Back up `source` under `name`, stamped with the current time.
    pub fn backup<R, C, V>(&self, source: &RemoteTable<R, C, V, S>, name: &str) -> TableResult<BackupRecord>
    where
        R: Codec,
        C: Codec,
        V: Codec,
    {
        self.backup_at(source, name, Utc::now())
    }

    /// Back up `source` under `name` with an explicit timestamp.
    pub fn backup_at<R, C, V>(
        &self,
        source: &RemoteTable<R, C, V, S>,
        name: &str,
        at: DateTime<Utc>,
    ) -> TableResult<BackupRecord>
    where
        R: Codec,
        C: Codec,
        V: Codec,
    {
        let mut record = BackupRecord {
            name: name.to_string(),
            timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
            status: BackupStatus::InProgress,
        };
        let table_name = record.table_name();
        validate_table_name(&table_name)?;

        self.record(&record.name, &record.timestamp, BackupStatus::InProgress)?;
        info!(source = %source.name(), snapshot = %table_name, "backup started");

        let snapshot: RemoteTable<R, C, V, S> = RemoteTable::new(table_name.as_str(), Arc::clone(&self.client));
        let copied = snapshot.ensure_table().and_then(|()| snapshot.put_all_from(source));
        if let Err(e) = copied {
            warn!(error = ?e, snapshot = %table_name, "backup failed, left in progress");
            return Err(e);
        }

        self.record(&record.name, &record.timestamp, BackupStatus::Completed)?;
        record.status = BackupStatus::Completed;
        info!(snapshot = %table_name, "backup completed");
        Ok(record)
    }

    /// Copy a completed snapshot's cells into `destination`, creating it if
    /// needed. Existing destination cells not in the snapshot are kept.
    pub fn restore<R, C, V>(&self, record: &BackupRecord, destination: &RemoteTable<R, C, V, S>) -> TableResult<()>
    where
        R: Codec,
        C: Codec,
        V: Codec,
    {
        let status = self.status(&record.name, &record.timestamp)?;
        if status != Some(BackupStatus::Completed) {
            return Err(TableError::InvalidArgument {
                component: "backup",
                reason: format!("{} is not completed (status {:?})", record.table_name(), status),
            });
        }
        let snapshot: RemoteTable<R, C, V, S> = RemoteTable::new(record.table_name(), Arc::clone(&self.client));
        destination.ensure_table()?;
        destination.put_all_from(&snapshot)?;
        info!(snapshot = %snapshot.name(), destination = %destination.name(), "restore completed");
        Ok(())
    }

    /// Drop a backup's snapshot table and forget it.
    pub fn delete_backup(&self, record: &BackupRecord) -> TableResult<()> {
        self.record(&record.name, &record.timestamp, BackupStatus::BeingDeleted)?;
        let table_name = record.table_name();
        match self.client.drop_table(&table_name) {
            Ok(()) => {}
            Err(cloudtable_core::StoreError::TableNotFound { .. }) => {
                debug!(snapshot = %table_name, "snapshot already dropped");
            }
            Err(e) => return Err(e.into()),
        }
        self.metadata.remove(&record.name, &record.timestamp)?;
        info!(snapshot = %table_name, "backup deleted");
        Ok(())
    }

    /// Every metadata row.
    pub fn list_backups(&self) -> TableResult<Vec<BackupRecord>> {
        let mut records = Vec::new();
        for cell in self.metadata.cell_set().iter()? {
            let cell = cell?;
            match cell.value.parse() {
                Ok(status) => records.push(BackupRecord { name: cell.row, timestamp: cell.column, status }),
                Err(e) => warn!(error = %e, name = %cell.row, "skipping metadata row"),
            }
        }
        Ok(records)
    }

    /// Rows for one backup name, oldest first.
    pub fn backups_named(&self, name: &str) -> TableResult<Vec<BackupRecord>> {
        let mut records = Vec::new();
        for (timestamp, status) in self.metadata.row(name.to_string()).to_vec()? {
            records.push(BackupRecord { name: name.to_string(), timestamp, status: status.parse()? });
        }
        records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(records)
    }

    /// Backups whose copy never finished.
    pub fn incomplete_backups(&self) -> TableResult<Vec<BackupRecord>> {
        Ok(self
            .list_backups()?
            .into_iter()
            .filter(|record| record.status == BackupStatus::InProgress)
            .collect())
    }

    /// Finish every deletion interrupted part way. Returns how many were
    /// finished.
    pub fn resume_deletions(&self) -> TableResult<usize> {
        let pending: Vec<_> = self
            .list_backups()?
            .into_iter()
            .filter(|record| record.status == BackupStatus::BeingDeleted)
            .collect();
        for record in &pending {
            self.delete_backup(record)?;
        }
        Ok(pending.len())
    }
}
