//! Integration tests: the table container over the local table service.
//!
//! These tests exercise the full RemoteTable -> TableClient -> journal
//! pipeline, plus clients that misbehave the way a shared remote service
//! can.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

use cloudtable_adapter::{BackupManager, BackupStatus, Cell, RemoteTable, TableError};
use cloudtable_core::{
    codec, Config, Entity, EntityStream, Filter, LocalTableService, StoreError, StoreResult, TableClient,
    Upserted,
};

type Table = RemoteTable<String, String, String, LocalTableService>;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn s(v: &str) -> String {
    v.to_string()
}

fn memory_table(name: &str) -> Table {
    let service = Arc::new(LocalTableService::in_memory(Config::default()).unwrap());
    let table = Table::new(name, service);
    table.ensure_table().unwrap();
    table
}

fn three_cells() -> Table {
    let table = memory_table("cells");
    table.put(&s("r1"), &s("c1"), &s("v1")).unwrap();
    table.put(&s("r1"), &s("c2"), &s("v2")).unwrap();
    table.put(&s("r2"), &s("c1"), &s("v3")).unwrap();
    table
}

fn set<T: Ord>(items: Vec<T>) -> BTreeSet<T> {
    items.into_iter().collect()
}

fn map<K: Ord, V>(pairs: Vec<(K, V)>) -> BTreeMap<K, V> {
    pairs.into_iter().collect()
}

// ---------------------------------------------------------------------------
// Point Operations
// ---------------------------------------------------------------------------

#[test]
fn test_put_then_get_random_bytes() {
    let service = Arc::new(LocalTableService::in_memory(Config::default()).unwrap());
    let table: RemoteTable<Vec<u8>, Vec<u8>, Vec<u8>, _> = RemoteTable::new("bytes", service);
    table.ensure_table().unwrap();

    let mut rng = StdRng::seed_from_u64(7);
    let mut written = BTreeMap::new();
    for _ in 0..200 {
        let row: Vec<u8> = (0..rng.gen_range(0..24)).map(|_| rng.gen()).collect();
        let column: Vec<u8> = (0..rng.gen_range(0..24)).map(|_| rng.gen()).collect();
        let value: Vec<u8> = (0..rng.gen_range(0..64)).map(|_| rng.gen()).collect();
        table.put(&row, &column, &value).unwrap();
        assert_eq!(table.get(&row, &column).unwrap(), Some(value.clone()));
        written.insert((row, column), value);
    }

    for ((row, column), value) in &written {
        assert_eq!(table.get(row, column).unwrap().as_ref(), Some(value));
    }
    assert_eq!(table.len().unwrap(), written.len());
}

#[test]
fn test_codec_roundtrip_random_bytes() {
    let mut rng = StdRng::seed_from_u64(11);
    for len in 0..128 {
        let bytes: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
        let encoded = codec::encode(&bytes);
        assert!(encoded.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(codec::decode(&encoded).unwrap(), bytes);
    }
}

#[test]
fn test_never_written_is_absent() {
    let table = three_cells();
    assert_eq!(table.get(&s("r9"), &s("c1")).unwrap(), None);
    assert!(!table.contains(&s("r9"), &s("c1")).unwrap());
    assert!(!table.contains(&s("r2"), &s("c2")).unwrap());
}

#[test]
fn test_remove_absent_is_not_an_error() {
    let table = three_cells();
    assert_eq!(table.remove(&s("r9"), &s("c9")).unwrap(), None);
    assert_eq!(table.len().unwrap(), 3);
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

#[test]
fn test_views_over_three_cells() {
    let table = three_cells();

    let cells = set(table.cell_set().to_vec().unwrap());
    let expected = set(vec![
        Cell::new(s("r1"), s("c1"), s("v1")),
        Cell::new(s("r1"), s("c2"), s("v2")),
        Cell::new(s("r2"), s("c1"), s("v3")),
    ]);
    assert_eq!(cells, expected);

    assert_eq!(set(table.row_key_set().to_vec().unwrap()), set(vec![s("r1"), s("r2")]));
    assert_eq!(table.row_key_set().len().unwrap(), 2);
    assert_eq!(set(table.column_key_set().to_vec().unwrap()), set(vec![s("c1"), s("c2")]));
    assert_eq!(table.column_key_set().len().unwrap(), 2);
    assert_eq!(
        map(table.row(s("r1")).to_vec().unwrap()),
        map(vec![(s("c1"), s("v1")), (s("c2"), s("v2"))])
    );
    assert_eq!(
        map(table.column(s("c1")).to_vec().unwrap()),
        map(vec![(s("r1"), s("v1")), (s("r2"), s("v3"))])
    );
}

#[test]
fn test_values_is_a_bag() {
    let table = three_cells();
    table.put(&s("r3"), &s("c3"), &s("v1")).unwrap();
    let mut values = table.values().to_vec().unwrap();
    values.sort();
    assert_eq!(values, [s("v1"), s("v1"), s("v2"), s("v3")]);
}

#[test]
fn test_size_matches_cell_set() {
    let table = three_cells();
    assert_eq!(table.len().unwrap(), table.cell_set().to_vec().unwrap().len());
    assert!(!table.is_empty().unwrap());

    let empty = memory_table("empty");
    assert_eq!(empty.len().unwrap(), 0);
    assert!(empty.is_empty().unwrap());
}

#[test]
fn test_views_see_later_writes() {
    let table = three_cells();
    let row = table.row(s("r1"));
    let keys = table.row_key_set();
    assert_eq!(row.len().unwrap(), 2);
    table.put(&s("r1"), &s("c7"), &s("v7")).unwrap();
    table.put(&s("r8"), &s("c1"), &s("v8")).unwrap();
    assert_eq!(row.len().unwrap(), 3);
    assert!(keys.contains(&s("r8")).unwrap());
}

#[test]
fn test_clear_then_empty() {
    let table = three_cells();
    assert_eq!(table.clear().unwrap(), 3);
    assert!(table.is_empty().unwrap());
    assert!(table.row_map().is_empty().unwrap());
}

#[test]
fn test_end_to_end_scenario() {
    let table = memory_table("scenario");
    assert!(table.is_empty().unwrap());

    table.put(&s("r1"), &s("c1"), &s("v1")).unwrap();
    table.put(&s("r1"), &s("c2"), &s("v2")).unwrap();
    assert_eq!(
        map(table.row(s("r1")).to_vec().unwrap()),
        map(vec![(s("c1"), s("v1")), (s("c2"), s("v2"))])
    );

    assert_eq!(table.remove(&s("r1"), &s("c1")).unwrap(), Some(s("v1")));
    assert_eq!(table.get(&s("r1"), &s("c1")).unwrap(), None);
    assert_eq!(table.get(&s("r1"), &s("c2")).unwrap(), Some(s("v2")));
}

#[test]
fn test_copy_between_tables() {
    let source = three_cells();
    let destination = Table::new("copy", Arc::clone(source.client()));
    destination.ensure_table().unwrap();
    destination.put_all_from(&source).unwrap();
    assert_eq!(
        set(destination.cell_set().to_vec().unwrap()),
        set(source.cell_set().to_vec().unwrap())
    );
}

// ---------------------------------------------------------------------------
// Misbehaving Services
// ---------------------------------------------------------------------------

/// Every delete loses a race: the entity is gone by the time it lands.
struct RacingDeletes(LocalTableService);

/// Deletes always fail with an I/O error.
struct BrokenDeletes(LocalTableService);

/// Upserts succeed but never report the value they replaced.
struct SilentUpserts(LocalTableService);

macro_rules! delegate_client {
    (@impl $ty:ident, $($custom:tt)*) => {
        impl TableClient for $ty {
            fn create_table(&self, table: &str) -> StoreResult<()> {
                self.0.create_table(table)
            }
            fn drop_table(&self, table: &str) -> StoreResult<()> {
                self.0.drop_table(table)
            }
            fn table_exists(&self, table: &str) -> StoreResult<bool> {
                self.0.table_exists(table)
            }
            fn list_tables(&self) -> StoreResult<Vec<String>> {
                self.0.list_tables()
            }
            fn retrieve(&self, table: &str, pk: &str, rk: &str) -> StoreResult<Entity> {
                self.0.retrieve(table, pk, rk)
            }
            fn scan(&self, table: &str, filter: Option<&Filter>) -> StoreResult<EntityStream<'_>> {
                self.0.scan(table, filter)
            }
            $($custom)*
        }
    };
    ($ty:ident, delete |$inner:ident, $table:ident, $pk:ident, $rk:ident| $body:expr) => {
        delegate_client!(@impl $ty,
            fn upsert(&self, table: &str, entity: Entity) -> StoreResult<Upserted> {
                self.0.upsert(table, entity)
            }
            fn delete(&self, $table: &str, $pk: &str, $rk: &str) -> StoreResult<()> {
                let $inner = &self.0;
                $body
            }
        );
    };
    ($ty:ident, upsert |$inner:ident, $table:ident, $entity:ident| $body:expr) => {
        delegate_client!(@impl $ty,
            fn upsert(&self, $table: &str, $entity: Entity) -> StoreResult<Upserted> {
                let $inner = &self.0;
                $body
            }
            fn delete(&self, table: &str, pk: &str, rk: &str) -> StoreResult<()> {
                self.0.delete(table, pk, rk)
            }
        );
    };
}

delegate_client!(RacingDeletes, delete |inner, table, pk, rk| {
    inner.delete(table, pk, rk)?;
    inner.delete(table, pk, rk)
});

delegate_client!(BrokenDeletes, delete |_inner, _table, _pk, _rk| {
    Err(StoreError::Io { path: None, kind: std::io::ErrorKind::Other, message: "connection reset".into() })
});

delegate_client!(SilentUpserts, upsert |inner, table, entity| {
    let mut upserted = inner.upsert(table, entity)?;
    upserted.previous = None;
    Ok(upserted)
});

#[test]
fn test_remove_losing_race_reports_absent() {
    let service = Arc::new(RacingDeletes(LocalTableService::in_memory(Config::default()).unwrap()));
    let table: RemoteTable<String, String, String, _> = RemoteTable::new("race", service);
    table.ensure_table().unwrap();
    table.put(&s("r"), &s("c"), &s("v")).unwrap();

    assert_eq!(table.remove(&s("r"), &s("c")).unwrap(), None);
    assert!(!table.contains(&s("r"), &s("c")).unwrap());
}

#[test]
fn test_remove_propagates_service_failure() {
    let service = Arc::new(BrokenDeletes(LocalTableService::in_memory(Config::default()).unwrap()));
    let table: RemoteTable<String, String, String, _> = RemoteTable::new("broken", service);
    table.ensure_table().unwrap();
    table.put(&s("r"), &s("c"), &s("v")).unwrap();

    let err = table.remove(&s("r"), &s("c")).unwrap_err();
    assert!(matches!(err, TableError::Store(StoreError::Io { .. })));
    assert_eq!(table.get(&s("r"), &s("c")).unwrap(), Some(s("v")));
    // Absent cells never reach delete.
    assert_eq!(table.remove(&s("r"), &s("x")).unwrap(), None);
}

#[test]
fn test_overwrite_without_reported_previous() {
    let service = Arc::new(SilentUpserts(LocalTableService::in_memory(Config::default()).unwrap()));
    let table: RemoteTable<String, String, String, _> = RemoteTable::new("silent", service);
    table.ensure_table().unwrap();

    assert_eq!(table.put(&s("r"), &s("c"), &s("v1")).unwrap(), None);
    assert_eq!(table.put(&s("r"), &s("c"), &s("v2")).unwrap(), None);
    assert_eq!(table.get(&s("r"), &s("c")).unwrap(), Some(s("v2")));

    // With no previous value reported, every add looks like a change.
    assert!(table.cell_set().add(&Cell::new(s("r"), s("c"), s("v3"))).unwrap());
    assert_eq!(table.get(&s("r"), &s("c")).unwrap(), Some(s("v3")));

    let mut entry = table.row(s("r")).entries().iter().unwrap().next().unwrap().unwrap();
    assert_eq!(entry.set_value(s("v4")).unwrap(), None);
    assert_eq!(table.get(&s("r"), &s("c")).unwrap(), Some(s("v4")));
    assert_eq!(table.len().unwrap(), 1);
}

// ---------------------------------------------------------------------------
// Journaled Service
// ---------------------------------------------------------------------------

#[test]
fn test_table_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let service = Arc::new(LocalTableService::open(dir.path(), Config::default()).unwrap());
        let table = Table::new("durable", service);
        table.ensure_table().unwrap();
        table.put(&s("r1"), &s("c1"), &s("v1")).unwrap();
        table.put(&s("r1"), &s("c2"), &s("v2")).unwrap();
        table.remove(&s("r1"), &s("c1")).unwrap();
    }

    let service = Arc::new(LocalTableService::open(dir.path(), Config::default()).unwrap());
    let table = Table::new("durable", service);
    assert_eq!(table.get(&s("r1"), &s("c1")).unwrap(), None);
    assert_eq!(table.get(&s("r1"), &s("c2")).unwrap(), Some(s("v2")));
    assert_eq!(table.len().unwrap(), 1);
}

#[test]
fn test_backup_lifecycle_on_disk() {
    let dir = TempDir::new().unwrap();
    let record = {
        let service = Arc::new(LocalTableService::open(dir.path(), Config::fast()).unwrap());
        let source = Table::new("orders", Arc::clone(&service));
        source.ensure_table().unwrap();
        source.put(&s("o1"), &s("qty"), &s("3")).unwrap();
        let manager = BackupManager::new(Arc::clone(&service));
        manager.ensure_metadata_table().unwrap();
        let record = manager.backup(&source, "orders").unwrap();
        service.sync().unwrap();
        record
    };

    let service = Arc::new(LocalTableService::open(dir.path(), Config::fast()).unwrap());
    let manager = BackupManager::new(Arc::clone(&service));
    assert_eq!(manager.status(&record.name, &record.timestamp).unwrap(), Some(BackupStatus::Completed));

    let restored = Table::new("restored", Arc::clone(&service));
    manager.restore(&record, &restored).unwrap();
    assert_eq!(restored.get(&s("o1"), &s("qty")).unwrap(), Some(s("3")));

    manager.delete_backup(&record).unwrap();
    assert!(manager.list_backups().unwrap().is_empty());
    assert!(!service.table_exists(&record.table_name()).unwrap());
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
fn test_concurrent_writers_on_shared_client() {
    let table = memory_table("shared");
    let threads = 4;
    let per_thread = 250;

    let start = Instant::now();
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let table = table.clone();
            thread::spawn(move || {
                for i in 0..per_thread {
                    table.put(&format!("row{t}"), &format!("col{i}"), &i.to_string()).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    let elapsed = start.elapsed();

    assert_eq!(table.len().unwrap(), threads * per_thread);
    assert_eq!(table.row_map().len().unwrap(), threads);
    assert_eq!(table.row(s("row2")).len().unwrap(), per_thread);

    println!("\n=== Concurrent writers ({} x {}) ===", threads, per_thread);
    println!("  Elapsed: {:?} ({:.2} µs/op)", elapsed, elapsed.as_micros() as f64 / (threads * per_thread) as f64);
}
