//! `RemoteTable`: a two-key table whose cells live in a remote entity store
//!
//! Row key, column key and value map onto partition key, row key and value
//! of one service entity. Everything is transcoded through [`Codec`] so
//! arbitrary bytes fit the service's key alphabet.
//!
//! The facade holds no cell state. Every call goes to the service, and
//! nothing is atomic across calls: [`RemoteTable::remove`] in particular is
//! a retrieve followed by a delete, and a concurrent writer can slip in
//! between them.

use std::marker::PhantomData;
use std::sync::Arc;

use cloudtable_core::{Codec, Config, Entity, EntityStream, Filter, QueryBuilder, TableClient};
use tracing::debug;

use crate::axis::{AxisView, ByColumn, ByRow, ColumnView, RowView};
use crate::axis_map::{AxisMap, ColumnMap, RowMap};
use crate::cells::{Cell, CellSet};
use crate::error::{TableError, TableResult};
use crate::scan::{Field, FieldProjection, FieldView, ScanView};

const Q: QueryBuilder = QueryBuilder;

/// A table of `(row, column) -> value` cells stored in table `name`.
///
/// `S` is the service client. It is shared, so one client can serve any
/// number of tables.
pub struct RemoteTable<R, C, V, S> {
    name: String,
    client: Arc<S>,
    config: Config,
    _cells: PhantomData<fn() -> (R, C, V)>,
}

impl<R, C, V, S> Clone for RemoteTable<R, C, V, S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            client: Arc::clone(&self.client),
            config: self.config.clone(),
            _cells: PhantomData,
        }
    }
}

impl<R, C, V, S> std::fmt::Debug for RemoteTable<R, C, V, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteTable").field("name", &self.name).finish()
    }
}

impl<R: Codec, C: Codec, V: Codec, S: TableClient> RemoteTable<R, C, V, S> {
    /// Bind to table `name` with the default size limits.
    ///
    /// The table is not created; see [`ensure_table`](Self::ensure_table).
    pub fn new(name: impl Into<String>, client: Arc<S>) -> Self {
        Self::with_config(name, client, Config::default())
    }

    /// Bind with explicit limits. Only the key and value limits are used.
    pub fn with_config(name: impl Into<String>, client: Arc<S>, config: Config) -> Self {
        Self { name: name.into(), client, config, _cells: PhantomData }
    }

    /// Service table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared service client
    pub fn client(&self) -> &Arc<S> {
        &self.client
    }

    /// Create the backing table if it does not exist yet.
    pub fn ensure_table(&self) -> TableResult<()> {
        self.client.create_table(&self.name)?;
        Ok(())
    }

    // ---- encoding ----

    fn checked(&self, component: &'static str, encoded: String, limit: usize) -> TableResult<String> {
        if encoded.len() > limit {
            return Err(TableError::InvalidArgument {
                component,
                reason: format!("encodes to {} bytes, limit is {}", encoded.len(), limit),
            });
        }
        Ok(encoded)
    }

    pub(crate) fn encode_row(&self, row: &R) -> TableResult<String> {
        self.checked("row key", row.encode(), self.config.max_key_size)
    }

    pub(crate) fn encode_column(&self, column: &C) -> TableResult<String> {
        self.checked("column key", column.encode(), self.config.max_key_size)
    }

    pub(crate) fn encode_value(&self, value: &V) -> TableResult<String> {
        self.checked("value", value.encode(), self.config.max_value_size)
    }

    // ---- point operations ----

    /// Value at `(row, column)`, or `None` if there is no such cell.
    pub fn get(&self, row: &R, column: &C) -> TableResult<Option<V>> {
        let partition_key = self.encode_row(row)?;
        let row_key = self.encode_column(column)?;
        self.get_encoded(&partition_key, &row_key)
    }

    pub(crate) fn get_encoded(&self, partition_key: &str, row_key: &str) -> TableResult<Option<V>> {
        match self.client.retrieve(&self.name, partition_key, row_key) {
            Ok(entity) => Ok(Some(V::decode(&entity.value)?)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Insert or replace the cell at `(row, column)`.
    ///
    /// Returns the previous value as reported by the service's upsert.
    pub fn put(&self, row: &R, column: &C, value: &V) -> TableResult<Option<V>> {
        let partition_key = self.encode_row(row)?;
        let row_key = self.encode_column(column)?;
        self.put_encoded(partition_key, row_key, value)
    }

    pub(crate) fn put_encoded(&self, partition_key: String, row_key: String, value: &V) -> TableResult<Option<V>> {
        let value = self.encode_value(value)?;
        let upserted = self.client.upsert(&self.name, Entity::new(partition_key, row_key, value))?;
        match upserted.previous {
            Some(previous) => Ok(Some(V::decode(&previous.value)?)),
            None => Ok(None),
        }
    }

    /// Remove the cell at `(row, column)`, returning the value it held.
    ///
    /// Retrieves first and deletes second. A cell removed by someone else
    /// between the two steps is reported as absent.
    pub fn remove(&self, row: &R, column: &C) -> TableResult<Option<V>> {
        let partition_key = self.encode_row(row)?;
        let row_key = self.encode_column(column)?;
        self.remove_encoded(&partition_key, &row_key)
    }

    pub(crate) fn remove_encoded(&self, partition_key: &str, row_key: &str) -> TableResult<Option<V>> {
        let Some(previous) = self.get_encoded(partition_key, row_key)? else {
            return Ok(None);
        };
        match self.client.delete(&self.name, partition_key, row_key) {
            Ok(()) => Ok(Some(previous)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // ---- membership ----

    /// Whether a cell exists at `(row, column)`.
    ///
    /// Keys that could never be stored are simply absent.
    pub fn contains(&self, row: &R, column: &C) -> TableResult<bool> {
        let (partition_key, row_key) = match (self.encode_row(row), self.encode_column(column)) {
            (Ok(pk), Ok(rk)) => (pk, rk),
            _ => return Ok(false),
        };
        Ok(self.get_encoded(&partition_key, &row_key)?.is_some())
    }

    /// Whether any cell has row key `row`.
    pub fn contains_row(&self, row: &R) -> TableResult<bool> {
        match self.encode_row(row) {
            Ok(pk) => self.any(Q.row(&pk)),
            Err(_) => Ok(false),
        }
    }

    /// Whether any cell has column key `column`.
    pub fn contains_column(&self, column: &C) -> TableResult<bool> {
        match self.encode_column(column) {
            Ok(rk) => self.any(Q.column(&rk)),
            Err(_) => Ok(false),
        }
    }

    /// Whether any cell holds `value`.
    pub fn contains_value(&self, value: &V) -> TableResult<bool> {
        match self.encode_value(value) {
            Ok(v) => self.any(Q.value(&v)),
            Err(_) => Ok(false),
        }
    }

    /// True iff the table holds no cells.
    pub fn is_empty(&self) -> TableResult<bool> {
        Ok(!self.any(Q.all())?)
    }

    /// Number of cells. Scans the whole table.
    pub fn len(&self) -> TableResult<usize> {
        self.cell_set().len()
    }

    // ---- bulk ----

    /// Remove every cell, one retrieve-then-delete at a time.
    ///
    /// Returns how many cells this call removed.
    pub fn clear(&self) -> TableResult<usize> {
        let removed = self.remove_matching(None)?.len();
        debug!(table = %self.name, removed, "cleared table");
        Ok(removed)
    }

    /// Remove every cell matching `filter`, returning the removed entities
    /// together with their decoded values.
    pub(crate) fn remove_matching(&self, filter: Option<&Filter>) -> TableResult<Vec<(Entity, V)>> {
        // Collect keys first so deletes never run under an open scan.
        let keys = self.scan(filter)?.collect::<Result<Vec<Entity>, _>>()?;
        let mut removed = Vec::with_capacity(keys.len());
        for entity in keys {
            if let Some(value) = self.remove_encoded(&entity.partition_key, &entity.row_key)? {
                removed.push((entity, value));
            }
        }
        Ok(removed)
    }

    /// Put each cell in order. Stops at the first failure; earlier cells
    /// stay written.
    pub fn put_all<I>(&self, cells: I) -> TableResult<()>
    where
        I: IntoIterator<Item = Cell<R, C, V>>,
    {
        let mut written = 0usize;
        for cell in cells {
            self.put(&cell.row, &cell.column, &cell.value)?;
            written += 1;
        }
        debug!(table = %self.name, written, "put_all");
        Ok(())
    }

    /// Copy every cell of `source` into this table.
    pub fn put_all_from<S2: TableClient>(&self, source: &RemoteTable<R, C, V, S2>) -> TableResult<()> {
        let cells = source.cell_set();
        for cell in cells.iter()? {
            let cell = cell?;
            self.put(&cell.row, &cell.column, &cell.value)?;
        }
        Ok(())
    }

    // ---- scans ----

    pub(crate) fn scan(&self, filter: Option<&Filter>) -> TableResult<EntityStream<'_>> {
        Ok(self.client.scan(&self.name, filter)?)
    }

    pub(crate) fn any(&self, filter: Option<Filter>) -> TableResult<bool> {
        match self.scan(filter.as_ref())?.next() {
            None => Ok(false),
            Some(entity) => entity.map(|_| true).map_err(Into::into),
        }
    }

    pub(crate) fn field_view<T: Codec>(&self, filter: Option<Filter>, projection: FieldProjection<T>) -> FieldView<'_, S, T> {
        ScanView::new(&*self.client, &self.name, filter, projection)
    }

    // ---- views ----

    /// Every cell as a `(row, column, value)` triple.
    pub fn cell_set(&self) -> CellSet<'_, R, C, V, S> {
        CellSet::new(self)
    }

    /// Distinct row keys. Read-only.
    pub fn row_key_set(&self) -> FieldView<'_, S, R> {
        self.field_view(None, FieldProjection::distinct(Field::PartitionKey))
    }

    /// Distinct column keys. Read-only.
    pub fn column_key_set(&self) -> FieldView<'_, S, C> {
        self.field_view(None, FieldProjection::distinct(Field::RowKey))
    }

    /// Every stored value, duplicates included. Read-only.
    pub fn values(&self) -> FieldView<'_, S, V> {
        self.field_view(None, FieldProjection::all(Field::Value))
    }

    /// Column key to value map of one row.
    pub fn row(&self, row: R) -> RowView<'_, R, C, V, S> {
        AxisView::new(self, row)
    }

    /// Row key to value map of one column.
    pub fn column(&self, column: C) -> ColumnView<'_, R, C, V, S> {
        AxisView::new(self, column)
    }

    /// Row key to row view.
    pub fn row_map(&self) -> RowMap<'_, R, C, V, S> {
        AxisMap::<ByRow, _, _, _, _>::new(self)
    }

    /// Column key to column view.
    pub fn column_map(&self) -> ColumnMap<'_, R, C, V, S> {
        AxisMap::<ByColumn, _, _, _, _>::new(self)
    }
}
