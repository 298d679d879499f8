//! Views of one row or one column
//!
//! A row view fixes the row key and maps column key to value; a column view
//! fixes the column key and maps row key to value. Both are the same type,
//! [`AxisView`], told apart by an [`Orientation`] marker:
//!
//! | marker       | fixed key | free key | fixed property |
//! |--------------|-----------|----------|----------------|
//! | [`ByRow`]    | row       | column   | partition key  |
//! | [`ByColumn`] | column    | row      | row key        |
//!
//! Point operations go straight to the table facade after reassembling
//! `(row, column)` from the fixed and free keys. Enumeration scans with an
//! equality filter on the fixed property.

use std::marker::PhantomData;

use cloudtable_core::{Codec, Entity, Filter, TableClient};
use tracing::debug;

use crate::error::TableResult;
use crate::scan::{Field, FieldProjection, FieldView, Projection, ScanView};
use crate::table::RemoteTable;

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::ByRow {}
    impl Sealed for super::ByColumn {}
}

/// Which key an [`AxisView`] holds fixed.
pub trait Orientation<R, C>: sealed::Sealed {
    /// The key held fixed
    type Fixed: Codec;
    /// The key the view maps from
    type Other: Codec;

    /// Entity property holding the fixed key
    const FIXED: Field;
    /// Entity property holding the free key
    const OTHER: Field;

    /// Reassemble table coordinates.
    fn join<'k>(fixed: &'k Self::Fixed, other: &'k Self::Other) -> (&'k R, &'k C);
}

/// Row orientation: fixed row key, columns vary.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByRow;

/// Column orientation: fixed column key, rows vary.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByColumn;

impl<R: Codec, C: Codec> Orientation<R, C> for ByRow {
    type Fixed = R;
    type Other = C;
    const FIXED: Field = Field::PartitionKey;
    const OTHER: Field = Field::RowKey;

    fn join<'k>(fixed: &'k R, other: &'k C) -> (&'k R, &'k C) {
        (fixed, other)
    }
}

impl<R: Codec, C: Codec> Orientation<R, C> for ByColumn {
    type Fixed = C;
    type Other = R;
    const FIXED: Field = Field::RowKey;
    const OTHER: Field = Field::PartitionKey;

    fn join<'k>(fixed: &'k C, other: &'k R) -> (&'k R, &'k C) {
        (other, fixed)
    }
}

/// Free key to value map over the cells sharing one fixed key.
pub struct AxisView<'a, O: Orientation<R, C>, R, C, V, S> {
    table: &'a RemoteTable<R, C, V, S>,
    key: O::Fixed,
    encoded: String,
    _orientation: PhantomData<O>,
}

/// Column key to value map of one row
pub type RowView<'a, R, C, V, S> = AxisView<'a, ByRow, R, C, V, S>;

/// Row key to value map of one column
pub type ColumnView<'a, R, C, V, S> = AxisView<'a, ByColumn, R, C, V, S>;

impl<'a, O, R, C, V, S> AxisView<'a, O, R, C, V, S>
where
    O: Orientation<R, C>,
    R: Codec,
    C: Codec,
    V: Codec,
    S: TableClient,
{
    pub(crate) fn new(table: &'a RemoteTable<R, C, V, S>, key: O::Fixed) -> Self {
        let encoded = key.encode();
        Self { table, key, encoded, _orientation: PhantomData }
    }

    /// The fixed key
    pub fn key(&self) -> &O::Fixed {
        &self.key
    }

    fn filter(&self) -> Filter {
        O::FIXED.eq_filter(self.encoded.clone())
    }

    pub fn get(&self, other: &O::Other) -> TableResult<Option<V>> {
        let (row, column) = O::join(&self.key, other);
        self.table.get(row, column)
    }

    /// Writes through to the table; returns the reported previous value.
    pub fn put(&self, other: &O::Other, value: &V) -> TableResult<Option<V>> {
        let (row, column) = O::join(&self.key, other);
        self.table.put(row, column, value)
    }

    pub fn remove(&self, other: &O::Other) -> TableResult<Option<V>> {
        let (row, column) = O::join(&self.key, other);
        self.table.remove(row, column)
    }

    pub fn contains_key(&self, other: &O::Other) -> TableResult<bool> {
        let (row, column) = O::join(&self.key, other);
        self.table.contains(row, column)
    }

    pub fn contains_value(&self, value: &V) -> TableResult<bool> {
        self.values().contains(value)
    }

    /// Free keys present under the fixed key. Read-only.
    pub fn keys(&self) -> FieldView<'a, S, O::Other> {
        self.table.field_view(Some(self.filter()), FieldProjection::all(O::OTHER))
    }

    /// Values under the fixed key. Read-only.
    pub fn values(&self) -> FieldView<'a, S, V> {
        self.table.field_view(Some(self.filter()), FieldProjection::all(Field::Value))
    }

    /// Writable `(free key, value)` entries.
    pub fn entries(&self) -> ScanView<'a, S, AxisEntryProjection<'a, O, R, C, V, S>> {
        let projection = AxisEntryProjection { table: self.table, _orientation: PhantomData };
        ScanView::new(&**self.table.client(), self.table.name(), Some(self.filter()), projection)
    }

    /// Snapshot of the view as `(free key, value)` pairs.
    pub fn to_vec(&self) -> TableResult<Vec<(O::Other, V)>> {
        self.entries().iter()?.map(|entry| entry.map(AxisEntry::into_pair)).collect()
    }

    pub fn len(&self) -> TableResult<usize> {
        self.keys().len()
    }

    pub fn is_empty(&self) -> TableResult<bool> {
        self.keys().is_empty()
    }

    /// Clear, then write `entries`. Returns the removed pairs.
    ///
    /// Not atomic: a failure part way leaves the old contents gone and the
    /// new ones partly written.
    pub(crate) fn replace_with<I>(&self, entries: I) -> TableResult<Vec<(O::Other, V)>>
    where
        I: IntoIterator<Item = (O::Other, V)>,
    {
        let removed = self.clear()?;
        let mut written = 0usize;
        for (other, value) in entries {
            self.put(&other, &value)?;
            written += 1;
        }
        debug!(table = %self.table.name(), removed = removed.len(), written, "replaced axis");
        Ok(removed)
    }

    /// Remove every cell under the fixed key, returning what was removed.
    pub fn clear(&self) -> TableResult<Vec<(O::Other, V)>> {
        let filter = self.filter();
        self.table
            .remove_matching(Some(&filter))?
            .into_iter()
            .map(|(entity, value)| Ok((<O::Other as Codec>::decode(O::OTHER.of(&entity))?, value)))
            .collect()
    }
}

/// One cell seen through an [`AxisView`].
pub struct AxisEntry<'a, O: Orientation<R, C>, R, C, V, S> {
    table: &'a RemoteTable<R, C, V, S>,
    partition_key: String,
    row_key: String,
    key: O::Other,
    value: V,
    _orientation: PhantomData<O>,
}

impl<'a, O, R, C, V, S> AxisEntry<'a, O, R, C, V, S>
where
    O: Orientation<R, C>,
    R: Codec,
    C: Codec,
    V: Codec,
    S: TableClient,
{
    pub fn key(&self) -> &O::Other {
        &self.key
    }

    /// Value as of the scan.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Overwrite this cell in the table. Returns the reported previous value.
    pub fn set_value(&mut self, value: V) -> TableResult<Option<V>> {
        let previous = self
            .table
            .put_encoded(self.partition_key.clone(), self.row_key.clone(), &value)?;
        self.value = value;
        Ok(previous)
    }

    pub fn into_pair(self) -> (O::Other, V) {
        (self.key, self.value)
    }
}

/// Builds [`AxisEntry`] items for [`AxisView::entries`].
pub struct AxisEntryProjection<'a, O, R, C, V, S> {
    table: &'a RemoteTable<R, C, V, S>,
    _orientation: PhantomData<O>,
}

impl<O, R, C, V, S> Clone for AxisEntryProjection<'_, O, R, C, V, S> {
    fn clone(&self) -> Self {
        Self { table: self.table, _orientation: PhantomData }
    }
}

impl<'a, O, R, C, V, S> Projection for AxisEntryProjection<'a, O, R, C, V, S>
where
    O: Orientation<R, C>,
    R: Codec,
    C: Codec,
    V: Codec,
    S: TableClient,
{
    type Item = AxisEntry<'a, O, R, C, V, S>;

    fn project(&self, entity: Entity) -> TableResult<Self::Item> {
        let key = <O::Other as Codec>::decode(O::OTHER.of(&entity))?;
        let value = V::decode(&entity.value)?;
        Ok(AxisEntry {
            table: self.table,
            partition_key: entity.partition_key,
            row_key: entity.row_key,
            key,
            value,
            _orientation: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudtable_core::{Config, LocalTableService};
    use std::sync::Arc;

    type Table = RemoteTable<String, String, Score, LocalTableService>;

    /// Value type with its own codec, to keep row and value types apart.
    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Score(i64);

    impl Codec for Score {
        fn to_bytes(&self) -> std::borrow::Cow<'_, [u8]> {
            std::borrow::Cow::Owned(self.0.to_string().into_bytes())
        }

        fn from_bytes(bytes: Vec<u8>) -> cloudtable_core::CodecResult<Self> {
            let text = String::from_bytes(bytes)?;
            Ok(Score(text.parse().unwrap_or_default()))
        }
    }

    fn s(v: &str) -> String {
        v.to_string()
    }

    fn table() -> Table {
        let service = Arc::new(LocalTableService::in_memory(Config::default()).unwrap());
        let table = Table::new("cells", service);
        table.ensure_table().unwrap();
        for (r, c, v) in [("r1", "c1", 11), ("r1", "c2", 12), ("r2", "c1", 21)] {
            table.put(&s(r), &s(c), &Score(v)).unwrap();
        }
        table
    }

    fn sorted<K: Ord, T>(mut pairs: Vec<(K, T)>) -> Vec<(K, T)> {
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        pairs
    }

    #[test]
    fn test_row_view_reads() {
        let t = table();
        let row = t.row(s("r1"));
        assert_eq!(row.get(&s("c2")).unwrap(), Some(Score(12)));
        assert_eq!(row.get(&s("c3")).unwrap(), None);
        assert_eq!(row.len().unwrap(), 2);
        assert!(row.contains_key(&s("c1")).unwrap());
        assert!(row.contains_value(&Score(11)).unwrap());
        assert!(!row.contains_value(&Score(21)).unwrap());
        assert_eq!(
            sorted(row.to_vec().unwrap()),
            vec![(s("c1"), Score(11)), (s("c2"), Score(12))]
        );
    }

    #[test]
    fn test_column_view_reads() {
        let t = table();
        let column = t.column(s("c1"));
        assert_eq!(column.get(&s("r2")).unwrap(), Some(Score(21)));
        let mut keys = column.keys().to_vec().unwrap();
        keys.sort();
        assert_eq!(keys, [s("r1"), s("r2")]);
    }

    #[test]
    fn test_writes_go_through_the_table() {
        let t = table();
        let column = t.column(s("c9"));
        assert!(column.is_empty().unwrap());
        column.put(&s("r5"), &Score(59)).unwrap();
        assert_eq!(t.get(&s("r5"), &s("c9")).unwrap(), Some(Score(59)));
        assert_eq!(column.remove(&s("r5")).unwrap(), Some(Score(59)));
        assert!(!t.contains(&s("r5"), &s("c9")).unwrap());
    }

    #[test]
    fn test_entry_set_value() {
        let t = table();
        let row = t.row(s("r2"));
        let mut entries: Vec<_> = row.entries().iter().unwrap().collect::<TableResult<_>>().unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &mut entries[0];
        assert_eq!(entry.key(), "c1");
        assert_eq!(entry.set_value(Score(22)).unwrap(), Some(Score(21)));
        assert_eq!(entry.value(), &Score(22));
        assert_eq!(t.get(&s("r2"), &s("c1")).unwrap(), Some(Score(22)));
    }

    #[test]
    fn test_clear_returns_removed() {
        let t = table();
        let removed = t.row(s("r1")).clear().unwrap();
        assert_eq!(sorted(removed), vec![(s("c1"), Score(11)), (s("c2"), Score(12))]);
        assert!(!t.contains_row(&s("r1")).unwrap());
        assert_eq!(t.len().unwrap(), 1);
    }
}
