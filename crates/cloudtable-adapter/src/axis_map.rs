//! Maps from every row key (or column key) to its [`AxisView`]

use std::marker::PhantomData;

use cloudtable_core::{Codec, Entity, TableClient};

use crate::axis::{AxisView, ByColumn, ByRow, Orientation};
use crate::error::TableResult;
use crate::scan::{Field, FieldProjection, FieldView, Projection, ScanView};
use crate::table::RemoteTable;

/// Fixed key to view, over every fixed key present in the table.
pub struct AxisMap<'a, O, R, C, V, S> {
    table: &'a RemoteTable<R, C, V, S>,
    _orientation: PhantomData<O>,
}

/// Row key to [`RowView`](crate::RowView)
pub type RowMap<'a, R, C, V, S> = AxisMap<'a, ByRow, R, C, V, S>;

/// Column key to [`ColumnView`](crate::ColumnView)
pub type ColumnMap<'a, R, C, V, S> = AxisMap<'a, ByColumn, R, C, V, S>;

impl<'a, O, R, C, V, S> AxisMap<'a, O, R, C, V, S>
where
    O: Orientation<R, C>,
    R: Codec,
    C: Codec,
    V: Codec,
    S: TableClient,
{
    pub(crate) fn new(table: &'a RemoteTable<R, C, V, S>) -> Self {
        Self { table, _orientation: PhantomData }
    }

    /// View for `key`, or `None` if no cell carries it.
    pub fn get(&self, key: O::Fixed) -> TableResult<Option<AxisView<'a, O, R, C, V, S>>> {
        let view = AxisView::<O, R, C, V, S>::new(self.table, key);
        Ok(if view.is_empty()? { None } else { Some(view) })
    }

    pub fn contains_key(&self, key: &O::Fixed) -> TableResult<bool> {
        self.key_set().contains(key)
    }

    /// Replace everything under `key` with `entries`.
    ///
    /// Returns the pairs that were removed. Not atomic: a failure part way
    /// leaves the old contents gone and the new ones partly written.
    pub fn put<I>(&self, key: O::Fixed, entries: I) -> TableResult<Vec<(O::Other, V)>>
    where
        I: IntoIterator<Item = (O::Other, V)>,
    {
        AxisView::<O, R, C, V, S>::new(self.table, key).replace_with(entries)
    }

    /// Remove everything under `key`, returning what was removed.
    pub fn remove(&self, key: O::Fixed) -> TableResult<Vec<(O::Other, V)>> {
        AxisView::<O, R, C, V, S>::new(self.table, key).clear()
    }

    /// Distinct fixed keys. Read-only.
    pub fn key_set(&self) -> FieldView<'a, S, O::Fixed> {
        self.table.field_view(None, FieldProjection::distinct(O::FIXED))
    }

    /// One entry per distinct fixed key, pairing the key with its view.
    pub fn entries(&self) -> ScanView<'a, S, AxisMapEntryProjection<'a, O, R, C, V, S>> {
        let projection = AxisMapEntryProjection { table: self.table, _orientation: PhantomData };
        ScanView::new(&**self.table.client(), self.table.name(), None, projection)
    }

    pub fn len(&self) -> TableResult<usize> {
        self.key_set().len()
    }

    pub fn is_empty(&self) -> TableResult<bool> {
        self.key_set().is_empty()
    }

    /// Remove every cell of the table.
    pub fn clear(&self) -> TableResult<usize> {
        self.table.clear()
    }
}

/// A fixed key and its view, as yielded by [`AxisMap::entries`].
pub struct AxisMapEntry<'a, O: Orientation<R, C>, R, C, V, S> {
    view: AxisView<'a, O, R, C, V, S>,
}

impl<'a, O, R, C, V, S> AxisMapEntry<'a, O, R, C, V, S>
where
    O: Orientation<R, C>,
    R: Codec,
    C: Codec,
    V: Codec,
    S: TableClient,
{
    pub fn key(&self) -> &O::Fixed {
        self.view.key()
    }

    /// Live view of the entry's cells.
    pub fn value(&self) -> &AxisView<'a, O, R, C, V, S> {
        &self.view
    }

    /// Replace the entry's cells, as [`AxisMap::put`] does for its key.
    pub fn set_value<I>(&self, entries: I) -> TableResult<Vec<(O::Other, V)>>
    where
        I: IntoIterator<Item = (O::Other, V)>,
    {
        self.view.replace_with(entries)
    }

    pub fn into_view(self) -> AxisView<'a, O, R, C, V, S> {
        self.view
    }
}

/// Builds one [`AxisMapEntry`] per distinct fixed key.
pub struct AxisMapEntryProjection<'a, O, R, C, V, S> {
    table: &'a RemoteTable<R, C, V, S>,
    _orientation: PhantomData<O>,
}

impl<O, R, C, V, S> Clone for AxisMapEntryProjection<'_, O, R, C, V, S> {
    fn clone(&self) -> Self {
        Self { table: self.table, _orientation: PhantomData }
    }
}

impl<'a, O, R, C, V, S> Projection for AxisMapEntryProjection<'a, O, R, C, V, S>
where
    O: Orientation<R, C>,
    R: Codec,
    C: Codec,
    V: Codec,
    S: TableClient,
{
    type Item = AxisMapEntry<'a, O, R, C, V, S>;

    fn project(&self, entity: Entity) -> TableResult<Self::Item> {
        let key = <O::Fixed as Codec>::decode(O::FIXED.of(&entity))?;
        Ok(AxisMapEntry { view: AxisView::new(self.table, key) })
    }

    fn distinct_on(&self) -> Option<Field> {
        Some(O::FIXED)
    }
}
