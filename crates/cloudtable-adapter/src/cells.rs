//! Cells and the table-wide cell set

use std::marker::PhantomData;

use cloudtable_core::{Codec, Entity, TableClient};

use crate::error::TableResult;
use crate::scan::{Projection, ScanIter, ScanView};
use crate::table::RemoteTable;

/// One `(row, column, value)` triple.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cell<R, C, V> {
    /// Row key
    pub row: R,
    /// Column key
    pub column: C,
    /// Stored value
    pub value: V,
}

impl<R, C, V> Cell<R, C, V> {
    pub fn new(row: R, column: C, value: V) -> Self {
        Self { row, column, value }
    }
}

/// Decodes all three properties of an entity.
pub struct CellProjection<R, C, V>(PhantomData<fn() -> (R, C, V)>);

impl<R, C, V> Clone for CellProjection<R, C, V> {
    fn clone(&self) -> Self {
        Self(PhantomData)
    }
}

impl<R: Codec, C: Codec, V: Codec> Projection for CellProjection<R, C, V> {
    type Item = Cell<R, C, V>;

    fn project(&self, entity: Entity) -> TableResult<Self::Item> {
        Ok(Cell {
            row: R::decode(&entity.partition_key)?,
            column: C::decode(&entity.row_key)?,
            value: V::decode(&entity.value)?,
        })
    }
}

/// Every cell of a table. Mutations write through to the table.
pub struct CellSet<'a, R, C, V, S> {
    table: &'a RemoteTable<R, C, V, S>,
    scan: ScanView<'a, S, CellProjection<R, C, V>>,
}

impl<'a, R: Codec, C: Codec, V: Codec, S: TableClient> CellSet<'a, R, C, V, S> {
    pub(crate) fn new(table: &'a RemoteTable<R, C, V, S>) -> Self {
        let scan = ScanView::new(&**table.client(), table.name(), None, CellProjection(PhantomData));
        Self { table, scan }
    }

    /// Write `cell`. True iff no previous value was reported.
    pub fn add(&self, cell: &Cell<R, C, V>) -> TableResult<bool> {
        Ok(self.table.put(&cell.row, &cell.column, &cell.value)?.is_none())
    }

    /// Remove the cell at `cell`'s coordinates, whatever it holds.
    /// True iff something was removed.
    pub fn remove(&self, cell: &Cell<R, C, V>) -> TableResult<bool> {
        Ok(self.table.remove(&cell.row, &cell.column)?.is_some())
    }

    /// Whether a cell exists at `cell`'s coordinates. The value is not
    /// compared.
    pub fn contains(&self, cell: &Cell<R, C, V>) -> TableResult<bool> {
        self.table.contains(&cell.row, &cell.column)
    }

    /// Scan every cell.
    pub fn iter(&self) -> TableResult<ScanIter<'a, CellProjection<R, C, V>>> {
        self.scan.iter()
    }

    pub fn len(&self) -> TableResult<usize> {
        self.scan.len()
    }

    pub fn is_empty(&self) -> TableResult<bool> {
        self.scan.is_empty()
    }

    /// Collect every cell.
    pub fn to_vec(&self) -> TableResult<Vec<Cell<R, C, V>>> {
        self.scan.to_vec()
    }

    /// Remove every cell of the table.
    pub fn clear(&self) -> TableResult<usize> {
        self.table.clear()
    }
}
