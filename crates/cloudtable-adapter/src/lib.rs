//! CloudTable adapter: a two-key table over a remote entity store
//!
//! Presents a partition-addressed table service as a
//! `(row key, column key) -> value` container with row and column views, a
//! cell set, key sets, and row/column maps.
//!
//! # Architecture
//!
//! The service offers two primitives: point get/put/delete by
//! `(partition key, row key)`, and filtered scans. The bridge works as follows:
//! - Row key, column key and value are stored as the entity's partition key,
//!   row key and value, each transcoded by [`Codec`](cloudtable_core::Codec)
//! - Point operations map one-to-one onto service calls
//! - Every view is a [`ScanView`]: a filter plus a projection, re-scanned on
//!   each use, never cached
//! - Row and column variants are one generic type selected by [`ByRow`] /
//!   [`ByColumn`]
//!
//! Nothing is atomic across service calls.

pub mod axis;
pub mod axis_map;
pub mod backup;
pub mod cells;
pub mod error;
pub mod scan;
pub mod table;

pub use axis::{AxisEntry, AxisView, ByColumn, ByRow, ColumnView, Orientation, RowView};
pub use axis_map::{AxisMap, AxisMapEntry, ColumnMap, RowMap};
pub use backup::{BackupManager, BackupRecord, BackupStatus};
pub use cells::{Cell, CellSet};
pub use error::{TableError, TableResult};
pub use scan::{Field, FieldView, ScanView};
pub use table::RemoteTable;
