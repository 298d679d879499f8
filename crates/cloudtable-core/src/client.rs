//! The table service interface consumed by the table adapter.
//!
//! Every method maps onto exactly one service call. Absence of an entity or
//! table surfaces as an error variant ([`StoreError::NotFound`],
//! [`StoreError::TableNotFound`]); whether absence is a failure is the
//! caller's decision. Implementations perform no retries.
//!
//! [`StoreError::NotFound`]: crate::StoreError::NotFound
//! [`StoreError::TableNotFound`]: crate::StoreError::TableNotFound

use crate::entity::Entity;
use crate::error::StoreResult;
use crate::filter::Filter;

/// Unordered stream of scan results.
///
/// Callers must not assume any ordering or any bound on its length.
pub type EntityStream<'a> = Box<dyn Iterator<Item = StoreResult<Entity>> + Send + 'a>;

/// Result of an insert-or-replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upserted {
    /// The entity as stored
    pub entity: Entity,
    /// The replaced entity, if the service reports it.
    ///
    /// `None` means either there was no prior entity or the service does not
    /// echo it; callers cannot tell these apart.
    pub previous: Option<Entity>,
}

/// Point and scan operations against named tables.
pub trait TableClient: Send + Sync {
    /// Provision a table. Creating an existing table succeeds.
    fn create_table(&self, table: &str) -> StoreResult<()>;

    /// Drop a table and every entity in it.
    fn drop_table(&self, table: &str) -> StoreResult<()>;

    /// Whether the table has been provisioned.
    fn table_exists(&self, table: &str) -> StoreResult<bool>;

    /// Names of every provisioned table, unordered.
    fn list_tables(&self) -> StoreResult<Vec<String>>;

    /// Point read.
    fn retrieve(&self, table: &str, partition_key: &str, row_key: &str) -> StoreResult<Entity>;

    /// Insert-or-replace, last writer wins.
    fn upsert(&self, table: &str, entity: Entity) -> StoreResult<Upserted>;

    /// Point delete.
    fn delete(&self, table: &str, partition_key: &str, row_key: &str) -> StoreResult<()>;

    /// Filtered range scan; `None` selects every entity.
    fn scan(&self, table: &str, filter: Option<&Filter>) -> StoreResult<EntityStream<'_>>;
}
