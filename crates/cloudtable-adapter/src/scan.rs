//! The one primitive every view is built on: scan with a filter, project
//! each entity.
//!
//! A [`ScanView`] owns nothing but a filter and a [`Projection`]. Each call
//! to [`ScanView::iter`], [`ScanView::len`] or [`ScanView::is_empty`] issues
//! a fresh scan, so results always reflect the service, and two calls can
//! disagree if writers interleave.
//!
//! Views of a single property ([`FieldView`]) are read-only: they carry no
//! mutating methods because a lone row key, column key or value does not
//! identify a cell.

use std::collections::HashSet;
use std::marker::PhantomData;

use cloudtable_core::{Codec, Entity, EntityStream, Filter, QueryBuilder, TableClient};

use crate::error::TableResult;

/// One of the three stored properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Service partition key, the logical row key
    PartitionKey,
    /// Service row key, the logical column key
    RowKey,
    /// Payload
    Value,
}

impl Field {
    /// The property's value on `entity`.
    pub fn of(self, entity: &Entity) -> &str {
        match self {
            Field::PartitionKey => &entity.partition_key,
            Field::RowKey => &entity.row_key,
            Field::Value => &entity.value,
        }
    }

    /// Equality filter on this property.
    pub fn eq_filter(self, encoded: impl Into<String>) -> Filter {
        let q = QueryBuilder;
        match self {
            Field::PartitionKey => q.partition_key_eq(encoded),
            Field::RowKey => q.row_key_eq(encoded),
            Field::Value => q.value_eq(encoded),
        }
    }
}

/// Conjoin an optional base filter with one more predicate.
pub(crate) fn narrow(base: Option<&Filter>, extra: Filter) -> Filter {
    match base {
        Some(base) => QueryBuilder.and(base.clone(), extra),
        None => extra,
    }
}

/// Turns a scanned entity into a view item.
pub trait Projection: Clone {
    /// Item type yielded by the view
    type Item;

    /// Project one entity.
    fn project(&self, entity: Entity) -> TableResult<Self::Item>;

    /// Property identifying an item when the view has set semantics.
    ///
    /// Entities repeating an already-seen value of this property are
    /// skipped within one iteration.
    fn distinct_on(&self) -> Option<Field> {
        None
    }
}

/// Projection onto a single decoded property.
pub struct FieldProjection<T> {
    field: Field,
    distinct: bool,
    _item: PhantomData<fn() -> T>,
}

impl<T> FieldProjection<T> {
    /// Every occurrence of `field`.
    pub fn all(field: Field) -> Self {
        Self { field, distinct: false, _item: PhantomData }
    }

    /// Each distinct value of `field` once.
    pub fn distinct(field: Field) -> Self {
        Self { field, distinct: true, _item: PhantomData }
    }
}

impl<T> Clone for FieldProjection<T> {
    fn clone(&self) -> Self {
        Self { field: self.field, distinct: self.distinct, _item: PhantomData }
    }
}

impl<T: Codec> Projection for FieldProjection<T> {
    type Item = T;

    fn project(&self, entity: Entity) -> TableResult<T> {
        Ok(T::decode(self.field.of(&entity))?)
    }

    fn distinct_on(&self) -> Option<Field> {
        self.distinct.then_some(self.field)
    }
}

/// A lazily evaluated, filtered and projected scan.
pub struct ScanView<'a, S, P> {
    client: &'a S,
    table: &'a str,
    filter: Option<Filter>,
    projection: P,
}

/// Read-only view of one property: key sets and value collections.
pub type FieldView<'a, S, T> = ScanView<'a, S, FieldProjection<T>>;

impl<'a, S: TableClient, P: Projection> ScanView<'a, S, P> {
    pub(crate) fn new(client: &'a S, table: &'a str, filter: Option<Filter>, projection: P) -> Self {
        Self { client, table, filter, projection }
    }

    /// Raw entities, de-duplicated if the projection asks for it.
    fn entities(&self) -> TableResult<Entities<'a>> {
        let stream = self.client.scan(self.table, self.filter.as_ref())?;
        Ok(Entities {
            stream,
            distinct: self.projection.distinct_on().map(|field| (field, HashSet::new())),
        })
    }

    /// Start a scan. Each item is projected as it arrives.
    pub fn iter(&self) -> TableResult<ScanIter<'a, P>> {
        Ok(ScanIter { entities: self.entities()?, projection: self.projection.clone() })
    }

    /// Number of items, by scanning. O(n) service cost.
    pub fn len(&self) -> TableResult<usize> {
        let mut count = 0;
        for entity in self.entities()? {
            entity?;
            count += 1;
        }
        Ok(count)
    }

    /// True iff the scan yields nothing.
    pub fn is_empty(&self) -> TableResult<bool> {
        match self.entities()?.next() {
            None => Ok(true),
            Some(entity) => entity.map(|_| false),
        }
    }

    /// Collect every item.
    pub fn to_vec(&self) -> TableResult<Vec<P::Item>> {
        self.iter()?.collect()
    }
}

impl<'a, S: TableClient, T: Codec> FieldView<'a, S, T> {
    /// Whether some scanned entity carries `item` in the projected property.
    ///
    /// Issues one scan narrowed by equality on that property.
    pub fn contains(&self, item: &T) -> TableResult<bool> {
        let filter = narrow(self.filter.as_ref(), self.projection.field.eq_filter(item.encode()));
        let mut stream = self.client.scan(self.table, Some(&filter))?;
        match stream.next() {
            None => Ok(false),
            Some(entity) => entity.map(|_| true).map_err(Into::into),
        }
    }
}

struct Entities<'a> {
    stream: EntityStream<'a>,
    distinct: Option<(Field, HashSet<String>)>,
}

impl Iterator for Entities<'_> {
    type Item = TableResult<Entity>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entity = match self.stream.next()? {
                Ok(entity) => entity,
                Err(e) => return Some(Err(e.into())),
            };
            if let Some((field, seen)) = &mut self.distinct {
                if !seen.insert(field.of(&entity).to_string()) {
                    continue;
                }
            }
            return Some(Ok(entity));
        }
    }
}

/// Iterator over one scan of a [`ScanView`].
pub struct ScanIter<'a, P> {
    entities: Entities<'a>,
    projection: P,
}

impl<P: Projection> Iterator for ScanIter<'_, P> {
    type Item = TableResult<P::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let entity = self.entities.next()?;
        Some(entity.and_then(|e| self.projection.project(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudtable_core::{Config, LocalTableService};

    fn service() -> LocalTableService {
        let service = LocalTableService::in_memory(Config::default()).unwrap();
        service.create_table("cells").unwrap();
        for (r, c, v) in [("r1", "c1", "v1"), ("r1", "c2", "v2"), ("r2", "c1", "v1")] {
            service
                .upsert("cells", Entity::new(r.to_string().encode(), c.to_string().encode(), v.to_string().encode()))
                .unwrap();
        }
        service
    }

    fn sorted(mut items: Vec<String>) -> Vec<String> {
        items.sort();
        items
    }

    #[test]
    fn test_distinct_projection() {
        let service = service();
        let rows: FieldView<'_, _, String> =
            ScanView::new(&service, "cells", None, FieldProjection::distinct(Field::PartitionKey));
        assert_eq!(sorted(rows.to_vec().unwrap()), ["r1", "r2"]);
        assert_eq!(rows.len().unwrap(), 2);
    }

    #[test]
    fn test_bag_projection() {
        let service = service();
        let values: FieldView<'_, _, String> =
            ScanView::new(&service, "cells", None, FieldProjection::all(Field::Value));
        assert_eq!(sorted(values.to_vec().unwrap()), ["v1", "v1", "v2"]);
        assert!(values.contains(&"v2".to_string()).unwrap());
        assert!(!values.contains(&"v9".to_string()).unwrap());
    }

    #[test]
    fn test_filtered_contains_narrows() {
        let service = service();
        let filter = Some(Field::PartitionKey.eq_filter("r2".to_string().encode()));
        let values: FieldView<'_, _, String> =
            ScanView::new(&service, "cells", filter, FieldProjection::all(Field::Value));
        assert!(values.contains(&"v1".to_string()).unwrap());
        assert!(!values.contains(&"v2".to_string()).unwrap());
        assert!(!values.is_empty().unwrap());
    }

    #[test]
    fn test_missing_table_propagates() {
        let service = service();
        let view: FieldView<'_, _, String> =
            ScanView::new(&service, "nothere", None, FieldProjection::all(Field::Value));
        assert!(view.iter().is_err());
        assert!(view.is_empty().is_err());
    }
}
