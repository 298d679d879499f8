//! Scan filter expressions
//!
//! A [`Filter`] is a predicate over the three properties of an [`Entity`].
//! [`QueryBuilder`] assembles the handful of shapes the table adapter needs.
//! Filters evaluate locally via [`Filter::matches`] and render to the
//! service's textual filter syntax via `Display`.

use std::fmt;

use crate::entity::Entity;

/// Property name of the first key half in filter expressions
pub const PARTITION_KEY: &str = "PartitionKey";

/// Property name of the second key half in filter expressions
pub const ROW_KEY: &str = "RowKey";

/// Property name of the payload in filter expressions
pub const VALUE: &str = "Value";

/// Predicate over an entity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Filter {
    /// `PartitionKey eq '...'`
    PartitionKeyEq(String),
    /// `RowKey eq '...'`
    RowKeyEq(String),
    /// `Value eq '...'`
    ValueEq(String),
    /// Both sides hold
    And(Box<Filter>, Box<Filter>),
}

impl Filter {
    /// Evaluate the predicate against an entity.
    pub fn matches(&self, entity: &Entity) -> bool {
        match self {
            Filter::PartitionKeyEq(pk) => entity.partition_key == *pk,
            Filter::RowKeyEq(rk) => entity.row_key == *rk,
            Filter::ValueEq(v) => entity.value == *v,
            Filter::And(lhs, rhs) => lhs.matches(entity) && rhs.matches(entity),
        }
    }

    /// The partition key this filter pins, if any.
    ///
    /// Lets a service restrict a scan to one partition.
    pub fn partition_key(&self) -> Option<&str> {
        match self {
            Filter::PartitionKeyEq(pk) => Some(pk),
            Filter::And(lhs, rhs) => lhs.partition_key().or_else(|| rhs.partition_key()),
            _ => None,
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::PartitionKeyEq(v) => write_eq(f, PARTITION_KEY, v),
            Filter::RowKeyEq(v) => write_eq(f, ROW_KEY, v),
            Filter::ValueEq(v) => write_eq(f, VALUE, v),
            Filter::And(lhs, rhs) => write!(f, "({lhs}) and ({rhs})"),
        }
    }
}

fn write_eq(f: &mut fmt::Formatter<'_>, property: &str, literal: &str) -> fmt::Result {
    // Quotes inside a string literal are doubled
    write!(f, "{property} eq '{}'", literal.replace('\'', "''"))
}

/// Stateless builder for the filters the table adapter issues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryBuilder;

impl QueryBuilder {
    /// Partition key equality
    pub fn partition_key_eq(&self, value: impl Into<String>) -> Filter {
        Filter::PartitionKeyEq(value.into())
    }

    /// Row key equality
    pub fn row_key_eq(&self, value: impl Into<String>) -> Filter {
        Filter::RowKeyEq(value.into())
    }

    /// Payload equality
    pub fn value_eq(&self, value: impl Into<String>) -> Filter {
        Filter::ValueEq(value.into())
    }

    /// Conjunction
    pub fn and(&self, lhs: Filter, rhs: Filter) -> Filter {
        Filter::And(Box::new(lhs), Box::new(rhs))
    }

    /// Every entity in the table.
    pub fn all(&self) -> Option<Filter> {
        None
    }

    /// Every entity in one partition.
    pub fn row(&self, partition_key: &str) -> Option<Filter> {
        Some(self.partition_key_eq(partition_key))
    }

    /// Every entity with one row key, across partitions.
    pub fn column(&self, row_key: &str) -> Option<Filter> {
        Some(self.row_key_eq(row_key))
    }

    /// Entities holding `value` anywhere in the table.
    pub fn value(&self, value: &str) -> Option<Filter> {
        Some(self.value_eq(value))
    }

    /// Entities holding `value` in one partition.
    pub fn value_in_row(&self, partition_key: &str, value: &str) -> Option<Filter> {
        Some(self.and(self.partition_key_eq(partition_key), self.value_eq(value)))
    }

    /// Entities holding `value` under one row key.
    pub fn value_in_column(&self, row_key: &str, value: &str) -> Option<Filter> {
        Some(self.and(self.row_key_eq(row_key), self.value_eq(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const Q: QueryBuilder = QueryBuilder;

    #[test]
    fn test_matches() {
        let entity = Entity::new("p", "r", "v");
        assert!(Q.partition_key_eq("p").matches(&entity));
        assert!(!Q.partition_key_eq("r").matches(&entity));
        assert!(Q.value_in_row("p", "v").unwrap().matches(&entity));
        assert!(!Q.value_in_row("p", "w").unwrap().matches(&entity));
        assert!(Q.value_in_column("r", "v").unwrap().matches(&entity));
        assert!(!Q.value_in_column("x", "v").unwrap().matches(&entity));
    }

    #[test]
    fn test_render() {
        assert_eq!(Q.partition_key_eq("cjE").to_string(), "PartitionKey eq 'cjE'");
        assert_eq!(
            Q.value_in_column("YzE", "djE").unwrap().to_string(),
            "(RowKey eq 'YzE') and (Value eq 'djE')"
        );
    }

    #[test]
    fn test_render_escapes_quotes() {
        assert_eq!(Q.value_eq("it's").to_string(), "Value eq 'it''s'");
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(Q.value_in_row("a", "b"), Q.value_in_row("a", "b"));
        assert_eq!(Q.all(), None);
    }

    #[test]
    fn test_partition_key_pin() {
        assert_eq!(Q.value_in_row("a", "b").unwrap().partition_key(), Some("a"));
        assert_eq!(Q.value_in_column("a", "b").unwrap().partition_key(), None);
    }
}
