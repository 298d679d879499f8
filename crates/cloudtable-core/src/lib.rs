//! CloudTable Core: entity store primitives
//!
//! The building blocks a two-key table adapter needs from a
//! partition-addressed cloud table service.
//!
//! # Architecture
//!
//! - **Entity**: the service's native record, (partition key, row key, value)
//! - **Codec**: reversible transcoding of arbitrary bytes into the key alphabet
//! - **Filter / QueryBuilder**: scan predicates and their textual rendering
//! - **TableClient**: point retrieve/upsert/delete and filtered scans
//! - **LocalTableService**: an in-process `TableClient`, optionally journaled
//!
//! # No Container Semantics Here
//!
//! This crate knows nothing about rows, columns or views. The container
//! adapter lives in `cloudtable-adapter`.

pub mod client;
pub mod codec;
pub mod config;
pub mod entity;
pub mod error;
pub mod filter;
pub mod format;
pub mod journal;
pub mod service;

// Re-export key types for convenience
pub use client::{EntityStream, TableClient, Upserted};
pub use codec::{Codec, CodecError, CodecResult};
pub use config::{Config, SyncMode};
pub use entity::Entity;
pub use error::{StoreError, StoreResult};
pub use filter::{Filter, QueryBuilder};
pub use service::LocalTableService;
