//! Core types and traits for geostats
//!
//! This crate defines the foundational types used throughout the system:
//! - StatisticKind: tag + parameters naming an aggregation function
//! - StatisticId: (record type, kind, extended id) identity triple
//! - Record / FieldValue: collaborator-supplied records
//! - DeleteScope: delete requests resolved to a record type
//! - Version / Versioned<T>: per-key optimistic versioning
//! - StatisticEntry / Freshness: persisted entry layout
//! - Error: Error type hierarchy
//! - Traits: StatisticsStore, RecordSource

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod entry;
pub mod error;
pub mod kind;
pub mod record;
pub mod traits;
pub mod types;
pub mod version;

pub use entry::{Freshness, StatisticEntry};
pub use error::{Error, Result};
pub use kind::{KindParams, KindTag, StatisticKind};
pub use record::{DeleteRequest, DeleteScope, FieldValue, Record, RecordId, RemovedRecords};
pub use traits::{RecordScan, RecordSource, ScanQuery, StatisticScan, StatisticsStore};
pub use types::{BoundingBox, StatisticId, TimeRange};
pub use version::{Version, Versioned};
