//! geostats - Implicitly maintained statistics for geospatial record stores
//!
//! geostats keeps per-record-type aggregates (counts, bounding extents,
//! time ranges, histograms, distinct-count sketches) consistent with the
//! records of an embedding store as records are ingested and deleted.
//!
//! # Quick Start
//!
//! ```ignore
//! use geostats::{BindingSpec, EngineConfig, StatisticKind, StatisticsEngine};
//! use geostats::testing::MemoryRecordSource;
//!
//! let source = Arc::new(MemoryRecordSource::new());
//! let engine = StatisticsEngine::in_memory(source.clone(), EngineConfig::default())?;
//! engine.register_type("Station", &[BindingSpec::field(StatisticKind::bounding_extent("geom"))])?;
//!
//! source.insert(record.clone());
//! engine.ingest(&record)?;
//! ```
//!
//! # Architecture
//!
//! Invertible kinds (count, sum, histogram) absorb deletes by direct
//! retraction. The rest are marked dirty in the store and recomputed from
//! the current records; a dirty marker outlives a crash and `recover()`
//! finishes the work.
//!
//! Storage backends and algebras are pluggable through the
//! [`StatisticsStore`] and [`StatisticAlgebra`] traits.

pub use geostats_algebra::{
    builtin_algebra, AlgebraRegistry, HistogramResult, NumericBounds, StatResult, StatState,
    StatisticAlgebra,
};
pub use geostats_core::{
    BoundingBox, DeleteRequest, DeleteScope, Error, FieldValue, Freshness, KindParams, KindTag,
    Record, RecordId, RecordScan, RecordSource, RemovedRecords, Result, ScanQuery,
    StatisticEntry, StatisticId, StatisticKind, StatisticsStore, TimeRange, Version, Versioned,
};
pub use geostats_engine::*;
pub use geostats_storage::ShardedStatisticsStore;
