//! Shared test utilities for the integration suites.
//!
//! Import via `mod common;` from a test's main.rs.

#![allow(dead_code)]

use geostats::testing::MemoryRecordSource;
use geostats::{
    AlgebraRegistry, BindingSpec, BoundingBox, EngineConfig, FieldValue, Record, RecordSource,
    ShardedStatisticsStore, StatResult, StatisticId, StatisticKind, StatisticsEngine, TimeRange,
};
use std::sync::Arc;

pub const STATION: &str = "Station";

/// Every built-in kind that reads a Station field
pub fn station_specs() -> Vec<BindingSpec> {
    vec![
        BindingSpec::field(StatisticKind::bounding_extent("geom")),
        BindingSpec::field(StatisticKind::time_range("observed")),
        BindingSpec::field(StatisticKind::sum("depth")),
        BindingSpec::field(StatisticKind::numeric_range("depth")),
        BindingSpec::field(StatisticKind::histogram("depth", 8, 0, 800)),
        BindingSpec::field(StatisticKind::distinct_count("operator", 10)),
    ]
}

/// Engine over a fresh in-memory store with its own registry
pub fn engine_with_registry(
    registry: Arc<AlgebraRegistry>,
    config: EngineConfig,
) -> (StatisticsEngine, Arc<MemoryRecordSource>) {
    let source = Arc::new(MemoryRecordSource::new());
    let engine = StatisticsEngine::with_registry(
        Arc::new(ShardedStatisticsStore::new()),
        Arc::clone(&source) as Arc<dyn RecordSource>,
        registry,
        config,
    )
    .unwrap();
    (engine, source)
}

/// Engine with Station registered for every built-in kind
pub fn station_engine(config: EngineConfig) -> (StatisticsEngine, Arc<MemoryRecordSource>) {
    let (engine, source) = engine_with_registry(Arc::new(AlgebraRegistry::with_builtins()), config);
    engine.register_type(STATION, &station_specs()).unwrap();
    (engine, source)
}

/// Deterministic Station record
pub fn station(i: u64) -> Record {
    let x = (i % 50) as f64;
    let y = (i % 7) as f64;
    Record::new(format!("s{:05}", i), STATION)
        .with_field("geom", FieldValue::Envelope(BoundingBox::new(x, y, x + 1.0, y + 1.0)))
        .with_field("observed", FieldValue::Time(TimeRange::instant(1_000 + i as i64)))
        .with_field("depth", FieldValue::Int((i * 37 % 800) as i64))
        .with_field("operator", FieldValue::Text(format!("op{}", i % 9)))
}

/// Insert into the record store, then tell the engine
pub fn add(engine: &StatisticsEngine, source: &MemoryRecordSource, record: Record) {
    source.insert(record.clone());
    engine.ingest(&record).unwrap();
}

/// (kind, result) rows of a record type, in identity order
pub fn results(engine: &StatisticsEngine, record_type: &str) -> Vec<(String, StatResult)> {
    engine
        .statistics_for(record_type)
        .unwrap()
        .into_iter()
        .map(|row| (row.kind, row.result.unwrap()))
        .collect()
}

pub fn result_of(engine: &StatisticsEngine, id: &StatisticId) -> StatResult {
    engine.statistic(id).unwrap().unwrap().result().unwrap()
}

/// Results a fresh engine computes from exactly `records`
pub fn expected_results(records: &[Record]) -> Vec<(String, StatResult)> {
    let (fresh, _) = station_engine(EngineConfig::default());
    fresh.ingest_batch(records).unwrap();
    results(&fresh, STATION)
}
