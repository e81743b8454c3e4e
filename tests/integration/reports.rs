//! Verification reports

use crate::common::*;
use geostats::{EngineConfig, StatisticReport};

#[test]
fn report_rows_cover_every_binding() {
    let (engine, source) = station_engine(EngineConfig::default());
    for i in 0..12 {
        add(&engine, &source, station(i));
    }
    let rows: Vec<StatisticReport> = engine.statistics_for(STATION).unwrap();
    // Implicit count plus one row per field binding
    assert_eq!(rows.len(), station_specs().len() + 1);
    assert!(rows.iter().all(|r| r.record_type == STATION && r.freshness == "clean"));
    assert_eq!(rows[0].kind, "COUNT");
    assert_eq!(rows[0].extended_id, "");

    let versions: Vec<u64> = rows.iter().map(|r| r.version).collect();
    assert!(versions.iter().all(|v| *v > 0));
}

#[test]
fn report_serializes_to_json() {
    let (engine, source) = station_engine(EngineConfig::default());
    add(&engine, &source, station(3));
    let rows = engine.statistics_for(STATION).unwrap();
    let json = serde_json::to_value(&rows).unwrap();

    let count = &json[0];
    assert_eq!(count["kind"], "COUNT");
    assert_eq!(count["result"]["Count"], 1);
    assert_eq!(count["freshness"], "clean");

    let extent = json
        .as_array()
        .unwrap()
        .iter()
        .find(|row| row["kind"] == "BOUNDING_EXTENT(field=geom)")
        .unwrap();
    assert_eq!(extent["extended_id"], "geom");
}

#[test]
fn dirty_rows_are_reported_until_recovered() {
    let (engine, source) = station_engine(EngineConfig::default());
    for i in 0..4 {
        add(&engine, &source, station(i));
    }
    engine.shutdown();
    assert!(engine.recompute(STATION).is_err());
    let rows = engine.statistics_for(STATION).unwrap();
    assert!(rows.iter().all(|r| r.freshness == "dirty"));
    assert_eq!(engine.pending().unwrap().len(), rows.len());
}
