//! End-to-end scenarios over every built-in kind

use crate::common::*;
use geostats::{
    BoundingBox, EngineConfig, Freshness, Record, RecordId, StatResult, StatisticId,
    StatisticKind,
};
use std::thread;

#[test]
fn five_ingests_then_two_deletes() {
    let (engine, source) = station_engine(EngineConfig::default());
    for i in 0..5 {
        add(&engine, &source, station(i));
    }
    assert_eq!(result_of(&engine, &StatisticId::count(STATION)), StatResult::Count(5));

    let scope = source.delete_ids(STATION, &[RecordId::from("s00001"), RecordId::from("s00003")]);
    let outcome = engine.delete(&scope).unwrap();

    assert_eq!(result_of(&engine, &StatisticId::count(STATION)), StatResult::Count(3));
    // Invertible kinds retracted, the rest rebuilt
    assert_eq!(outcome.retracted.len(), 3);
    assert_eq!(outcome.dirty.len(), 4);
    let remaining: Vec<Record> = [0, 2, 4].into_iter().map(station).collect();
    assert_eq!(results(&engine, STATION), expected_results(&remaining));
}

#[test]
fn extent_shrinks_after_predicate_delete() {
    let (engine, source) = station_engine(EngineConfig::default());
    let geom = |id: &str, b: BoundingBox| {
        Record::new(id, STATION).with_field("geom", geostats::FieldValue::Envelope(b))
    };
    add(&engine, &source, geom("a", BoundingBox::new(0.0, 0.0, 1.0, 1.0)));
    add(&engine, &source, geom("b", BoundingBox::new(2.0, 2.0, 3.0, 3.0)));
    let extent = StatisticId::new(STATION, StatisticKind::bounding_extent("geom"), "geom");
    assert_eq!(
        result_of(&engine, &extent),
        StatResult::Extent(Some(BoundingBox::new(0.0, 0.0, 3.0, 3.0)))
    );

    let window = BoundingBox::new(2.0, 2.0, 10.0, 10.0);
    let scope = source.delete_matching(STATION, "BBOX(geom, 2, 2, 10, 10)", |r| {
        r.field("geom")
            .and_then(|v| v.as_envelope())
            .map_or(false, |b| b.intersects(&window))
    });
    engine.delete(&scope).unwrap();

    let snapshot = engine.statistic(&extent).unwrap().unwrap();
    assert_eq!(snapshot.freshness, Freshness::Clean);
    assert_eq!(
        snapshot.result().unwrap(),
        StatResult::Extent(Some(BoundingBox::new(0.0, 0.0, 1.0, 1.0)))
    );
}

#[test]
fn four_partitions_merge_to_sequential() {
    let records: Vec<Record> = (0..100).map(station).collect();
    let (engine, _) = station_engine(EngineConfig::default());

    let partials: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = records
            .chunks(25)
            .map(|part| {
                let engine = &engine;
                s.spawn(move || {
                    let mut partial = engine.partial();
                    partial.extend(part.iter()).unwrap();
                    partial
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    // Merge in reverse to exercise commutativity
    let mut merged = engine.partial();
    for partial in partials.into_iter().rev() {
        merged.merge(partial).unwrap();
    }
    engine.publish(merged).unwrap();

    let (sequential, _) = station_engine(EngineConfig::default());
    for record in &records {
        sequential.ingest(record).unwrap();
    }
    assert_eq!(results(&engine, STATION), results(&sequential, STATION));
}

#[test]
fn spatio_temporal_delete_matching_nothing() {
    let (engine, source) = station_engine(EngineConfig::default());
    for i in 0..10 {
        add(&engine, &source, station(i));
    }
    let before = engine.statistics_for(STATION).unwrap();

    let far_away = BoundingBox::new(500.0, 500.0, 600.0, 600.0);
    let scope = source.delete_matching(
        STATION,
        "BBOX(geom, 500, 500, 600, 600) AND observed DURING 1970/1971",
        |r| {
            r.field("geom")
                .and_then(|v| v.as_envelope())
                .map_or(false, |b| b.intersects(&far_away))
        },
    );
    let outcome = engine.delete(&scope).unwrap();

    assert!(outcome.is_noop());
    assert!(outcome.recompute.is_none());
    assert_eq!(engine.statistics_for(STATION).unwrap(), before);
    assert_eq!(engine.coordinator_stats().recomputes, 0);
}

#[test]
fn background_mode_matches_inline() {
    let (inline, inline_source) = station_engine(EngineConfig::default());
    let (background, background_source) = station_engine(EngineConfig::background(2));
    for i in 0..80 {
        add(&inline, &inline_source, station(i));
        add(&background, &background_source, station(i));
    }
    for modulus in [3u64, 5] {
        let pred = move |r: &Record| {
            r.field("depth").and_then(|v| v.as_i64()).unwrap_or(0) as u64 % modulus == 0
        };
        inline.delete(&inline_source.delete_matching(STATION, "depth % m = 0", pred)).unwrap();
        background
            .delete(&background_source.delete_matching(STATION, "depth % m = 0", pred))
            .unwrap();
    }
    background.drain();
    background.recover().unwrap();

    assert_eq!(results(&inline, STATION), results(&background, STATION));
    assert!(background.pending().unwrap().is_empty());
}
