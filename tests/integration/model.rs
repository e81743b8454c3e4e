//! Model-based test: whatever the ingest/delete history, stored statistics
//! equal a fresh fold over the records that remain.

use crate::common::*;
use geostats::{EngineConfig, Record, RecordId};
use proptest::prelude::*;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
enum Op {
    Ingest(u64),
    DeleteIds(Vec<u64>),
    DeleteDeeperThan(i64),
    IngestBatch(Vec<u64>),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u64..60).prop_map(Op::Ingest),
        2 => prop::collection::vec(0u64..60, 1..6).prop_map(Op::DeleteIds),
        1 => (0i64..800).prop_map(Op::DeleteDeeperThan),
        1 => prop::collection::vec(0u64..60, 1..10).prop_map(Op::IngestBatch),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn history_matches_fresh_fold(ops in prop::collection::vec(op(), 1..30)) {
        let (engine, source) = station_engine(EngineConfig::default());
        let mut model: BTreeMap<u64, Record> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Ingest(i) => {
                    // Ingest is for new records only
                    if !model.contains_key(&i) {
                        model.insert(i, station(i));
                        add(&engine, &source, station(i));
                    }
                }
                Op::IngestBatch(ids) => {
                    let mut batch = Vec::new();
                    for i in ids {
                        if !model.contains_key(&i) {
                            model.insert(i, station(i));
                            source.insert(station(i));
                            batch.push(station(i));
                        }
                    }
                    engine.ingest_batch(&batch).unwrap();
                }
                Op::DeleteIds(ids) => {
                    let ids: Vec<RecordId> = ids.iter().map(|i| station(*i).id).collect();
                    model.retain(|_, r| !ids.contains(&r.id));
                    engine.delete(&source.delete_ids(STATION, &ids)).unwrap();
                }
                Op::DeleteDeeperThan(limit) => {
                    let deeper = move |r: &Record| {
                        r.field("depth").and_then(|v| v.as_i64()).unwrap_or(0) > limit
                    };
                    model.retain(|_, r| !deeper(r));
                    engine
                        .delete(&source.delete_matching(STATION, "depth > limit", deeper))
                        .unwrap();
                }
            }
        }

        let remaining: Vec<Record> = model.into_values().collect();
        prop_assert_eq!(results(&engine, STATION), expected_results(&remaining));
        prop_assert!(engine.pending().unwrap().is_empty());
    }
}
