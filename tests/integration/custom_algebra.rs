//! A third-party kind registered next to the built-ins

use crate::common::*;
use geostats::{
    AlgebraRegistry, BindingSpec, EngineConfig, Error, FieldValue, KindParams, Record, Result,
    StatResult, StatState, StatisticAlgebra, StatisticId, StatisticKind,
};
use std::sync::Arc;

/// Deepest value seen; not invertible
#[derive(Debug)]
struct MaxDepth {
    kind: StatisticKind,
}

impl MaxDepth {
    fn new() -> Self {
        MaxDepth {
            kind: StatisticKind::custom("MAX_DEPTH", KindParams::field("depth")),
        }
    }

    fn decode(state: &StatState) -> Result<Option<i64>> {
        match state {
            StatState::Opaque(bytes) if bytes.is_empty() => Ok(None),
            StatState::Opaque(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| Error::Serialization("bad MAX_DEPTH state".into()))?;
                Ok(Some(i64::from_le_bytes(raw)))
            }
            other => Err(Error::InvalidOperation(format!("unexpected {}", other.shape()))),
        }
    }

    fn encode(value: Option<i64>) -> StatState {
        StatState::Opaque(value.map(|v| v.to_le_bytes().to_vec()).unwrap_or_default())
    }
}

impl StatisticAlgebra for MaxDepth {
    fn kind(&self) -> &StatisticKind {
        &self.kind
    }

    fn identity(&self) -> StatState {
        Self::encode(None)
    }

    fn apply(&self, state: &mut StatState, record: &Record) -> Result<()> {
        let Some(depth) = record.field("depth").and_then(FieldValue::as_i64) else {
            return Ok(());
        };
        let current = Self::decode(state)?;
        *state = Self::encode(Some(current.map_or(depth, |c| c.max(depth))));
        Ok(())
    }

    fn combine(&self, state: &mut StatState, other: &StatState) -> Result<()> {
        let merged = match (Self::decode(state)?, Self::decode(other)?) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        *state = Self::encode(merged);
        Ok(())
    }

    fn result(&self, state: &StatState) -> Result<StatResult> {
        Ok(StatResult::Opaque(match state {
            StatState::Opaque(bytes) => bytes.clone(),
            _ => Vec::new(),
        }))
    }
}

fn max_depth_id() -> StatisticId {
    StatisticId::new(STATION, MaxDepth::new().kind, "depth")
}

fn setup() -> (geostats::StatisticsEngine, Arc<geostats::testing::MemoryRecordSource>) {
    let registry = Arc::new(AlgebraRegistry::with_builtins());
    registry.register(Arc::new(MaxDepth::new())).unwrap();
    let (engine, source) = engine_with_registry(registry, EngineConfig::default());
    engine
        .register_type(STATION, &[BindingSpec::field(MaxDepth::new().kind)])
        .unwrap();
    (engine, source)
}

fn depth(id: &str, d: i64) -> Record {
    Record::new(id, STATION).with_field("depth", FieldValue::Int(d))
}

#[test]
fn custom_kind_is_maintained() {
    let (engine, source) = setup();
    for (id, d) in [("a", 40), ("b", 900), ("c", 12)] {
        add(&engine, &source, depth(id, d));
    }
    assert_eq!(
        result_of(&engine, &max_depth_id()),
        StatResult::Opaque(900i64.to_le_bytes().to_vec())
    );

    // Non-invertible: deleting the maximum forces a recompute
    let outcome = engine.delete(&source.delete_ids(STATION, &["b".into()])).unwrap();
    assert_eq!(outcome.dirty, vec![max_depth_id()]);
    assert_eq!(
        result_of(&engine, &max_depth_id()),
        StatResult::Opaque(40i64.to_le_bytes().to_vec())
    );
}

#[test]
fn duplicate_registration_rejected() {
    let registry = AlgebraRegistry::with_builtins();
    registry.register(Arc::new(MaxDepth::new())).unwrap();
    assert!(matches!(
        registry.register(Arc::new(MaxDepth::new())),
        Err(Error::DuplicateKind(_))
    ));
}

#[test]
fn unregistered_custom_kind_is_unknown() {
    let (engine, _) = engine_with_registry(
        Arc::new(AlgebraRegistry::with_builtins()),
        EngineConfig::default(),
    );
    let err = engine
        .register_type(STATION, &[BindingSpec::field(MaxDepth::new().kind)])
        .unwrap_err();
    assert!(matches!(err, Error::UnknownKind(_)));
}
