//! Update dispatcher: turns ingest and delete events into statistic writes
//!
//! Every write is a read-modify-write against the store under an optimistic
//! version check:
//!
//! ```text
//! get(id) ─► decode ─► mutate ─► encode ─► put(id, expected = read version)
//!   ▲                                          │
//!   └──────────── VersionConflict ◄────────────┘  (up to max_update_retries)
//! ```
//!
//! Deletes subtract from invertible statistics. Everything else is marked
//! dirty and handed to the consistency coordinator.
//!
//! One event fans out to several keys, each written on its own. When a write
//! fails after others succeeded, the keys not yet written are marked dirty
//! and the event fails with `PartiallyApplied`; replaying it would count it
//! twice in the keys already written.

use crate::catalog::{Binding, TypeCatalog};
use crate::config::{EngineConfig, RecomputeMode};
use crate::coordinator::{CancellationToken, ConsistencyCoordinator, Scheduled};
use crate::partial::PartialAggregator;
use crate::scheduler::{RecomputeScheduler, TaskPriority};
use crate::value::StatisticsValue;
use geostats_core::{
    DeleteScope, Error, Freshness, Record, RemovedRecords, Result, StatisticEntry, StatisticId,
    StatisticsStore, Version,
};
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

/// What a delete did to the statistics of its record type
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeleteOutcome {
    /// Statistics the removed records were subtracted from
    pub retracted: Vec<StatisticId>,
    /// Statistics marked dirty for recompute
    pub dirty: Vec<StatisticId>,
    /// Recompute status, if one was needed
    pub recompute: Option<Scheduled>,
}

impl DeleteOutcome {
    /// Check if the delete changed nothing
    pub fn is_noop(&self) -> bool {
        self.retracted.is_empty() && self.dirty.is_empty()
    }
}

/// Applies ingest and delete events to stored statistics
pub struct UpdateDispatcher {
    store: Arc<dyn StatisticsStore>,
    catalog: Arc<TypeCatalog>,
    coordinator: Arc<ConsistencyCoordinator>,
    scheduler: Option<Arc<RecomputeScheduler>>,
    max_update_retries: usize,
}

impl UpdateDispatcher {
    /// Create a dispatcher
    ///
    /// With a scheduler, recomputes run on its workers; without one they run
    /// inline.
    pub fn new(
        store: Arc<dyn StatisticsStore>,
        catalog: Arc<TypeCatalog>,
        coordinator: Arc<ConsistencyCoordinator>,
        scheduler: Option<Arc<RecomputeScheduler>>,
        config: &EngineConfig,
    ) -> Self {
        let scheduler = match config.recompute.mode {
            RecomputeMode::Background => scheduler,
            RecomputeMode::Inline => None,
        };
        UpdateDispatcher {
            store,
            catalog,
            coordinator,
            scheduler,
            max_update_retries: config.max_update_retries,
        }
    }

    /// Read-modify-write one statistic
    ///
    /// `mutate` sees the current value and its freshness, and runs again on
    /// a fresh read after every conflict. Freshness is written back as read.
    ///
    /// # Errors
    ///
    /// Returns `ContentionExceeded` after `max_update_retries` conflicts; any
    /// other error from the store or `mutate` is returned as is. The stored
    /// value is unchanged on error.
    pub fn update<F>(&self, binding: &Binding, mut mutate: F) -> Result<Version>
    where
        F: FnMut(&mut StatisticsValue, Freshness) -> Result<()>,
    {
        for attempt in 0..=self.max_update_retries {
            let (mut value, expected, freshness) = match self.store.get(&binding.id)? {
                Some(current) => (
                    StatisticsValue::decode(
                        binding.id.clone(),
                        Arc::clone(&binding.algebra),
                        &current.value.payload,
                    )?,
                    current.version,
                    current.value.freshness,
                ),
                None => (binding.identity_value()?, Version::ZERO, Freshness::Clean),
            };
            mutate(&mut value, freshness)?;
            let entry = StatisticEntry::with_freshness(value.encode()?, freshness);
            match self.store.put(binding.id.clone(), entry, expected) {
                Ok(version) => return Ok(version),
                Err(e) if e.is_retryable() => {
                    trace!(target: "geostats::dispatch", id = %binding.id, attempt, "Version conflict, retrying");
                }
                Err(e) => return Err(e),
            }
        }
        debug!(target: "geostats::dispatch", id = %binding.id, attempts = self.max_update_retries + 1, "Update gave up under contention");
        Err(Error::ContentionExceeded {
            id: binding.id.clone(),
            attempts: self.max_update_retries + 1,
        })
    }

    /// Write an event to each binding in order
    ///
    /// `write` gets the binding's position and the binding. A failure on the
    /// first binding is returned as is. A later failure marks that binding
    /// and every one after it dirty and returns `PartiallyApplied`.
    fn write_each<F>(&self, bindings: &[Binding], mut write: F) -> Result<()>
    where
        F: FnMut(usize, &Binding) -> Result<()>,
    {
        for (position, binding) in bindings.iter().enumerate() {
            if let Err(e) = write(position, binding) {
                if position == 0 {
                    return Err(e);
                }
                return Err(self.partially_applied(position, &bindings[position..], e));
            }
        }
        Ok(())
    }

    fn partially_applied(
        &self,
        applied: usize,
        unwritten: &[Binding],
        source: Error,
    ) -> Error {
        let dirty = match self.coordinator.mark_dirty(unwritten) {
            Ok(()) => unwritten.len(),
            Err(e) => {
                error!(
                    target: "geostats::dispatch",
                    first_unwritten = %unwritten[0].id,
                    error = %e,
                    "Could not mark unwritten statistics dirty, recompute the type"
                );
                0
            }
        };
        warn!(
            target: "geostats::dispatch",
            first_unwritten = %unwritten[0].id,
            applied,
            dirty,
            error = %source,
            "Event partially applied"
        );
        Error::PartiallyApplied {
            applied,
            dirty,
            source: Box::new(source),
        }
    }

    /// Fold one ingested record into every statistic it contributes to
    ///
    /// Returns the number of statistics written.
    ///
    /// # Errors
    ///
    /// Returns `PartiallyApplied` if some statistics were written before a
    /// failure; the record must not be ingested again.
    pub fn on_ingest(&self, record: &Record) -> Result<usize> {
        let bindings = self.catalog.bindings_for(&record.record_type)?;
        let applicable: Vec<Binding> = bindings.applicable(record).cloned().collect();
        self.write_each(&applicable, |_, binding| {
            self.update(binding, |value, _| value.apply(record)).map(|_| ())
        })?;
        let written = applicable.len();
        trace!(target: "geostats::dispatch", record_type = %record.record_type, id = %record.id, written, "Record ingested");
        Ok(written)
    }

    /// Fold a batch locally, then write each statistic once
    ///
    /// Returns the number of statistics written.
    pub fn on_ingest_batch(&self, records: &[Record]) -> Result<usize> {
        let mut partial = PartialAggregator::new(Arc::clone(&self.catalog));
        partial.extend(records)?;
        let written = self.publish(partial)?;
        debug!(target: "geostats::dispatch", records = records.len(), written, "Batch ingested");
        Ok(written)
    }

    /// Combine partial values into the stored statistics
    ///
    /// Values of statistics no longer in the catalog are skipped. Returns the
    /// number of statistics written.
    pub fn publish(&self, partial: PartialAggregator) -> Result<usize> {
        let mut bindings = Vec::new();
        let mut values = Vec::new();
        for partial_value in partial.into_values() {
            if !self.catalog.is_bound(partial_value.id()) {
                debug!(target: "geostats::dispatch", id = %partial_value.id(), "Skipping partial value of a dropped statistic");
                continue;
            }
            bindings.push(Binding {
                id: partial_value.id().clone(),
                algebra: Arc::clone(partial_value.algebra()),
            });
            values.push(partial_value);
        }
        self.write_each(&bindings, |position, binding| {
            let partial_value = &values[position];
            self.update(binding, |value, _| value.merge_from(partial_value)).map(|_| ())
        })?;
        Ok(bindings.len())
    }

    /// Bring the statistics of a record type in line with a delete
    ///
    /// An enumerated scope that removed nothing changes nothing. Removed
    /// records are subtracted from invertible statistics; non-invertible
    /// statistics they touched are marked dirty and recomputed. When the
    /// removed records are unknown, every statistic of the type is
    /// recomputed.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if a removed record belongs to another type.
    /// `PartiallyApplied` means some retractions were written and the rest
    /// marked dirty; the delete must not be dispatched again. A failed inline
    /// recompute returns its error with the keys left dirty; `recover()`
    /// finishes them.
    pub fn on_delete(&self, scope: &DeleteScope) -> Result<DeleteOutcome> {
        let mut outcome = DeleteOutcome::default();
        if scope.is_noop() {
            debug!(target: "geostats::dispatch", record_type = %scope.record_type, request = scope.request.label(), "Delete removed nothing");
            return Ok(outcome);
        }

        let bindings = self.catalog.bindings_for(&scope.record_type)?;
        let mut retract = Vec::new();
        let mut recompute = Vec::new();
        match &scope.removed {
            RemovedRecords::Enumerated(removed) => {
                if let Some(stray) = removed.iter().find(|r| r.record_type != scope.record_type) {
                    return Err(Error::TypeMismatch {
                        expected: scope.record_type.clone(),
                        actual: stray.record_type.clone(),
                    });
                }
                for binding in &bindings.bindings {
                    if !removed.iter().any(|r| binding.applies_to(r)) {
                        continue;
                    }
                    if binding.is_invertible() {
                        retract.push(binding.clone());
                    } else {
                        recompute.push(binding.clone());
                    }
                }
            }
            RemovedRecords::Unknown => recompute.extend(bindings.bindings.iter().cloned()),
        }

        // Persist the obligation before touching anything else
        self.coordinator.mark_dirty(&recompute)?;
        outcome.dirty = recompute.iter().map(|b| b.id.clone()).collect();

        if let Some(removed) = scope.removed_records() {
            self.write_each(&retract, |_, binding| {
                self.update(binding, |value, freshness| {
                    // A pending recompute rebuilds the value anyway
                    if freshness.is_dirty() {
                        return Ok(());
                    }
                    removed
                        .iter()
                        .filter(|r| binding.applies_to(r))
                        .try_for_each(|r| value.retract(r))
                })?;
                outcome.retracted.push(binding.id.clone());
                Ok(())
            })?;
        }

        debug!(
            target: "geostats::dispatch",
            record_type = %scope.record_type,
            request = scope.request.label(),
            retracted = outcome.retracted.len(),
            dirty = outcome.dirty.len(),
            "Delete dispatched"
        );

        if !recompute.is_empty() {
            outcome.recompute = Some(self.recompute(&scope.record_type, &recompute, TaskPriority::Normal)?);
        }
        Ok(outcome)
    }

    /// Run or schedule the recompute of already-dirty bindings
    pub fn recompute(
        &self,
        record_type: &str,
        bindings: &[Binding],
        priority: TaskPriority,
    ) -> Result<Scheduled> {
        match &self.scheduler {
            Some(scheduler) => self.coordinator.schedule(scheduler, record_type, priority),
            None => {
                let token: &CancellationToken = self.coordinator.shutdown_token();
                self.coordinator
                    .recompute_scope(record_type, bindings, token)
                    .map(Scheduled::Completed)
            }
        }
    }

    /// Restore a statistic to its identity value
    ///
    /// Freshness is kept as stored.
    pub fn reset(&self, binding: &Binding) -> Result<Version> {
        self.update(binding, |value, _| {
            value.reset();
            Ok(())
        })
    }
}

impl std::fmt::Debug for UpdateDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateDispatcher")
            .field("max_update_retries", &self.max_update_retries)
            .field("background", &self.scheduler.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::BindingSpec;
    use crate::testing::MemoryRecordSource;
    use crate::value::Statistics;
    use geostats_algebra::{AlgebraRegistry, StatResult};
    use geostats_core::{
        BoundingBox, DeleteRequest, FieldValue, RecordSource, StatisticKind,
    };
    use geostats_storage::testing::FaultInjectingStore;
    use geostats_storage::ShardedStatisticsStore;

    struct Fixture {
        store: Arc<FaultInjectingStore<ShardedStatisticsStore>>,
        source: Arc<MemoryRecordSource>,
        catalog: Arc<TypeCatalog>,
        dispatcher: UpdateDispatcher,
    }

    fn fixture_with(config: EngineConfig) -> Fixture {
        let store = Arc::new(FaultInjectingStore::new(ShardedStatisticsStore::new()));
        let dyn_store = Arc::clone(&store) as Arc<dyn StatisticsStore>;
        let source = Arc::new(MemoryRecordSource::new());
        let catalog = Arc::new(TypeCatalog::new(
            Arc::new(AlgebraRegistry::with_builtins()),
            Arc::clone(&dyn_store),
        ));
        catalog
            .register_type(
                "Station",
                &[
                    BindingSpec::field(StatisticKind::bounding_extent("geom")),
                    BindingSpec::field(StatisticKind::sum("pop")),
                ],
            )
            .unwrap();
        let coordinator = Arc::new(ConsistencyCoordinator::new(
            Arc::clone(&dyn_store),
            Arc::clone(&source) as Arc<dyn RecordSource>,
            Arc::clone(&catalog),
            &config,
        ));
        let dispatcher =
            UpdateDispatcher::new(dyn_store, Arc::clone(&catalog), coordinator, None, &config);
        Fixture {
            store,
            source,
            catalog,
            dispatcher,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(EngineConfig::default())
    }

    fn station(id: &str) -> Record {
        Record::new(id, "Station")
    }

    fn located(id: &str, x0: f64, y0: f64, x1: f64, y1: f64) -> Record {
        station(id).with_field(
            "geom",
            FieldValue::Envelope(BoundingBox::new(x0, y0, x1, y1)),
        )
    }

    fn result(f: &Fixture, id: &StatisticId) -> (StatResult, Freshness) {
        let binding = f.catalog.binding(id).unwrap();
        let entry = f.store.get(id).unwrap().unwrap();
        let value = StatisticsValue::decode(id.clone(), binding.algebra, &entry.value.payload).unwrap();
        (value.result().unwrap(), entry.value.freshness)
    }

    fn extent_id() -> StatisticId {
        StatisticId::new("Station", StatisticKind::bounding_extent("geom"), "geom")
    }

    /// Insert into the source, then notify, the way a collaborator does
    fn ingest(f: &Fixture, record: Record) {
        f.source.insert(record.clone());
        f.dispatcher.on_ingest(&record).unwrap();
    }

    #[test]
    fn test_ingest_counts() {
        let f = fixture();
        for i in 0..5 {
            ingest(&f, station(&format!("s{}", i)));
        }
        assert_eq!(result(&f, &StatisticId::count("Station")).0, StatResult::Count(5));
    }

    #[test]
    fn test_ingest_skips_statistics_without_field() {
        let f = fixture();
        let written = f.dispatcher.on_ingest(&station("s1")).unwrap();
        assert_eq!(written, 1);
        let written = f
            .dispatcher
            .on_ingest(&station("s2").with_field("pop", FieldValue::Int(10)))
            .unwrap();
        assert_eq!(written, 2);
    }

    #[test]
    fn test_delete_by_id_retracts_count() {
        let f = fixture();
        for i in 0..5 {
            ingest(&f, station(&format!("s{}", i)));
        }
        let scope = f.source.delete_ids("Station", &["s0".into(), "s1".into()]);
        let outcome = f.dispatcher.on_delete(&scope).unwrap();
        assert_eq!(outcome.retracted, vec![StatisticId::count("Station")]);
        assert!(outcome.dirty.is_empty());
        assert!(outcome.recompute.is_none());
        assert_eq!(
            result(&f, &StatisticId::count("Station")),
            (StatResult::Count(3), Freshness::Clean)
        );
    }

    #[test]
    fn test_predicate_delete_recomputes_extent() {
        let f = fixture();
        ingest(&f, located("a", 0.0, 0.0, 1.0, 1.0));
        ingest(&f, located("b", 2.0, 2.0, 3.0, 3.0));
        assert_eq!(
            result(&f, &extent_id()).0,
            StatResult::Extent(Some(BoundingBox::new(0.0, 0.0, 3.0, 3.0)))
        );

        let scope = f.source.delete_matching("Station", "id = 'b'", |r| r.id.as_str() == "b");
        let outcome = f.dispatcher.on_delete(&scope).unwrap();
        assert_eq!(outcome.dirty, vec![extent_id()]);
        assert!(matches!(outcome.recompute, Some(Scheduled::Completed(_))));
        assert_eq!(
            result(&f, &extent_id()),
            (
                StatResult::Extent(Some(BoundingBox::new(0.0, 0.0, 1.0, 1.0))),
                Freshness::Clean
            )
        );
        assert_eq!(result(&f, &StatisticId::count("Station")).0, StatResult::Count(1));
    }

    #[test]
    fn test_empty_delete_is_noop() {
        let f = fixture();
        ingest(&f, located("a", 0.0, 0.0, 1.0, 1.0));
        let before = f.store.get(&extent_id()).unwrap().unwrap().version;
        let scans = f.store.scan_count();

        let scope = f.source.delete_matching("Station", "depth > 100", |_| false);
        let outcome = f.dispatcher.on_delete(&scope).unwrap();
        assert!(outcome.is_noop());
        assert_eq!(f.store.get(&extent_id()).unwrap().unwrap().version, before);
        assert_eq!(f.store.scan_count(), scans);
    }

    #[test]
    fn test_unknown_scope_recomputes_everything() {
        let f = fixture();
        ingest(&f, located("a", 0.0, 0.0, 1.0, 1.0).with_field("pop", FieldValue::Int(5)));
        ingest(&f, located("b", 4.0, 4.0, 5.0, 5.0).with_field("pop", FieldValue::Int(7)));
        // Removed by a spatial constraint the collaborator could not enumerate
        f.source.remove("Station", &["b".into()]);
        let scope = DeleteScope::unresolved(
            "Station",
            DeleteRequest::SpatialTemporal {
                region: BoundingBox::new(3.0, 3.0, 6.0, 6.0),
                window: geostats_core::TimeRange::new(0, 10),
            },
        );
        let outcome = f.dispatcher.on_delete(&scope).unwrap();
        assert!(outcome.retracted.is_empty());
        assert_eq!(outcome.dirty.len(), 3);
        assert_eq!(result(&f, &StatisticId::count("Station")).0, StatResult::Count(1));
        let sum_id = StatisticId::new("Station", StatisticKind::sum("pop"), "pop");
        assert_eq!(result(&f, &sum_id).0, StatResult::Sum(5));
    }

    #[test]
    fn test_delete_rejects_foreign_records() {
        let f = fixture();
        let scope = DeleteScope::by_ids("Station", vec![Record::new("r1", "Road")]);
        assert!(matches!(
            f.dispatcher.on_delete(&scope),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_batch_matches_individual_ingest() {
        let batched = fixture();
        let single = fixture();
        let records: Vec<Record> = (0..30)
            .map(|i| {
                located(&format!("s{}", i), i as f64, 0.0, i as f64 + 1.0, 1.0)
                    .with_field("pop", FieldValue::Int(i))
            })
            .collect();
        let puts_before = batched.store.put_count();
        assert_eq!(batched.dispatcher.on_ingest_batch(&records).unwrap(), 3);
        assert_eq!(batched.store.put_count() - puts_before, 3);
        for record in &records {
            single.dispatcher.on_ingest(record).unwrap();
        }
        for id in [
            StatisticId::count("Station"),
            extent_id(),
            StatisticId::new("Station", StatisticKind::sum("pop"), "pop"),
        ] {
            assert_eq!(result(&batched, &id), result(&single, &id));
        }
    }

    #[test]
    fn test_conflicts_are_retried() {
        let f = fixture();
        f.store.inject_conflicts(3);
        f.dispatcher.on_ingest(&station("s1")).unwrap();
        assert_eq!(result(&f, &StatisticId::count("Station")).0, StatResult::Count(1));
    }

    #[test]
    fn test_contention_exceeded() {
        let mut config = EngineConfig::default();
        config.max_update_retries = 2;
        let f = fixture_with(config);
        f.store.inject_conflicts(3);
        let err = f.dispatcher.on_ingest(&station("s1")).unwrap_err();
        assert!(matches!(err, Error::ContentionExceeded { attempts: 3, .. }));
        assert!(err.is_transient());
        assert_eq!(result(&f, &StatisticId::count("Station")).0, StatResult::Count(0));
    }

    #[test]
    fn test_backend_failure_leaves_value_unchanged() {
        let f = fixture();
        ingest(&f, station("s1"));
        f.store.fail_next_puts(1);
        let err = f.dispatcher.on_ingest(&station("s2")).unwrap_err();
        assert!(matches!(err, Error::BackendUnavailable(_)));
        assert_eq!(result(&f, &StatisticId::count("Station")).0, StatResult::Count(1));
    }

    #[test]
    fn test_ingest_keeps_dirty_marker() {
        let f = fixture();
        let binding = f.catalog.binding(&extent_id()).unwrap();
        f.dispatcher.coordinator.mark_dirty(&[binding]).unwrap();
        f.dispatcher
            .on_ingest(&located("a", 0.0, 0.0, 1.0, 1.0))
            .unwrap();
        assert!(result(&f, &extent_id()).1.is_dirty());
    }

    #[test]
    fn test_reset_restores_identity() {
        let f = fixture();
        ingest(&f, station("s1"));
        let binding = f.catalog.binding(&StatisticId::count("Station")).unwrap();
        f.dispatcher.reset(&binding).unwrap();
        assert_eq!(result(&f, &StatisticId::count("Station")).0, StatResult::Count(0));
    }

    fn sum_id() -> StatisticId {
        StatisticId::new("Station", StatisticKind::sum("pop"), "pop")
    }

    #[test]
    fn test_ingest_failing_midway_marks_unwritten_dirty() {
        let f = fixture();
        ingest(&f, located("a", 0.0, 0.0, 1.0, 1.0).with_field("pop", FieldValue::Int(5)));
        let record = located("b", 2.0, 2.0, 3.0, 3.0).with_field("pop", FieldValue::Int(7));
        f.source.insert(record.clone());

        // First statistic written, second put fails
        f.store.fail_puts_after(1, 1);
        let err = f.dispatcher.on_ingest(&record).unwrap_err();
        assert!(matches!(err, Error::PartiallyApplied { applied: 1, dirty: 2, .. }));
        assert!(!err.is_transient());
        assert_eq!(f.dispatcher.coordinator.pending().unwrap().len(), 2);

        assert!(f.dispatcher.coordinator.recover().unwrap().is_complete());
        assert_eq!(
            result(&f, &StatisticId::count("Station")),
            (StatResult::Count(2), Freshness::Clean)
        );
        assert_eq!(result(&f, &sum_id()), (StatResult::Sum(12), Freshness::Clean));
        assert_eq!(
            result(&f, &extent_id()),
            (
                StatResult::Extent(Some(BoundingBox::new(0.0, 0.0, 3.0, 3.0))),
                Freshness::Clean
            )
        );
    }

    #[test]
    fn test_first_write_failure_is_plain_error() {
        let f = fixture();
        f.store.fail_next_puts(1);
        let err = f
            .dispatcher
            .on_ingest(&station("s1").with_field("pop", FieldValue::Int(3)))
            .unwrap_err();
        assert!(matches!(err, Error::BackendUnavailable(_)));
        assert!(f.dispatcher.coordinator.pending().unwrap().is_empty());
    }

    #[test]
    fn test_retract_failing_midway_marks_unwritten_dirty() {
        let f = fixture();
        for (id, pop) in [("a", 5), ("b", 7), ("c", 11)] {
            ingest(&f, station(id).with_field("pop", FieldValue::Int(pop)));
        }
        let scope = f.source.delete_ids("Station", &["c".into()]);

        f.store.fail_puts_after(1, 1);
        let err = f.dispatcher.on_delete(&scope).unwrap_err();
        assert!(matches!(err, Error::PartiallyApplied { applied: 1, dirty: 1, .. }));

        assert!(f.dispatcher.coordinator.recover().unwrap().is_complete());
        assert_eq!(
            result(&f, &StatisticId::count("Station")),
            (StatResult::Count(2), Freshness::Clean)
        );
        assert_eq!(result(&f, &sum_id()), (StatResult::Sum(12), Freshness::Clean));
    }

    #[test]
    fn test_publish_skips_dropped_statistics() {
        let f = fixture();
        let mut partial = PartialAggregator::new(Arc::clone(&f.catalog));
        partial
            .add(&station("s1").with_field("pop", FieldValue::Int(3)))
            .unwrap();
        f.catalog.drop_type("Station").unwrap();

        assert_eq!(f.dispatcher.publish(partial).unwrap(), 0);
        assert!(f.store.get(&StatisticId::count("Station")).unwrap().is_none());
        assert!(f.store.get(&sum_id()).unwrap().is_none());
    }
}
