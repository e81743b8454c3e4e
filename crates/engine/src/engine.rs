//! Statistics engine: the embedding surface
//!
//! Wires the algebra registry, type catalog, store, record source,
//! dispatcher and coordinator together.
//!
//! # Example
//!
//! ```ignore
//! let source = Arc::new(MemoryRecordSource::new());
//! let engine = StatisticsEngine::in_memory(source.clone(), EngineConfig::default())?;
//! engine.register_type("Station", &[BindingSpec::field(StatisticKind::bounding_extent("geom"))])?;
//!
//! source.insert(record.clone());
//! engine.ingest(&record)?;
//!
//! for row in engine.statistics_for("Station")? {
//!     println!("{} {} {:?}", row.kind, row.freshness, row.result);
//! }
//! ```
//!
//! The collaborator owns the records: it adds a record to the source before
//! calling `ingest`, and removes records before calling `delete`.

use crate::catalog::{BindingSpec, TypeCatalog};
use crate::config::{EngineConfig, RecomputeMode};
use crate::coordinator::{ConsistencyCoordinator, CoordinatorStats, RecoveryReport, Scheduled};
use crate::dispatcher::{DeleteOutcome, UpdateDispatcher};
use crate::partial::PartialAggregator;
use crate::scheduler::{RecomputeScheduler, SchedulerStats, TaskPriority};
use crate::value::{Statistics, StatisticsValue};
use geostats_algebra::{AlgebraRegistry, StatResult};
use geostats_core::{
    DeleteScope, Freshness, Record, RecordSource, Result, ScanQuery, StatisticId, StatisticKind,
    StatisticsStore, Version,
};
use geostats_storage::ShardedStatisticsStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Current value of one statistic
#[derive(Debug, Clone)]
pub struct StatisticSnapshot {
    /// Decoded value
    pub value: StatisticsValue,
    /// Whether a recompute is owed
    pub freshness: Freshness,
    /// Store version the value was read at
    pub version: Version,
}

impl StatisticSnapshot {
    /// Materialized result
    pub fn result(&self) -> Result<StatResult> {
        self.value.result()
    }
}

/// One statistic as shown by verification tooling
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticReport {
    /// Record type
    pub record_type: String,
    /// Canonical kind form
    pub kind: String,
    /// Field or index disambiguator
    pub extended_id: String,
    /// Materialized result, absent if the value cannot be decoded
    pub result: Option<StatResult>,
    /// Why the value cannot be decoded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// `clean` or `dirty`
    pub freshness: String,
    /// Store version
    pub version: u64,
}

/// Embedded statistics maintenance engine
pub struct StatisticsEngine {
    config: EngineConfig,
    registry: Arc<AlgebraRegistry>,
    store: Arc<dyn StatisticsStore>,
    catalog: Arc<TypeCatalog>,
    coordinator: Arc<ConsistencyCoordinator>,
    dispatcher: UpdateDispatcher,
    scheduler: Option<Arc<RecomputeScheduler>>,
}

impl StatisticsEngine {
    /// Create an engine over a store and record source
    ///
    /// Uses the process-wide algebra registry.
    pub fn new(
        store: Arc<dyn StatisticsStore>,
        source: Arc<dyn RecordSource>,
        config: EngineConfig,
    ) -> Result<Self> {
        Self::with_registry(store, source, AlgebraRegistry::global(), config)
    }

    /// Create an engine with its statistics in a fresh in-memory store
    pub fn in_memory(source: Arc<dyn RecordSource>, config: EngineConfig) -> Result<Self> {
        Self::new(Arc::new(ShardedStatisticsStore::new()), source, config)
    }

    /// Create an engine with an explicit algebra registry
    pub fn with_registry(
        store: Arc<dyn StatisticsStore>,
        source: Arc<dyn RecordSource>,
        registry: Arc<AlgebraRegistry>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        let catalog = Arc::new(TypeCatalog::new(Arc::clone(&registry), Arc::clone(&store)));
        let coordinator = Arc::new(ConsistencyCoordinator::new(
            Arc::clone(&store),
            source,
            Arc::clone(&catalog),
            &config,
        ));
        let scheduler = match config.recompute.mode {
            RecomputeMode::Background => Some(Arc::new(RecomputeScheduler::new(
                config.recompute.workers,
                config.recompute.queue_depth,
            )?)),
            RecomputeMode::Inline => None,
        };
        let dispatcher = UpdateDispatcher::new(
            Arc::clone(&store),
            Arc::clone(&catalog),
            Arc::clone(&coordinator),
            scheduler.clone(),
            &config,
        );
        info!(
            target: "geostats::engine",
            mode = ?config.recompute.mode,
            max_update_retries = config.max_update_retries,
            "Statistics engine started"
        );
        Ok(StatisticsEngine {
            config,
            registry,
            store,
            catalog,
            coordinator,
            dispatcher,
            scheduler,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Algebra registry in use
    pub fn registry(&self) -> &Arc<AlgebraRegistry> {
        &self.registry
    }

    /// Type catalog
    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        &self.catalog
    }

    /// Statistics store
    pub fn store(&self) -> &Arc<dyn StatisticsStore> {
        &self.store
    }

    // ========================================================================
    // Lifecycle of record types and indexes
    // ========================================================================

    /// Declare the statistics maintained for a record type
    pub fn register_type(&self, record_type: &str, specs: &[BindingSpec]) -> Result<Vec<StatisticId>> {
        self.catalog.register_type(record_type, specs)
    }

    /// Add index-scoped statistics
    pub fn add_index(
        &self,
        record_type: &str,
        index_name: &str,
        kinds: &[StatisticKind],
    ) -> Result<Vec<StatisticId>> {
        self.catalog.add_index(record_type, index_name, kinds)
    }

    /// Remove a record type and its statistics
    pub fn drop_type(&self, record_type: &str) -> Result<usize> {
        self.catalog.drop_type(record_type)
    }

    /// Remove an index and its statistics
    pub fn drop_index(&self, record_type: &str, index_name: &str) -> Result<usize> {
        self.catalog.drop_index(record_type, index_name)
    }

    // ========================================================================
    // Record events
    // ========================================================================

    /// Account for one ingested record
    pub fn ingest(&self, record: &Record) -> Result<usize> {
        self.dispatcher.on_ingest(record)
    }

    /// Account for a batch of ingested records with one write per statistic
    pub fn ingest_batch(&self, records: &[Record]) -> Result<usize> {
        self.dispatcher.on_ingest_batch(records)
    }

    /// Account for a resolved delete
    pub fn delete(&self, scope: &DeleteScope) -> Result<DeleteOutcome> {
        self.dispatcher.on_delete(scope)
    }

    /// Empty partial aggregator for off-store folding
    pub fn partial(&self) -> PartialAggregator {
        PartialAggregator::new(Arc::clone(&self.catalog))
    }

    /// Combine partial aggregates into the stored statistics
    pub fn publish(&self, partial: PartialAggregator) -> Result<usize> {
        self.dispatcher.publish(partial)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Current value of a statistic
    pub fn statistic(&self, id: &StatisticId) -> Result<Option<StatisticSnapshot>> {
        let Some(entry) = self.store.get(id)? else {
            return Ok(None);
        };
        let binding = self.catalog.binding(id)?;
        let value = StatisticsValue::decode(id.clone(), binding.algebra, &entry.value.payload)?;
        Ok(Some(StatisticSnapshot {
            value,
            freshness: entry.value.freshness,
            version: entry.version,
        }))
    }

    /// Every stored statistic of a record type, in identity order
    ///
    /// A value whose kind is not registered, or whose payload does not
    /// decode, is reported with its error instead of a result.
    pub fn statistics_for(&self, record_type: &str) -> Result<Vec<StatisticReport>> {
        let mut rows = Vec::new();
        for item in self.store.scan(&ScanQuery::record_type(record_type))? {
            let (id, entry) = item?;
            let decoded = self
                .catalog
                .binding(&id)
                .and_then(|binding| {
                    StatisticsValue::decode(id.clone(), binding.algebra, &entry.value.payload)
                })
                .and_then(|value| value.result());
            let (result, error) = match decoded {
                Ok(result) => (Some(result), None),
                Err(e) => {
                    warn!(target: "geostats::engine", id = %id, error = %e, "Stored statistic cannot be decoded");
                    (None, Some(e.to_string()))
                }
            };
            rows.push(StatisticReport {
                record_type: id.record_type.clone(),
                kind: id.kind.to_string(),
                extended_id: id.extended_id.clone(),
                result,
                error,
                freshness: entry.value.freshness.to_string(),
                version: entry.version.as_u64(),
            });
        }
        Ok(rows)
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Restore a statistic to its identity value
    pub fn reset(&self, id: &StatisticId) -> Result<Version> {
        let binding = self.catalog.binding(id)?;
        self.dispatcher.reset(&binding)
    }

    /// Recompute every statistic of a record type from the current records
    ///
    /// For bulk re-ingest or after suspected drift.
    pub fn recompute(&self, record_type: &str) -> Result<Scheduled> {
        let bindings = self.catalog.bindings_for(record_type)?;
        self.coordinator.mark_dirty(&bindings.bindings)?;
        self.dispatcher
            .recompute(record_type, &bindings.bindings, TaskPriority::High)
    }

    /// Recompute every dirty statistic left by an interrupted run
    pub fn recover(&self) -> Result<RecoveryReport> {
        self.coordinator.recover()
    }

    /// Identities of statistics currently dirty
    pub fn pending(&self) -> Result<Vec<StatisticId>> {
        self.coordinator.pending()
    }

    /// Wait for queued background recomputes to finish
    pub fn drain(&self) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.drain();
        }
    }

    /// Cancel in-flight recomputes and stop the workers
    ///
    /// Statistics whose recompute did not finish stay dirty for `recover()`.
    /// Idempotent.
    pub fn shutdown(&self) {
        self.coordinator.cancel_all();
        if let Some(scheduler) = &self.scheduler {
            scheduler.shutdown();
        }
    }

    /// Coordinator counters
    pub fn coordinator_stats(&self) -> CoordinatorStats {
        self.coordinator.stats()
    }

    /// Worker pool counters, in background mode
    pub fn scheduler_stats(&self) -> Option<SchedulerStats> {
        self.scheduler.as_ref().map(|s| s.stats())
    }
}

impl Drop for StatisticsEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for StatisticsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatisticsEngine")
            .field("mode", &self.config.recompute.mode)
            .field("catalog", &self.catalog)
            .field("coordinator", &self.coordinator)
            .finish()
    }
}
