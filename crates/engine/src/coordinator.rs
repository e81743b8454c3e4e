//! Consistency coordinator: recompute of statistics deletes cannot subtract
//!
//! When a delete hits a non-invertible statistic (or the removed records
//! are unknown), the statistic is marked `Dirty` in the store and rebuilt
//! from the records still present:
//!
//! ```text
//! Dirty ──► Scanning ──► Replacing ──► Clean
//!              ▲              │
//!              └── conflict ──┘   (bounded by max_rescans)
//! ```
//!
//! # Crash safety
//!
//! The dirty marker is persisted before any recompute starts, and the
//! replace is one versioned write per key that also marks it clean. A
//! recompute interrupted at any point leaves the key dirty with either its
//! old or its new value; `recover()` finds dirty keys and recomputes them.
//! Recompute is a pure function of the current records, so running it
//! twice is harmless.
//!
//! # Concurrency
//!
//! Versions are read before the scan. Any ingest or delete that lands on a
//! key after that read changes its version, so the replace write conflicts
//! and the key is re-scanned instead of losing the update.

use crate::catalog::{Binding, TypeCatalog};
use crate::config::EngineConfig;
use crate::retry::RetryConfig;
use crate::scheduler::{RecomputeScheduler, TaskPriority};
use crate::value::StatisticsValue;
use geostats_core::{
    Error, Result, RecordSource, ScanQuery, StatisticEntry, StatisticId, StatisticsStore,
    Version,
};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Cooperative cancellation flag shared between a recompute and its owner
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create an uncancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Check if cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Phase of a recompute task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    /// Recompute owed, not started
    Dirty,
    /// Folding the current records
    Scanning,
    /// Writing recomputed values
    Replacing,
    /// All keys replaced and marked clean
    Clean,
}

impl fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskPhase::Dirty => "dirty",
            TaskPhase::Scanning => "scanning",
            TaskPhase::Replacing => "replacing",
            TaskPhase::Clean => "clean",
        };
        f.write_str(name)
    }
}

/// Outcome of a completed recompute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecomputeReport {
    /// Record type recomputed
    pub record_type: String,
    /// Keys replaced and marked clean
    pub recomputed: Vec<StatisticId>,
    /// Records folded, summed over all scans
    pub records_scanned: usize,
    /// Scans repeated because a key changed mid-recompute
    pub rescans: usize,
}

/// What happened to a recompute request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scheduled {
    /// Ran to completion on the calling thread
    Completed(RecomputeReport),
    /// Submitted to the worker pool
    Queued,
    /// A queued task for the same record type will pick the keys up
    Coalesced,
}

/// Outcome of a crash-recovery sweep
#[derive(Debug, Default)]
pub struct RecoveryReport {
    /// Record types recomputed successfully
    pub recomputed: Vec<RecomputeReport>,
    /// Record types whose recompute failed; their keys stay dirty
    pub failed: Vec<(String, Error)>,
}

impl RecoveryReport {
    /// Number of keys made clean
    pub fn keys_recomputed(&self) -> usize {
        self.recomputed.iter().map(|r| r.recomputed.len()).sum()
    }

    /// Check if every dirty key was recomputed
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Coordinator counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoordinatorStats {
    /// Recomputes that reached `Clean`
    pub recomputes: u64,
    /// Re-scans after replace conflicts
    pub rescans: u64,
    /// Recomputes stopped by cancellation
    pub cancelled: u64,
}

/// Keeps non-invertible statistics equal to the fold over current records
pub struct ConsistencyCoordinator {
    store: Arc<dyn StatisticsStore>,
    source: Arc<dyn RecordSource>,
    catalog: Arc<TypeCatalog>,
    retry: RetryConfig,
    max_update_retries: usize,
    cancel_check_interval: usize,
    max_rescans: usize,
    /// Record types with a background task queued but not started
    queued: Mutex<FxHashSet<String>>,
    /// Cancelled on shutdown
    shutdown: CancellationToken,
    recomputes: AtomicU64,
    rescans: AtomicU64,
    cancelled: AtomicU64,
}

impl ConsistencyCoordinator {
    /// Create a coordinator
    pub fn new(
        store: Arc<dyn StatisticsStore>,
        source: Arc<dyn RecordSource>,
        catalog: Arc<TypeCatalog>,
        config: &EngineConfig,
    ) -> Self {
        ConsistencyCoordinator {
            store,
            source,
            catalog,
            retry: config.retry.clone(),
            max_update_retries: config.max_update_retries,
            cancel_check_interval: config.recompute.cancel_check_interval.max(1),
            max_rescans: config.recompute.max_rescans,
            queued: Mutex::new(FxHashSet::default()),
            shutdown: CancellationToken::new(),
            recomputes: AtomicU64::new(0),
            rescans: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
        }
    }

    /// Token cancelled when the engine shuts down
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Cancel running and future recomputes that use the shutdown token
    pub fn cancel_all(&self) {
        self.shutdown.cancel();
    }

    /// Snapshot of counters
    pub fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            recomputes: self.recomputes.load(Ordering::Relaxed),
            rescans: self.rescans.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }

    /// Persist the dirty marker on each key
    ///
    /// Absent keys are created holding the identity value, dirty. Keys
    /// already dirty are rewritten unchanged so their version moves: a
    /// recompute that read the old version may have scanned records this
    /// delete removed, and must conflict.
    ///
    /// # Errors
    ///
    /// Returns `ContentionExceeded` if a key keeps changing underneath, or
    /// a backend error.
    pub fn mark_dirty(&self, bindings: &[Binding]) -> Result<()> {
        for binding in bindings {
            self.mark_one_dirty(binding)?;
        }
        Ok(())
    }

    fn mark_one_dirty(&self, binding: &Binding) -> Result<()> {
        for _ in 0..=self.max_update_retries {
            let (entry, expected) = match self.store.get(&binding.id)? {
                Some(current) => (current.value.into_dirty(), current.version),
                None => {
                    let payload = binding.identity_value()?.encode()?;
                    (StatisticEntry::clean(payload).into_dirty(), Version::ZERO)
                }
            };
            match self.store.put(binding.id.clone(), entry, expected) {
                Ok(_) => {
                    debug!(target: "geostats::recompute", id = %binding.id, "Statistic marked dirty");
                    return Ok(());
                }
                Err(e) if e.is_retryable() => continue,
                Err(e) => return Err(e),
            }
        }
        Err(Error::ContentionExceeded {
            id: binding.id.clone(),
            attempts: self.max_update_retries + 1,
        })
    }

    /// Rebuild `bindings` from the records currently present
    ///
    /// Scans the record type once per round, folds every pending key from
    /// its identity, and replaces each key with a versioned write that marks
    /// it clean. Keys that changed during the round are re-scanned, at most
    /// `max_rescans` times.
    ///
    /// # Errors
    ///
    /// - `Cancelled` if `cancel` fires; keys stay dirty
    /// - `ContentionExceeded` if keys keep changing past `max_rescans`
    /// - `BackendUnavailable` once backoff retries are exhausted
    /// - `InvalidOperation` if a binding belongs to another record type
    pub fn recompute_scope(
        &self,
        record_type: &str,
        bindings: &[Binding],
        cancel: &CancellationToken,
    ) -> Result<RecomputeReport> {
        if let Some(stray) = bindings.iter().find(|b| b.id.record_type != record_type) {
            return Err(Error::InvalidOperation(format!(
                "{} is not a statistic of '{}'",
                stray.id, record_type
            )));
        }

        let mut report = RecomputeReport {
            record_type: record_type.to_string(),
            recomputed: Vec::new(),
            records_scanned: 0,
            rescans: 0,
        };
        let mut pending: Vec<Binding> = bindings.to_vec();
        let mut phase = TaskPhase::Dirty;

        while !pending.is_empty() {
            self.check_cancelled(cancel, record_type, phase)?;

            // Versions first: anything written after this read must conflict
            let mut observed = Vec::with_capacity(pending.len());
            for binding in pending.drain(..) {
                let version = self
                    .retry
                    .run("get", || self.store.get(&binding.id))?
                    .map(|v| v.version)
                    .unwrap_or(Version::ZERO);
                // Dropped while dirty: nothing to rebuild
                if version.is_zero() && !self.catalog.is_bound(&binding.id) {
                    continue;
                }
                observed.push((binding, version));
            }
            if observed.is_empty() {
                break;
            }

            phase = TaskPhase::Scanning;
            debug!(target: "geostats::recompute", record_type, keys = observed.len(), %phase, "Recompute scanning");
            let (values, scanned) = self.retry.run("scan", || {
                self.fold_current(record_type, &observed, cancel)
            })?;
            report.records_scanned += scanned;

            phase = TaskPhase::Replacing;
            self.check_cancelled(cancel, record_type, phase)?;
            for ((binding, version), value) in observed.into_iter().zip(values) {
                let entry = StatisticEntry::clean(value.encode()?);
                match self
                    .retry
                    .run("put", || self.store.put(binding.id.clone(), entry.clone(), version))
                {
                    Ok(_) => report.recomputed.push(binding.id),
                    Err(Error::VersionConflict { .. }) => pending.push(binding),
                    Err(e) => return Err(e),
                }
            }

            if !pending.is_empty() {
                if report.rescans >= self.max_rescans {
                    let id = pending[0].id.clone();
                    warn!(
                        target: "geostats::recompute",
                        record_type,
                        keys = pending.len(),
                        rescans = report.rescans,
                        "Recompute abandoned, keys stay dirty"
                    );
                    return Err(Error::ContentionExceeded {
                        id,
                        attempts: report.rescans + 1,
                    });
                }
                report.rescans += 1;
                self.rescans.fetch_add(1, Ordering::Relaxed);
                debug!(target: "geostats::recompute", record_type, keys = pending.len(), "Keys changed during recompute, rescanning");
            }
        }

        self.recomputes.fetch_add(1, Ordering::Relaxed);
        info!(
            target: "geostats::recompute",
            record_type,
            keys = report.recomputed.len(),
            records = report.records_scanned,
            rescans = report.rescans,
            phase = %TaskPhase::Clean,
            "Recompute finished"
        );
        Ok(report)
    }

    fn check_cancelled(
        &self,
        cancel: &CancellationToken,
        record_type: &str,
        phase: TaskPhase,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            self.cancelled.fetch_add(1, Ordering::Relaxed);
            info!(target: "geostats::recompute", record_type, %phase, "Recompute cancelled, keys stay dirty");
            return Err(Error::Cancelled(format!(
                "recompute of '{}' cancelled while {}",
                record_type, phase
            )));
        }
        Ok(())
    }

    /// One pass over the current records, folding every observed key
    fn fold_current(
        &self,
        record_type: &str,
        observed: &[(Binding, Version)],
        cancel: &CancellationToken,
    ) -> Result<(Vec<StatisticsValue>, usize)> {
        let mut values = observed
            .iter()
            .map(|(binding, _)| binding.identity_value())
            .collect::<Result<Vec<_>>>()?;
        let mut scanned = 0usize;
        for record in self.source.scan(record_type)? {
            let record = record?;
            for ((binding, _), value) in observed.iter().zip(values.iter_mut()) {
                if binding.applies_to(&record) {
                    value.apply(&record)?;
                }
            }
            scanned += 1;
            if scanned % self.cancel_check_interval == 0 {
                self.check_cancelled(cancel, record_type, TaskPhase::Scanning)?;
            }
        }
        Ok((values, scanned))
    }

    /// Dirty keys of one record type
    pub fn dirty_keys(&self, record_type: &str) -> Result<Vec<StatisticId>> {
        let mut ids = Vec::new();
        for item in self.store.scan(&ScanQuery::record_type(record_type))? {
            let (id, entry) = item?;
            if entry.value.freshness.is_dirty() {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Every dirty key in the store
    pub fn pending(&self) -> Result<Vec<StatisticId>> {
        let mut ids = Vec::new();
        for record_type in self.store.record_types()? {
            ids.extend(self.dirty_keys(&record_type)?);
        }
        Ok(ids)
    }

    /// Recompute every dirty key of a record type
    pub fn recompute_dirty(
        &self,
        record_type: &str,
        cancel: &CancellationToken,
    ) -> Result<RecomputeReport> {
        let bindings = self
            .dirty_keys(record_type)?
            .into_iter()
            .map(|id| self.catalog.binding(&id))
            .collect::<Result<Vec<_>>>()?;
        self.recompute_scope(record_type, &bindings, cancel)
    }

    /// Recompute every dirty key in the store
    ///
    /// Run after a restart: dirty markers left by interrupted recomputes
    /// are the only record of owed work. Failures are collected per record
    /// type; the sweep continues with the next type.
    pub fn recover(&self) -> Result<RecoveryReport> {
        let mut report = RecoveryReport::default();
        for record_type in self.store.record_types()? {
            if self.dirty_keys(&record_type)?.is_empty() {
                continue;
            }
            match self.recompute_dirty(&record_type, &self.shutdown) {
                Ok(done) => report.recomputed.push(done),
                Err(e) => {
                    warn!(target: "geostats::recompute", record_type = %record_type, error = %e, "Recovery of record type failed");
                    report.failed.push((record_type, e));
                }
            }
        }
        info!(
            target: "geostats::recompute",
            keys = report.keys_recomputed(),
            failed = report.failed.len(),
            "Recovery sweep finished"
        );
        Ok(report)
    }

    /// Recompute a record type's dirty keys on the worker pool
    ///
    /// At most one task per record type is queued at a time; later requests
    /// coalesce into it since the task collects dirty keys when it starts.
    /// If the queue is full the recompute runs inline instead.
    pub fn schedule(
        self: &Arc<Self>,
        scheduler: &RecomputeScheduler,
        record_type: &str,
        priority: TaskPriority,
    ) -> Result<Scheduled> {
        if !self.queued.lock().insert(record_type.to_string()) {
            return Ok(Scheduled::Coalesced);
        }

        let this = Arc::clone(self);
        let owned = record_type.to_string();
        let submitted = scheduler.submit(priority, format!("recompute {}", record_type), move || {
            this.queued.lock().remove(&owned);
            this.recompute_dirty(&owned, &this.shutdown).map(|_| ())
        });

        match submitted {
            Ok(()) => Ok(Scheduled::Queued),
            Err(e) => {
                self.queued.lock().remove(record_type);
                warn!(target: "geostats::recompute", record_type, error = %e, "Recompute queue rejected task, running inline");
                self.recompute_dirty(record_type, &self.shutdown)
                    .map(Scheduled::Completed)
            }
        }
    }
}

impl fmt::Debug for ConsistencyCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsistencyCoordinator")
            .field("stats", &self.stats())
            .field("max_rescans", &self.max_rescans)
            .field("cancel_check_interval", &self.cancel_check_interval)
            .finish()
    }
}
