//! Fault injection for statistics store testing
//!
//! Wraps any [`StatisticsStore`] and fails selected operations on demand:
//! - Backend outages: the next N gets/puts/scans/deletes return
//!   `BackendUnavailable`, optionally after letting some calls through
//! - Lost races: the next N puts return `VersionConflict` without writing
//!
//! Every call is counted so tests can assert how often the engine went to
//! the store.
//!
//! # Example
//!
//! ```ignore
//! use geostats_storage::testing::FaultInjectingStore;
//!
//! let store = FaultInjectingStore::new(ShardedStatisticsStore::new());
//! store.fail_next_puts(2);
//! store.inject_conflicts(1);
//! ```

use geostats_core::{
    Error, Result, ScanQuery, StatisticEntry, StatisticId, StatisticScan, StatisticsStore,
    Version, Versioned,
};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Operation a fault applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    /// `get`
    Get,
    /// `put`
    Put,
    /// `scan`
    Scan,
    /// `delete`
    Delete,
}

impl FaultPoint {
    /// Get the operation name
    pub fn name(&self) -> &'static str {
        match self {
            FaultPoint::Get => "get",
            FaultPoint::Put => "put",
            FaultPoint::Scan => "scan",
            FaultPoint::Delete => "delete",
        }
    }
}

#[derive(Debug, Default)]
struct Counter {
    /// Calls to let through before failing
    passes: AtomicUsize,
    /// Remaining calls to fail
    pending: AtomicUsize,
    /// Calls seen
    calls: AtomicUsize,
}

impl Counter {
    /// Record a call; true if it should fail
    fn hit(&self) -> bool {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if take_one(&self.passes) {
            return false;
        }
        take_one(&self.pending)
    }
}

fn take_one(pending: &AtomicUsize) -> bool {
    pending
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        .is_ok()
}

/// Store wrapper that injects failures
#[derive(Debug, Default)]
pub struct FaultInjectingStore<S> {
    inner: S,
    gets: Counter,
    puts: Counter,
    scans: Counter,
    deletes: Counter,
    conflicts: AtomicUsize,
}

impl<S: StatisticsStore> FaultInjectingStore<S> {
    /// Wrap a store with no faults armed
    pub fn new(inner: S) -> Self {
        FaultInjectingStore {
            inner,
            gets: Counter::default(),
            puts: Counter::default(),
            scans: Counter::default(),
            deletes: Counter::default(),
            conflicts: AtomicUsize::new(0),
        }
    }

    /// The wrapped store
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn counter(&self, point: FaultPoint) -> &Counter {
        match point {
            FaultPoint::Get => &self.gets,
            FaultPoint::Put => &self.puts,
            FaultPoint::Scan => &self.scans,
            FaultPoint::Delete => &self.deletes,
        }
    }

    /// Fail the next `n` calls of an operation with `BackendUnavailable`
    pub fn fail_next(&self, point: FaultPoint, n: usize) {
        self.fail_after(point, 0, n);
    }

    /// Let `passes` calls of an operation succeed, then fail the next `n`
    pub fn fail_after(&self, point: FaultPoint, passes: usize, n: usize) {
        let counter = self.counter(point);
        counter.pending.store(n, Ordering::Release);
        counter.passes.store(passes, Ordering::Release);
    }

    /// Let `passes` puts succeed, then fail the next `n`
    pub fn fail_puts_after(&self, passes: usize, n: usize) {
        self.fail_after(FaultPoint::Put, passes, n);
    }

    /// Fail the next `n` gets
    pub fn fail_next_gets(&self, n: usize) {
        self.fail_next(FaultPoint::Get, n);
    }

    /// Fail the next `n` puts
    pub fn fail_next_puts(&self, n: usize) {
        self.fail_next(FaultPoint::Put, n);
    }

    /// Fail the next `n` scans
    pub fn fail_next_scans(&self, n: usize) {
        self.fail_next(FaultPoint::Scan, n);
    }

    /// Fail the next `n` deletes
    pub fn fail_next_deletes(&self, n: usize) {
        self.fail_next(FaultPoint::Delete, n);
    }

    /// Reject the next `n` puts with a spurious `VersionConflict`
    ///
    /// Conflicts are checked after outages, so a put consumes at most one
    /// armed fault.
    pub fn inject_conflicts(&self, n: usize) {
        self.conflicts.store(n, Ordering::Release);
    }

    /// Disarm every fault
    pub fn clear_faults(&self) {
        for point in [FaultPoint::Get, FaultPoint::Put, FaultPoint::Scan, FaultPoint::Delete] {
            self.fail_next(point, 0);
        }
        self.inject_conflicts(0);
    }

    /// Number of calls made to an operation, failed ones included
    pub fn calls(&self, point: FaultPoint) -> usize {
        self.counter(point).calls.load(Ordering::Relaxed)
    }

    /// Number of `get` calls
    pub fn get_count(&self) -> usize {
        self.calls(FaultPoint::Get)
    }

    /// Number of `put` calls
    pub fn put_count(&self) -> usize {
        self.calls(FaultPoint::Put)
    }

    /// Number of `scan` calls
    pub fn scan_count(&self) -> usize {
        self.calls(FaultPoint::Scan)
    }

    fn outage(point: FaultPoint) -> Error {
        Error::BackendUnavailable(format!("injected {} failure", point.name()))
    }
}

impl<S: StatisticsStore> StatisticsStore for FaultInjectingStore<S> {
    fn get(&self, id: &StatisticId) -> Result<Option<Versioned<StatisticEntry>>> {
        if self.gets.hit() {
            return Err(Self::outage(FaultPoint::Get));
        }
        self.inner.get(id)
    }

    fn put(&self, id: StatisticId, entry: StatisticEntry, expected: Version) -> Result<Version> {
        if self.puts.hit() {
            return Err(Self::outage(FaultPoint::Put));
        }
        if take_one(&self.conflicts) {
            let actual = self
                .inner
                .get(&id)?
                .map(|v| v.version)
                .unwrap_or(Version::ZERO);
            return Err(Error::VersionConflict {
                id,
                expected,
                actual,
            });
        }
        self.inner.put(id, entry, expected)
    }

    fn delete(&self, id: &StatisticId) -> Result<Option<Versioned<StatisticEntry>>> {
        if self.deletes.hit() {
            return Err(Self::outage(FaultPoint::Delete));
        }
        self.inner.delete(id)
    }

    fn scan(&self, query: &ScanQuery) -> Result<StatisticScan<'_>> {
        if self.scans.hit() {
            return Err(Self::outage(FaultPoint::Scan));
        }
        self.inner.scan(query)
    }

    fn record_types(&self) -> Result<Vec<String>> {
        self.inner.record_types()
    }
}
