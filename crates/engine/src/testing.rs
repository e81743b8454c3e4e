//! In-memory record source for tests and embedding
//!
//! `MemoryRecordSource` stands in for the record store: callers insert and
//! remove records, and recompute scans see the current set. Scans can be
//! made to fail up front or part-way through to exercise recovery.

use geostats_core::{
    DeleteRequest, DeleteScope, Error, Record, RecordId, RecordScan, RecordSource, Result,
};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Record source backed by ordered maps per record type
#[derive(Debug, Default)]
pub struct MemoryRecordSource {
    records: RwLock<BTreeMap<String, BTreeMap<RecordId, Record>>>,
    /// Scans left to reject outright
    failing_scans: AtomicUsize,
    /// Fail the next scan after this many records (0 = disarmed)
    interrupt_after: AtomicUsize,
}

impl MemoryRecordSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a record
    pub fn insert(&self, record: Record) -> Option<Record> {
        self.records
            .write()
            .entry(record.record_type.clone())
            .or_default()
            .insert(record.id.clone(), record)
    }

    /// Remove records by id, returning the ones that existed
    pub fn remove(&self, record_type: &str, ids: &[RecordId]) -> Vec<Record> {
        let mut records = self.records.write();
        let Some(of_type) = records.get_mut(record_type) else {
            return Vec::new();
        };
        ids.iter().filter_map(|id| of_type.remove(id)).collect()
    }

    /// Remove every record matching `predicate`, returning them
    pub fn remove_where<F>(&self, record_type: &str, predicate: F) -> Vec<Record>
    where
        F: Fn(&Record) -> bool,
    {
        let mut records = self.records.write();
        let Some(of_type) = records.get_mut(record_type) else {
            return Vec::new();
        };
        let ids: Vec<RecordId> = of_type
            .values()
            .filter(|r| predicate(r))
            .map(|r| r.id.clone())
            .collect();
        ids.iter().filter_map(|id| of_type.remove(id)).collect()
    }

    /// Delete by id and describe what went
    pub fn delete_ids(&self, record_type: &str, ids: &[RecordId]) -> DeleteScope {
        DeleteScope::by_ids(record_type, self.remove(record_type, ids))
    }

    /// Delete by predicate and describe what went
    ///
    /// `filter` is only recorded on the scope for logging.
    pub fn delete_matching<F>(&self, record_type: &str, filter: &str, predicate: F) -> DeleteScope
    where
        F: Fn(&Record) -> bool,
    {
        let removed = self.remove_where(record_type, predicate);
        DeleteScope::resolved(
            record_type,
            DeleteRequest::Predicate(filter.to_string()),
            removed,
        )
    }

    /// Number of records of a type
    pub fn len(&self, record_type: &str) -> usize {
        self.records
            .read()
            .get(record_type)
            .map_or(0, |of_type| of_type.len())
    }

    /// Check if a record type has no records
    pub fn is_empty(&self, record_type: &str) -> bool {
        self.len(record_type) == 0
    }

    /// Reject the next `n` scans with `BackendUnavailable`
    pub fn fail_next_scans(&self, n: usize) {
        self.failing_scans.store(n, Ordering::Release);
    }

    /// Make the next scan yield `n` records and then fail
    pub fn interrupt_next_scan_after(&self, n: usize) {
        self.interrupt_after.store(n.saturating_add(1), Ordering::Release);
    }
}

impl RecordSource for MemoryRecordSource {
    fn scan(&self, record_type: &str) -> Result<RecordScan<'_>> {
        let rejected = self
            .failing_scans
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if rejected {
            return Err(Error::BackendUnavailable(format!(
                "record scan of '{}' rejected",
                record_type
            )));
        }

        let snapshot: Vec<Record> = self
            .records
            .read()
            .get(record_type)
            .map(|of_type| of_type.values().cloned().collect())
            .unwrap_or_default();

        let interrupt = self.interrupt_after.swap(0, Ordering::AcqRel);
        let record_type = record_type.to_string();
        let items = snapshot.into_iter().map(Ok);
        if interrupt == 0 {
            return Ok(Box::new(items));
        }
        let keep = interrupt - 1;
        let failure = std::iter::once(Err(Error::BackendUnavailable(format!(
            "record scan of '{}' interrupted after {} records",
            record_type, keep
        ))));
        Ok(Box::new(items.take(keep).chain(failure)))
    }
}
