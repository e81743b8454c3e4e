//! Sharded statistics store
//!
//! DashMap sharded by record type, FxHashMap within each shard.
//!
//! # Design
//!
//! - DashMap: 16-way sharded by default, lock-free reads
//! - FxHashMap: O(1) lookups, fast non-crypto hash
//! - Per record type: statistics of different record types never contend
//!
//! # Optimistic versioning
//!
//! `put` compares the expected version with the stored one while holding
//! the record type's shard entry, so check-and-write is atomic per key.
//! Versions come from one store-wide counter: a key that is deleted and
//! re-created never reissues a version a stale writer may still hold.
//!
//! Entries are opaque: the store never decodes payloads.

use dashmap::DashMap;
use geostats_core::{
    Error, Result, ScanQuery, StatisticEntry, StatisticId, StatisticScan, StatisticsStore,
    Version, Versioned,
};
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Statistics of one record type
#[derive(Debug, Default)]
pub struct Shard {
    /// Entries by identity
    pub(crate) data: FxHashMap<StatisticId, Versioned<StatisticEntry>>,
}

impl Shard {
    /// Create a new empty shard
    pub fn new() -> Self {
        Self {
            data: FxHashMap::default(),
        }
    }

    /// Get number of statistics in this shard
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if shard is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// In-memory statistics store sharded by record type
///
/// # Thread Safety
///
/// All operations are thread-safe:
/// - get(): Lock-free read via DashMap
/// - put(): Only locks the target record type's shard
/// - Different record types never contend
///
/// # Example
///
/// ```ignore
/// use geostats_storage::ShardedStatisticsStore;
///
/// let store = ShardedStatisticsStore::new();
/// let v1 = store.put(id.clone(), entry, Version::ZERO)?;
/// let current = store.get(&id)?;
/// ```
pub struct ShardedStatisticsStore {
    /// Per record type shards
    shards: DashMap<String, Shard>,
    /// Store-wide version counter
    version: AtomicU64,
}

impl ShardedStatisticsStore {
    /// Create new sharded store
    pub fn new() -> Self {
        Self {
            shards: DashMap::new(),
            version: AtomicU64::new(0),
        }
    }

    /// Create with expected number of record types
    pub fn with_capacity(num_types: usize) -> Self {
        Self {
            shards: DashMap::with_capacity(num_types),
            version: AtomicU64::new(0),
        }
    }

    /// Highest version allocated so far
    #[inline]
    pub fn current_version(&self) -> Version {
        Version::new(self.version.load(Ordering::Acquire))
    }

    #[inline]
    fn next_version(&self) -> Version {
        Version::new(self.version.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Get number of shards (record types)
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Get total number of statistics across all shards
    pub fn total_entries(&self) -> usize {
        self.shards.iter().map(|entry| entry.value().len()).sum()
    }

    /// Clear all statistics of a record type
    ///
    /// Returns true if the record type existed and was removed.
    pub fn clear_record_type(&self, record_type: &str) -> bool {
        self.shards.remove(record_type).is_some()
    }
}

impl StatisticsStore for ShardedStatisticsStore {
    fn get(&self, id: &StatisticId) -> Result<Option<Versioned<StatisticEntry>>> {
        Ok(self
            .shards
            .get(&id.record_type)
            .and_then(|shard| shard.data.get(id).cloned()))
    }

    fn put(&self, id: StatisticId, entry: StatisticEntry, expected: Version) -> Result<Version> {
        let mut shard = self.shards.entry(id.record_type.clone()).or_default();
        let actual = shard
            .data
            .get(&id)
            .map(|v| v.version)
            .unwrap_or(Version::ZERO);
        if actual != expected {
            return Err(Error::VersionConflict {
                id,
                expected,
                actual,
            });
        }
        let version = self.next_version();
        trace!(target: "geostats::store", id = %id, %version, "Statistic written");
        shard.data.insert(id, Versioned::new(entry, version));
        Ok(version)
    }

    fn delete(&self, id: &StatisticId) -> Result<Option<Versioned<StatisticEntry>>> {
        Ok(self
            .shards
            .get_mut(&id.record_type)
            .and_then(|mut shard| shard.data.remove(id)))
    }

    fn scan(&self, query: &ScanQuery) -> Result<StatisticScan<'_>> {
        // Collect under the shard guard so iteration never holds a DashMap lock
        let mut results: Vec<_> = self
            .shards
            .get(&query.record_type)
            .map(|shard| {
                shard
                    .data
                    .iter()
                    .filter(|(id, _)| query.matches(id))
                    .map(|(id, v)| (id.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();
        results.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(Box::new(results.into_iter().map(Ok)))
    }

    fn record_types(&self) -> Result<Vec<String>> {
        let mut types: Vec<String> = self
            .shards
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| entry.key().clone())
            .collect();
        types.sort();
        Ok(types)
    }
}

impl Default for ShardedStatisticsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ShardedStatisticsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedStatisticsStore")
            .field("shard_count", &self.shard_count())
            .field("version", &self.current_version())
            .field("total_entries", &self.total_entries())
            .finish()
    }
}
