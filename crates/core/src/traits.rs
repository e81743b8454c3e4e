//! Core traits for storage and record-source abstraction
//!
//! `StatisticsStore` is the single shared mutable resource of the engine.
//! All mutation goes through its versioned `put`; there is no client-side
//! locking. `RecordSource` is the collaborator view of the records currently
//! present, used by recomputation.
//!
//! Thread safety: all methods must be safe to call concurrently from
//! multiple threads (requires Send + Sync).

use crate::entry::StatisticEntry;
use crate::error::Result;
use crate::kind::KindTag;
use crate::record::Record;
use crate::types::StatisticId;
use crate::version::{Version, Versioned};

/// Lazy, finite sequence of stored statistics
///
/// Not restartable once exhausted; issue a new scan instead.
pub type StatisticScan<'a> =
    Box<dyn Iterator<Item = Result<(StatisticId, Versioned<StatisticEntry>)>> + Send + 'a>;

/// Lazy sequence of records currently present in a scope
pub type RecordScan<'a> = Box<dyn Iterator<Item = Result<Record>> + Send + 'a>;

/// Filter for scoped iteration over the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanQuery {
    /// Record type to scan (required)
    pub record_type: String,
    /// Only statistics of this kind tag
    pub kind_tag: Option<KindTag>,
    /// Only statistics whose extended id starts with this prefix
    pub extended_id_prefix: Option<String>,
}

impl ScanQuery {
    /// Every statistic of a record type
    pub fn record_type(record_type: impl Into<String>) -> Self {
        ScanQuery {
            record_type: record_type.into(),
            kind_tag: None,
            extended_id_prefix: None,
        }
    }

    /// Restrict to one kind tag
    pub fn with_kind(mut self, tag: KindTag) -> Self {
        self.kind_tag = Some(tag);
        self
    }

    /// Restrict to an extended id prefix
    pub fn with_extended_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.extended_id_prefix = Some(prefix.into());
        self
    }

    /// Check if an identity falls within the query
    pub fn matches(&self, id: &StatisticId) -> bool {
        id.record_type == self.record_type
            && self.kind_tag.as_ref().map_or(true, |t| id.tag() == t)
            && self
                .extended_id_prefix
                .as_deref()
                .map_or(true, |p| id.extended_id.starts_with(p))
    }
}

/// Durable keyed repository of statistic snapshots
///
/// The store treats payloads as opaque bytes. It enforces read-modify-write
/// atomicity per key through versioned writes: the last successful writer
/// wins a given version and losers observe `VersionConflict`.
pub trait StatisticsStore: Send + Sync {
    /// Read the current entry and its version
    ///
    /// Returns None if the statistic does not exist.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` if the backend cannot be reached.
    fn get(&self, id: &StatisticId) -> Result<Option<Versioned<StatisticEntry>>>;

    /// Write an entry if the stored version equals `expected`
    ///
    /// `Version::ZERO` requires the key to be absent. Returns the new version.
    ///
    /// # Errors
    ///
    /// Returns `VersionConflict` if another writer got there first, or
    /// `BackendUnavailable` if the backend cannot be reached. The stored
    /// entry is unchanged in both cases.
    fn put(&self, id: StatisticId, entry: StatisticEntry, expected: Version) -> Result<Version>;

    /// Remove an entry unconditionally
    ///
    /// Returns the removed entry if it existed.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` if the backend cannot be reached.
    fn delete(&self, id: &StatisticId) -> Result<Option<Versioned<StatisticEntry>>>;

    /// Iterate the statistics matching a query, ordered by identity
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` if the backend cannot be reached.
    fn scan(&self, query: &ScanQuery) -> Result<StatisticScan<'_>>;

    /// Record types that currently own at least one statistic
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` if the backend cannot be reached.
    fn record_types(&self) -> Result<Vec<String>>;

    /// Remove every statistic matching a query, returning how many went
    ///
    /// Used when a record type or index is dropped.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` if the backend cannot be reached.
    fn delete_matching(&self, query: &ScanQuery) -> Result<usize> {
        let ids: Vec<StatisticId> = self
            .scan(query)?
            .map(|item| item.map(|(id, _)| id))
            .collect::<Result<_>>()?;
        let mut removed = 0;
        for id in &ids {
            if self.delete(id)?.is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Collaborator view of the records currently present
///
/// Recomputation folds over `scan(record_type)`. The view must reflect
/// current state, not the state before the delete that triggered the
/// recompute.
pub trait RecordSource: Send + Sync {
    /// Iterate the records currently present for a record type
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` if the backend cannot be reached; items
    /// may also fail individually mid-scan.
    fn scan(&self, record_type: &str) -> Result<RecordScan<'_>>;
}
