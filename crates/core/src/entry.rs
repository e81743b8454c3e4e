//! Persisted statistic entries
//!
//! The store keeps each statistic as an opaque payload plus a freshness
//! marker. Freshness lives in the entry itself so a pending recompute
//! survives a crash: whatever restarts the engine finds `Dirty` entries in
//! the store and recomputes them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a stored statistic is known to match the current records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Freshness {
    /// Value equals the fold over the current record set
    #[default]
    Clean,
    /// A delete invalidated the value; a recompute is owed
    Dirty,
}

impl Freshness {
    /// Check if the value may be stale
    pub fn is_dirty(&self) -> bool {
        matches!(self, Freshness::Dirty)
    }
}

impl fmt::Display for Freshness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Freshness::Clean => f.write_str("clean"),
            Freshness::Dirty => f.write_str("dirty"),
        }
    }
}

/// A stored statistic: serialized merge state plus freshness
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticEntry {
    /// Serialized merge state; never interpreted by the store
    pub payload: Vec<u8>,
    /// Freshness marker
    pub freshness: Freshness,
}

impl StatisticEntry {
    /// Clean entry
    pub fn clean(payload: Vec<u8>) -> Self {
        StatisticEntry {
            payload,
            freshness: Freshness::Clean,
        }
    }

    /// Entry with explicit freshness
    pub fn with_freshness(payload: Vec<u8>, freshness: Freshness) -> Self {
        StatisticEntry { payload, freshness }
    }

    /// Same payload marked dirty
    pub fn into_dirty(self) -> Self {
        StatisticEntry {
            freshness: Freshness::Dirty,
            ..self
        }
    }
}
