//! Identity and geometry value types
//!
//! - `StatisticId`: the (record type, kind, extended id) identity triple
//! - `BoundingBox`: axis-aligned envelope supplied by the geometry collaborator
//! - `TimeRange`: closed interval of epoch milliseconds

use crate::kind::{KindTag, StatisticKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one maintained statistic
///
/// At most one live value exists per identity in the store. Ordering is
/// record type, then kind, then extended id, which keeps scans of one
/// record type contiguous.
///
/// An empty `extended_id` means the statistic covers the whole record type;
/// a non-empty one names a field or an index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StatisticId {
    /// Owning record type
    pub record_type: String,
    /// Aggregation function
    pub kind: StatisticKind,
    /// Disambiguator for per-field or per-index instances
    pub extended_id: String,
}

impl StatisticId {
    /// Create an identity
    pub fn new(
        record_type: impl Into<String>,
        kind: StatisticKind,
        extended_id: impl Into<String>,
    ) -> Self {
        StatisticId {
            record_type: record_type.into(),
            kind,
            extended_id: extended_id.into(),
        }
    }

    /// Identity covering the whole record type
    pub fn type_wide(record_type: impl Into<String>, kind: StatisticKind) -> Self {
        Self::new(record_type, kind, "")
    }

    /// Record count of a record type
    pub fn count(record_type: impl Into<String>) -> Self {
        Self::type_wide(record_type, StatisticKind::count())
    }

    /// Get the kind tag
    #[inline]
    pub fn tag(&self) -> &KindTag {
        self.kind.tag()
    }

    /// Check if the statistic covers the whole record type
    #[inline]
    pub fn is_type_wide(&self) -> bool {
        self.extended_id.is_empty()
    }
}

impl fmt::Display for StatisticId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.record_type, self.kind, self.extended_id)
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Minimum x (longitude)
    pub min_x: f64,
    /// Minimum y (latitude)
    pub min_y: f64,
    /// Maximum x (longitude)
    pub max_x: f64,
    /// Maximum y (latitude)
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a box, normalizing swapped corners
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        BoundingBox {
            min_x: min_x.min(max_x),
            min_y: min_y.min(max_y),
            max_x: min_x.max(max_x),
            max_y: min_y.max(max_y),
        }
    }

    /// Degenerate box around a point
    pub fn point(x: f64, y: f64) -> Self {
        BoundingBox::new(x, y, x, y)
    }

    /// Smallest box containing both boxes
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Check if the boxes overlap (edges included)
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{},{}]-[{},{}]",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

/// Closed time interval in epoch milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    /// Inclusive start
    pub start: i64,
    /// Inclusive end
    pub end: i64,
}

impl TimeRange {
    /// Create a range, normalizing swapped ends
    pub fn new(start: i64, end: i64) -> Self {
        TimeRange {
            start: start.min(end),
            end: start.max(end),
        }
    }

    /// Range holding a single instant
    pub fn instant(t: i64) -> Self {
        TimeRange { start: t, end: t }
    }

    /// Smallest range covering both ranges
    pub fn union(&self, other: &TimeRange) -> TimeRange {
        TimeRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Check if the ranges overlap
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}
