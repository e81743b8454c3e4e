//! Merge states and materialized results
//!
//! `StatState` is what gets folded, combined and persisted. `StatResult` is
//! what readers see. They differ where the state is a sketch (distinct
//! count registers materialize to an estimate) or carries bookkeeping the
//! reader does not need.

use geostats_core::{BoundingBox, TimeRange};
use serde::{Deserialize, Serialize};

/// Minimum and maximum of a numeric field
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericBounds {
    /// Smallest observed value
    pub min: f64,
    /// Largest observed value
    pub max: f64,
}

impl NumericBounds {
    /// Bounds around a single value
    pub fn point(v: f64) -> Self {
        NumericBounds { min: v, max: v }
    }

    /// Smallest bounds covering both
    pub fn union(&self, other: &NumericBounds) -> Self {
        NumericBounds {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

/// Internal merge state of a statistic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StatState {
    /// Record count
    Count(u64),
    /// Exact integer sum
    Sum {
        /// Running total
        total: i128,
        /// Records that contributed a value
        contributors: u64,
    },
    /// Union of envelopes
    Extent(Option<BoundingBox>),
    /// Union of time ranges
    Time(Option<TimeRange>),
    /// Numeric min/max
    Range(Option<NumericBounds>),
    /// Per-bin counts
    Histogram(Vec<u64>),
    /// HyperLogLog registers
    Sketch(Vec<u8>),
    /// State of a custom algebra
    Opaque(Vec<u8>),
}

impl StatState {
    /// Variant name for diagnostics
    pub fn shape(&self) -> &'static str {
        match self {
            StatState::Count(_) => "count",
            StatState::Sum { .. } => "sum",
            StatState::Extent(_) => "extent",
            StatState::Time(_) => "time",
            StatState::Range(_) => "range",
            StatState::Histogram(_) => "histogram",
            StatState::Sketch(_) => "sketch",
            StatState::Opaque(_) => "opaque",
        }
    }
}

/// Histogram as seen by readers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramResult {
    /// Inclusive lower bound of the first bin
    pub lower: i64,
    /// Exclusive upper bound of the last bin
    pub upper: i64,
    /// Counts per bin
    pub bins: Vec<u64>,
}

impl HistogramResult {
    /// Total number of values binned
    pub fn total(&self) -> u64 {
        self.bins.iter().sum()
    }
}

/// Materialized statistic result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StatResult {
    /// Record count
    Count(u64),
    /// Integer sum
    Sum(i128),
    /// Bounding extent, `None` when no geometry was seen
    Extent(Option<BoundingBox>),
    /// Time range, `None` when no time was seen
    TimeRange(Option<TimeRange>),
    /// Numeric min/max, `None` when no value was seen
    NumericRange(Option<NumericBounds>),
    /// Histogram
    Histogram(HistogramResult),
    /// Estimated distinct values
    DistinctEstimate(u64),
    /// Custom algebra result
    Opaque(Vec<u8>),
}

impl StatResult {
    /// Count, if this is a count result
    pub fn as_count(&self) -> Option<u64> {
        match self {
            StatResult::Count(n) => Some(*n),
            _ => None,
        }
    }

    /// Extent, if this is an extent result
    pub fn as_extent(&self) -> Option<Option<BoundingBox>> {
        match self {
            StatResult::Extent(b) => Some(*b),
            _ => None,
        }
    }

    /// Sum, if this is a sum result
    pub fn as_sum(&self) -> Option<i128> {
        match self {
            StatResult::Sum(s) => Some(*s),
            _ => None,
        }
    }

    /// Histogram, if this is a histogram result
    pub fn as_histogram(&self) -> Option<&HistogramResult> {
        match self {
            StatResult::Histogram(h) => Some(h),
            _ => None,
        }
    }
}
