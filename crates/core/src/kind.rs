//! Statistic kind descriptors
//!
//! A `StatisticKind` is an immutable tag plus parameter payload. Two kinds
//! with equal tag and parameters are the same kind; the algebra registry is
//! keyed by this equality.
//!
//! The canonical text form (`Display`) is part of the persisted key layout:
//!
//! ```text
//! COUNT
//! BOUNDING_EXTENT(field=geom)
//! HISTOGRAM(field=depth,bins=10,lower=0,upper=100)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminant of a statistic kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KindTag {
    /// Number of records
    Count,
    /// Sum of an integer field
    Sum,
    /// Union of the envelopes of a geometry field
    BoundingExtent,
    /// Earliest start and latest end of a temporal field
    TimeRange,
    /// Minimum and maximum of a numeric field
    NumericRange,
    /// Fixed-bin histogram of a numeric field
    Histogram,
    /// Approximate number of distinct values of a field
    DistinctCount,
    /// Kind provided by a registered third-party algebra
    Custom(String),
}

impl KindTag {
    /// Canonical upper-case name used in keys and logs
    pub fn name(&self) -> &str {
        match self {
            KindTag::Count => "COUNT",
            KindTag::Sum => "SUM",
            KindTag::BoundingExtent => "BOUNDING_EXTENT",
            KindTag::TimeRange => "TIME_RANGE",
            KindTag::NumericRange => "NUMERIC_RANGE",
            KindTag::Histogram => "HISTOGRAM",
            KindTag::DistinctCount => "DISTINCT_COUNT",
            KindTag::Custom(name) => name,
        }
    }

    /// Check if this tag names one of the built-in kinds
    pub fn is_builtin(&self) -> bool {
        !matches!(self, KindTag::Custom(_))
    }
}

impl fmt::Display for KindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parameter payload of a statistic kind
///
/// Every field is optional; which ones a kind requires is decided by its
/// algebra. Bounds are integers so kinds stay `Eq + Hash`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KindParams {
    /// Field the statistic reads
    pub field: Option<String>,
    /// Number of histogram bins
    pub bins: Option<u32>,
    /// Inclusive lower histogram bound
    pub lower: Option<i64>,
    /// Exclusive upper histogram bound
    pub upper: Option<i64>,
    /// Sketch precision (log2 of the register count)
    pub precision: Option<u8>,
}

impl KindParams {
    /// Parameters naming only a field
    pub fn field(name: impl Into<String>) -> Self {
        KindParams {
            field: Some(name.into()),
            ..Default::default()
        }
    }

    fn is_empty(&self) -> bool {
        self == &KindParams::default()
    }
}

/// Immutable descriptor of an aggregation function
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StatisticKind {
    tag: KindTag,
    params: KindParams,
}

impl StatisticKind {
    /// Create a kind from tag and parameters
    pub fn new(tag: KindTag, params: KindParams) -> Self {
        StatisticKind { tag, params }
    }

    /// Record count of a record type
    pub fn count() -> Self {
        Self::new(KindTag::Count, KindParams::default())
    }

    /// Sum of an integer field
    pub fn sum(field: impl Into<String>) -> Self {
        Self::new(KindTag::Sum, KindParams::field(field))
    }

    /// Bounding extent of a geometry field
    pub fn bounding_extent(field: impl Into<String>) -> Self {
        Self::new(KindTag::BoundingExtent, KindParams::field(field))
    }

    /// Time range of a temporal field
    pub fn time_range(field: impl Into<String>) -> Self {
        Self::new(KindTag::TimeRange, KindParams::field(field))
    }

    /// Min/max of a numeric field
    pub fn numeric_range(field: impl Into<String>) -> Self {
        Self::new(KindTag::NumericRange, KindParams::field(field))
    }

    /// Fixed-bin histogram over `[lower, upper)`
    pub fn histogram(field: impl Into<String>, bins: u32, lower: i64, upper: i64) -> Self {
        Self::new(
            KindTag::Histogram,
            KindParams {
                field: Some(field.into()),
                bins: Some(bins),
                lower: Some(lower),
                upper: Some(upper),
                precision: None,
            },
        )
    }

    /// Distinct-value estimate with `2^precision` sketch registers
    pub fn distinct_count(field: impl Into<String>, precision: u8) -> Self {
        Self::new(
            KindTag::DistinctCount,
            KindParams {
                field: Some(field.into()),
                precision: Some(precision),
                ..Default::default()
            },
        )
    }

    /// Kind served by a custom registered algebra
    pub fn custom(name: impl Into<String>, params: KindParams) -> Self {
        Self::new(KindTag::Custom(name.into()), params)
    }

    /// Get the tag
    #[inline]
    pub fn tag(&self) -> &KindTag {
        &self.tag
    }

    /// Get the parameters
    #[inline]
    pub fn params(&self) -> &KindParams {
        &self.params
    }

    /// Field this kind reads, if any
    #[inline]
    pub fn field(&self) -> Option<&str> {
        self.params.field.as_deref()
    }
}

impl fmt::Display for StatisticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag.name())?;
        if self.params.is_empty() {
            return Ok(());
        }
        let mut parts = Vec::new();
        if let Some(field) = &self.params.field {
            parts.push(format!("field={}", field));
        }
        if let Some(bins) = self.params.bins {
            parts.push(format!("bins={}", bins));
        }
        if let Some(lower) = self.params.lower {
            parts.push(format!("lower={}", lower));
        }
        if let Some(upper) = self.params.upper {
            parts.push(format!("upper={}", upper));
        }
        if let Some(precision) = self.params.precision {
            parts.push(format!("precision={}", precision));
        }
        write!(f, "({})", parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_equal_tag_and_params_are_same_kind() {
        let a = StatisticKind::histogram("depth", 10, 0, 100);
        let b = StatisticKind::histogram("depth", 10, 0, 100);
        let c = StatisticKind::histogram("depth", 20, 0, 100);
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_canonical_form() {
        assert_eq!(StatisticKind::count().to_string(), "COUNT");
        assert_eq!(
            StatisticKind::bounding_extent("geom").to_string(),
            "BOUNDING_EXTENT(field=geom)"
        );
        assert_eq!(
            StatisticKind::histogram("depth", 10, 0, 100).to_string(),
            "HISTOGRAM(field=depth,bins=10,lower=0,upper=100)"
        );
        assert_eq!(
            StatisticKind::distinct_count("name", 12).to_string(),
            "DISTINCT_COUNT(field=name,precision=12)"
        );
    }

    #[test]
    fn test_custom_kind() {
        let kind = StatisticKind::custom("MEDIAN", KindParams::field("depth"));
        assert!(!kind.tag().is_builtin());
        assert_eq!(kind.field(), Some("depth"));
        assert_eq!(kind.to_string(), "MEDIAN(field=depth)");
    }

    #[test]
    fn test_field_accessor() {
        assert_eq!(StatisticKind::count().field(), None);
        assert_eq!(StatisticKind::sum("pop").field(), Some("pop"));
    }
}
