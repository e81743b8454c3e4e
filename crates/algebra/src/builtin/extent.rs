//! Extent-style kinds: bounding box, time range, numeric min/max
//!
//! All three fold by union. Union has no inverse: removing a record on the
//! boundary cannot shrink the extent without knowing the other records, so
//! these kinds are non-invertible and deletes trigger recomputation.

use crate::algebra::{shape_mismatch, StatisticAlgebra};
use crate::state::{NumericBounds, StatResult, StatState};
use geostats_core::{Record, Result, StatisticKind};

fn union_opt<T: Copy>(a: Option<T>, b: Option<T>, union: impl Fn(&T, &T) -> T) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(union(&a, &b)),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Union of the envelopes of a geometry field
#[derive(Debug)]
pub struct BoundingExtentAlgebra {
    kind: StatisticKind,
    field: String,
}

impl BoundingExtentAlgebra {
    /// Create an extent over `field`
    pub fn new(field: impl Into<String>) -> Self {
        let field = field.into();
        BoundingExtentAlgebra {
            kind: StatisticKind::bounding_extent(field.clone()),
            field,
        }
    }
}

impl StatisticAlgebra for BoundingExtentAlgebra {
    fn kind(&self) -> &StatisticKind {
        &self.kind
    }

    fn identity(&self) -> StatState {
        StatState::Extent(None)
    }

    fn apply(&self, state: &mut StatState, record: &Record) -> Result<()> {
        match state {
            StatState::Extent(current) => {
                let envelope = record.field(&self.field).and_then(|v| v.as_envelope());
                *current = union_opt(*current, envelope, |a, b| a.union(b));
                Ok(())
            }
            other => Err(shape_mismatch(&self.kind, other)),
        }
    }

    fn combine(&self, state: &mut StatState, other: &StatState) -> Result<()> {
        match (state, other) {
            (StatState::Extent(a), StatState::Extent(b)) => {
                *a = union_opt(*a, *b, |x, y| x.union(y));
                Ok(())
            }
            (_, other) => Err(shape_mismatch(&self.kind, other)),
        }
    }

    fn result(&self, state: &StatState) -> Result<StatResult> {
        match state {
            StatState::Extent(b) => Ok(StatResult::Extent(*b)),
            other => Err(shape_mismatch(&self.kind, other)),
        }
    }
}

/// Earliest start and latest end of a temporal field
#[derive(Debug)]
pub struct TimeRangeAlgebra {
    kind: StatisticKind,
    field: String,
}

impl TimeRangeAlgebra {
    /// Create a time range over `field`
    pub fn new(field: impl Into<String>) -> Self {
        let field = field.into();
        TimeRangeAlgebra {
            kind: StatisticKind::time_range(field.clone()),
            field,
        }
    }
}

impl StatisticAlgebra for TimeRangeAlgebra {
    fn kind(&self) -> &StatisticKind {
        &self.kind
    }

    fn identity(&self) -> StatState {
        StatState::Time(None)
    }

    fn apply(&self, state: &mut StatState, record: &Record) -> Result<()> {
        match state {
            StatState::Time(current) => {
                let range = record.field(&self.field).and_then(|v| v.as_time());
                *current = union_opt(*current, range, |a, b| a.union(b));
                Ok(())
            }
            other => Err(shape_mismatch(&self.kind, other)),
        }
    }

    fn combine(&self, state: &mut StatState, other: &StatState) -> Result<()> {
        match (state, other) {
            (StatState::Time(a), StatState::Time(b)) => {
                *a = union_opt(*a, *b, |x, y| x.union(y));
                Ok(())
            }
            (_, other) => Err(shape_mismatch(&self.kind, other)),
        }
    }

    fn result(&self, state: &StatState) -> Result<StatResult> {
        match state {
            StatState::Time(t) => Ok(StatResult::TimeRange(*t)),
            other => Err(shape_mismatch(&self.kind, other)),
        }
    }
}

/// Minimum and maximum of a numeric field
#[derive(Debug)]
pub struct NumericRangeAlgebra {
    kind: StatisticKind,
    field: String,
}

impl NumericRangeAlgebra {
    /// Create a min/max over `field`
    pub fn new(field: impl Into<String>) -> Self {
        let field = field.into();
        NumericRangeAlgebra {
            kind: StatisticKind::numeric_range(field.clone()),
            field,
        }
    }
}

impl StatisticAlgebra for NumericRangeAlgebra {
    fn kind(&self) -> &StatisticKind {
        &self.kind
    }

    fn identity(&self) -> StatState {
        StatState::Range(None)
    }

    fn apply(&self, state: &mut StatState, record: &Record) -> Result<()> {
        match state {
            StatState::Range(current) => {
                let v = record
                    .field(&self.field)
                    .and_then(|v| v.as_f64())
                    .map(NumericBounds::point);
                *current = union_opt(*current, v, |a, b| a.union(b));
                Ok(())
            }
            other => Err(shape_mismatch(&self.kind, other)),
        }
    }

    fn combine(&self, state: &mut StatState, other: &StatState) -> Result<()> {
        match (state, other) {
            (StatState::Range(a), StatState::Range(b)) => {
                *a = union_opt(*a, *b, |x, y| x.union(y));
                Ok(())
            }
            (_, other) => Err(shape_mismatch(&self.kind, other)),
        }
    }

    fn result(&self, state: &StatState) -> Result<StatResult> {
        match state {
            StatState::Range(r) => Ok(StatResult::NumericRange(*r)),
            other => Err(shape_mismatch(&self.kind, other)),
        }
    }
}
