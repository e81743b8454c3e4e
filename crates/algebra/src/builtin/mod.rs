//! Built-in statistic kinds
//!
//! | kind            | invertible | state                    |
//! |-----------------|------------|--------------------------|
//! | COUNT           | yes        | u64                      |
//! | SUM             | yes        | i128 total + contributors |
//! | HISTOGRAM       | yes        | per-bin counts           |
//! | BOUNDING_EXTENT | no         | optional box             |
//! | TIME_RANGE      | no         | optional range           |
//! | NUMERIC_RANGE   | no         | optional min/max         |
//! | DISTINCT_COUNT  | no         | HyperLogLog registers    |

mod count;
mod distinct;
mod extent;
mod histogram;

pub use count::{CountAlgebra, SumAlgebra};
pub use distinct::{DistinctCountAlgebra, MAX_PRECISION, MIN_PRECISION};
pub use extent::{BoundingExtentAlgebra, NumericRangeAlgebra, TimeRangeAlgebra};
pub use histogram::{HistogramAlgebra, MAX_BINS};

use crate::algebra::StatisticAlgebra;
use geostats_core::{Error, KindTag, Result, StatisticKind};
use std::sync::Arc;

fn required<T: Clone>(kind: &StatisticKind, value: &Option<T>, name: &str) -> Result<T> {
    value.clone().ok_or_else(|| Error::InvalidKind {
        kind: kind.clone(),
        reason: format!("missing parameter '{}'", name),
    })
}

/// Build the built-in algebra for a kind
///
/// # Errors
///
/// - `UnknownKind` for custom tags
/// - `InvalidKind` for missing, unexpected or out-of-range parameters
pub fn builtin_algebra(kind: &StatisticKind) -> Result<Arc<dyn StatisticAlgebra>> {
    let params = kind.params();
    let algebra: Arc<dyn StatisticAlgebra> = match kind.tag() {
        KindTag::Count => Arc::new(CountAlgebra::new()),
        KindTag::Sum => Arc::new(SumAlgebra::new(required(kind, &params.field, "field")?)),
        KindTag::BoundingExtent => Arc::new(BoundingExtentAlgebra::new(required(
            kind,
            &params.field,
            "field",
        )?)),
        KindTag::TimeRange => Arc::new(TimeRangeAlgebra::new(required(
            kind,
            &params.field,
            "field",
        )?)),
        KindTag::NumericRange => Arc::new(NumericRangeAlgebra::new(required(
            kind,
            &params.field,
            "field",
        )?)),
        KindTag::Histogram => Arc::new(HistogramAlgebra::new(
            required(kind, &params.field, "field")?,
            required(kind, &params.bins, "bins")?,
            required(kind, &params.lower, "lower")?,
            required(kind, &params.upper, "upper")?,
        )?),
        KindTag::DistinctCount => Arc::new(DistinctCountAlgebra::new(
            required(kind, &params.field, "field")?,
            required(kind, &params.precision, "precision")?,
        )?),
        KindTag::Custom(_) => return Err(Error::UnknownKind(kind.clone())),
    };
    if algebra.kind() != kind {
        return Err(Error::InvalidKind {
            kind: kind.clone(),
            reason: format!("unexpected parameters for {}", kind.tag()),
        });
    }
    Ok(algebra)
}
