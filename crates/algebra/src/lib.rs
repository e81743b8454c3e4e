//! Statistic algebras for geostats
//!
//! This crate defines how each statistic kind accumulates:
//! - StatisticAlgebra: identity / apply / combine / optional retract
//! - StatState / StatResult: merge state and reader-facing result
//! - Built-in kinds: count, sum, histogram, bounding extent, time range,
//!   numeric range, distinct count
//! - AlgebraRegistry: kind -> algebra lookup, process-wide via `global()`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algebra;
pub mod builtin;
pub mod registry;
pub mod state;

pub use algebra::StatisticAlgebra;
pub use builtin::builtin_algebra;
pub use registry::AlgebraRegistry;
pub use state::{HistogramResult, NumericBounds, StatResult, StatState};
