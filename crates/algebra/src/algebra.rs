//! The statistic algebra trait
//!
//! An algebra defines how one statistic kind accumulates and merges:
//!
//! - `identity()`: state with no contributing records
//! - `apply(state, record)`: fold one record in
//! - `combine(state, other)`: merge two partial states; must be associative
//!   and commutative so partitioned partials compose in any order
//! - `retract(state, record)`: optional inverse of `apply`
//!
//! Kinds without `retract` are non-invertible. Deletes touching them are
//! routed through scoped recomputation instead of subtraction, so the
//! dispatcher checks `is_invertible()` before picking a delete strategy.

use crate::state::{StatResult, StatState};
use geostats_core::{Error, Record, Result, StatisticKind};
use std::fmt;

/// Merge algebra of one statistic kind
pub trait StatisticAlgebra: Send + Sync + fmt::Debug {
    /// The kind this algebra serves (tag plus parameters)
    fn kind(&self) -> &StatisticKind;

    /// Field the algebra reads; `None` for record-level kinds like count
    fn depends_on(&self) -> Option<&str> {
        self.kind().field()
    }

    /// State with no contributing records
    fn identity(&self) -> StatState;

    /// Fold one record into the state
    ///
    /// Records lacking the dependency field, or carrying a value of an
    /// unusable type, do not contribute.
    fn apply(&self, state: &mut StatState, record: &Record) -> Result<()>;

    /// Merge `other` into `state`
    fn combine(&self, state: &mut StatState, other: &StatState) -> Result<()>;

    /// Check if the algebra supports `retract`
    fn is_invertible(&self) -> bool {
        false
    }

    /// Remove one previously applied record from the state
    fn retract(&self, _state: &mut StatState, _record: &Record) -> Result<()> {
        Err(Error::NotInvertible(self.kind().clone()))
    }

    /// Materialize the reader-facing result
    fn result(&self, state: &StatState) -> Result<StatResult>;
}

/// Error for a state whose variant does not belong to the algebra
pub(crate) fn shape_mismatch(kind: &StatisticKind, state: &StatState) -> Error {
    Error::InvalidOperation(format!(
        "{} algebra cannot operate on {} state",
        kind,
        state.shape()
    ))
}

/// Error for a retract that would take the state below identity
pub(crate) fn retract_underflow(kind: &StatisticKind, record: &Record) -> Error {
    Error::InvalidOperation(format!(
        "retracting record '{}' from {} would drop below identity",
        record.id, kind
    ))
}
