//! Record count and integer sum
//!
//! Both are invertible: a delete subtracts exactly what the ingest added.

use crate::algebra::{retract_underflow, shape_mismatch, StatisticAlgebra};
use crate::state::{StatResult, StatState};
use geostats_core::{Record, Result, StatisticKind};

/// Number of records of a type
#[derive(Debug)]
pub struct CountAlgebra {
    kind: StatisticKind,
}

impl CountAlgebra {
    /// Create the count algebra
    pub fn new() -> Self {
        CountAlgebra {
            kind: StatisticKind::count(),
        }
    }
}

impl Default for CountAlgebra {
    fn default() -> Self {
        Self::new()
    }
}

impl StatisticAlgebra for CountAlgebra {
    fn kind(&self) -> &StatisticKind {
        &self.kind
    }

    fn identity(&self) -> StatState {
        StatState::Count(0)
    }

    fn apply(&self, state: &mut StatState, _record: &Record) -> Result<()> {
        match state {
            StatState::Count(n) => {
                *n += 1;
                Ok(())
            }
            other => Err(shape_mismatch(&self.kind, other)),
        }
    }

    fn combine(&self, state: &mut StatState, other: &StatState) -> Result<()> {
        match (state, other) {
            (StatState::Count(a), StatState::Count(b)) => {
                *a += b;
                Ok(())
            }
            (_, other) => Err(shape_mismatch(&self.kind, other)),
        }
    }

    fn is_invertible(&self) -> bool {
        true
    }

    fn retract(&self, state: &mut StatState, record: &Record) -> Result<()> {
        match state {
            StatState::Count(n) => {
                *n = n
                    .checked_sub(1)
                    .ok_or_else(|| retract_underflow(&self.kind, record))?;
                Ok(())
            }
            other => Err(shape_mismatch(&self.kind, other)),
        }
    }

    fn result(&self, state: &StatState) -> Result<StatResult> {
        match state {
            StatState::Count(n) => Ok(StatResult::Count(*n)),
            other => Err(shape_mismatch(&self.kind, other)),
        }
    }
}

/// Exact sum of an integer field
///
/// Float fields are ignored: IEEE-754 addition is not associative, so a
/// float sum would depend on fold order.
#[derive(Debug)]
pub struct SumAlgebra {
    kind: StatisticKind,
    field: String,
}

impl SumAlgebra {
    /// Create a sum over `field`
    pub fn new(field: impl Into<String>) -> Self {
        let field = field.into();
        SumAlgebra {
            kind: StatisticKind::sum(field.clone()),
            field,
        }
    }

    fn value_of(&self, record: &Record) -> Option<i64> {
        record.field(&self.field).and_then(|v| v.as_i64())
    }
}

impl StatisticAlgebra for SumAlgebra {
    fn kind(&self) -> &StatisticKind {
        &self.kind
    }

    fn identity(&self) -> StatState {
        StatState::Sum {
            total: 0,
            contributors: 0,
        }
    }

    fn apply(&self, state: &mut StatState, record: &Record) -> Result<()> {
        match state {
            StatState::Sum {
                total,
                contributors,
            } => {
                if let Some(v) = self.value_of(record) {
                    *total += v as i128;
                    *contributors += 1;
                }
                Ok(())
            }
            other => Err(shape_mismatch(&self.kind, other)),
        }
    }

    fn combine(&self, state: &mut StatState, other: &StatState) -> Result<()> {
        match (state, other) {
            (
                StatState::Sum {
                    total,
                    contributors,
                },
                StatState::Sum {
                    total: t,
                    contributors: c,
                },
            ) => {
                *total += t;
                *contributors += c;
                Ok(())
            }
            (_, other) => Err(shape_mismatch(&self.kind, other)),
        }
    }

    fn is_invertible(&self) -> bool {
        true
    }

    fn retract(&self, state: &mut StatState, record: &Record) -> Result<()> {
        match state {
            StatState::Sum {
                total,
                contributors,
            } => {
                if let Some(v) = self.value_of(record) {
                    *contributors = contributors
                        .checked_sub(1)
                        .ok_or_else(|| retract_underflow(&self.kind, record))?;
                    *total -= v as i128;
                }
                Ok(())
            }
            other => Err(shape_mismatch(&self.kind, other)),
        }
    }

    fn result(&self, state: &StatState) -> Result<StatResult> {
        match state {
            StatState::Sum { total, .. } => Ok(StatResult::Sum(*total)),
            other => Err(shape_mismatch(&self.kind, other)),
        }
    }
}
