//! Distinct-value estimate (HyperLogLog)
//!
//! Registers keep the maximum leading-zero rank per bucket, so combining two
//! sketches is a register-wise max. That merge is associative, commutative
//! and idempotent, but a register cannot forget a value: the kind is
//! non-invertible.
//!
//! Values are hashed with xxh3 over `FieldValue::canonical_bytes`, which is
//! stable across processes so persisted sketches stay mergeable.

use crate::algebra::{shape_mismatch, StatisticAlgebra};
use crate::state::{StatResult, StatState};
use geostats_core::{Error, Record, Result, StatisticKind};
use xxhash_rust::xxh3::xxh3_64;

/// Smallest supported precision
pub const MIN_PRECISION: u8 = 4;
/// Largest supported precision
pub const MAX_PRECISION: u8 = 16;

/// Approximate distinct count of a field
#[derive(Debug)]
pub struct DistinctCountAlgebra {
    kind: StatisticKind,
    field: String,
    precision: u8,
}

impl DistinctCountAlgebra {
    /// Create a sketch with `2^precision` registers
    pub fn new(field: impl Into<String>, precision: u8) -> Result<Self> {
        let field = field.into();
        let kind = StatisticKind::distinct_count(field.clone(), precision);
        if !(MIN_PRECISION..=MAX_PRECISION).contains(&precision) {
            return Err(Error::InvalidKind {
                kind,
                reason: format!(
                    "precision must be within {}..={}",
                    MIN_PRECISION, MAX_PRECISION
                ),
            });
        }
        Ok(DistinctCountAlgebra {
            kind,
            field,
            precision,
        })
    }

    fn registers(&self) -> usize {
        1usize << self.precision
    }

    fn registers_mut<'a>(&self, state: &'a mut StatState) -> Result<&'a mut Vec<u8>> {
        let m = self.registers();
        if !matches!(state, StatState::Sketch(regs) if regs.len() == m) {
            return Err(shape_mismatch(&self.kind, state));
        }
        match state {
            StatState::Sketch(regs) => Ok(regs),
            other => Err(shape_mismatch(&self.kind, other)),
        }
    }

    /// Register index and rank for a hash
    fn locate(&self, hash: u64) -> (usize, u8) {
        let p = self.precision as u32;
        let idx = (hash >> (64 - p)) as usize;
        let rest = hash << p;
        let max_rank = (64 - p + 1) as u8;
        let rank = ((rest.leading_zeros() + 1) as u8).min(max_rank);
        (idx, rank)
    }

    fn estimate(&self, regs: &[u8]) -> u64 {
        let m = regs.len() as f64;
        let alpha = match regs.len() {
            16 => 0.673,
            32 => 0.697,
            64 => 0.709,
            _ => 0.7213 / (1.0 + 1.079 / m),
        };
        let harmonic: f64 = regs.iter().map(|&r| 2f64.powi(-(r as i32))).sum();
        let raw = alpha * m * m / harmonic;
        let zeros = regs.iter().filter(|&&r| r == 0).count();
        let estimate = if raw <= 2.5 * m && zeros > 0 {
            // Linear counting for small cardinalities
            m * (m / zeros as f64).ln()
        } else {
            raw
        };
        estimate.round() as u64
    }
}

impl StatisticAlgebra for DistinctCountAlgebra {
    fn kind(&self) -> &StatisticKind {
        &self.kind
    }

    fn identity(&self) -> StatState {
        StatState::Sketch(vec![0; self.registers()])
    }

    fn apply(&self, state: &mut StatState, record: &Record) -> Result<()> {
        let Some(value) = record.field(&self.field) else {
            let _ = self.registers_mut(state)?;
            return Ok(());
        };
        let (idx, rank) = self.locate(xxh3_64(&value.canonical_bytes()));
        let regs = self.registers_mut(state)?;
        if regs[idx] < rank {
            regs[idx] = rank;
        }
        Ok(())
    }

    fn combine(&self, state: &mut StatState, other: &StatState) -> Result<()> {
        let other_regs = match other {
            StatState::Sketch(r) if r.len() == self.registers() => r,
            other => return Err(shape_mismatch(&self.kind, other)),
        };
        let regs = self.registers_mut(state)?;
        for (a, b) in regs.iter_mut().zip(other_regs) {
            *a = (*a).max(*b);
        }
        Ok(())
    }

    fn result(&self, state: &StatState) -> Result<StatResult> {
        match state {
            StatState::Sketch(regs) if regs.len() == self.registers() => {
                Ok(StatResult::DistinctEstimate(self.estimate(regs)))
            }
            other => Err(shape_mismatch(&self.kind, other)),
        }
    }
}
