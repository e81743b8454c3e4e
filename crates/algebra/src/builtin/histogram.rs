//! Fixed-bin histogram
//!
//! Bins split `[lower, upper)` evenly. Values outside the range clamp into
//! the first or last bin so every numeric value is counted exactly once,
//! which keeps the histogram invertible.

use crate::algebra::{retract_underflow, shape_mismatch, StatisticAlgebra};
use crate::state::{HistogramResult, StatResult, StatState};
use geostats_core::{Error, Record, Result, StatisticKind};

/// Upper limit on bins per histogram
pub const MAX_BINS: u32 = 65_536;

/// Histogram of a numeric field
#[derive(Debug)]
pub struct HistogramAlgebra {
    kind: StatisticKind,
    field: String,
    bins: u32,
    lower: i64,
    upper: i64,
}

impl HistogramAlgebra {
    /// Create a histogram, validating the bin layout
    pub fn new(field: impl Into<String>, bins: u32, lower: i64, upper: i64) -> Result<Self> {
        let field = field.into();
        let kind = StatisticKind::histogram(field.clone(), bins, lower, upper);
        if bins == 0 || bins > MAX_BINS {
            return Err(Error::InvalidKind {
                kind,
                reason: format!("bin count must be within 1..={}", MAX_BINS),
            });
        }
        if lower >= upper {
            return Err(Error::InvalidKind {
                kind,
                reason: "lower bound must be below upper bound".to_string(),
            });
        }
        Ok(HistogramAlgebra {
            kind,
            field,
            bins,
            lower,
            upper,
        })
    }

    /// Bin index for a value
    pub fn bin_of(&self, v: f64) -> usize {
        let width = (self.upper as f64 - self.lower as f64) / self.bins as f64;
        let idx = ((v - self.lower as f64) / width).floor();
        if idx <= 0.0 {
            0
        } else {
            (idx as usize).min(self.bins as usize - 1)
        }
    }

    fn bin_for(&self, record: &Record) -> Option<usize> {
        record
            .field(&self.field)
            .and_then(|v| v.as_f64())
            .map(|v| self.bin_of(v))
    }

    fn bins_mut<'a>(&self, state: &'a mut StatState) -> Result<&'a mut Vec<u64>> {
        if !matches!(state, StatState::Histogram(bins) if bins.len() == self.bins as usize) {
            return Err(shape_mismatch(&self.kind, state));
        }
        match state {
            StatState::Histogram(bins) => Ok(bins),
            other => Err(shape_mismatch(&self.kind, other)),
        }
    }
}

impl StatisticAlgebra for HistogramAlgebra {
    fn kind(&self) -> &StatisticKind {
        &self.kind
    }

    fn identity(&self) -> StatState {
        StatState::Histogram(vec![0; self.bins as usize])
    }

    fn apply(&self, state: &mut StatState, record: &Record) -> Result<()> {
        let bins = self.bins_mut(state)?;
        if let Some(i) = self.bin_for(record) {
            bins[i] += 1;
        }
        Ok(())
    }

    fn combine(&self, state: &mut StatState, other: &StatState) -> Result<()> {
        let other_bins = match other {
            StatState::Histogram(b) if b.len() == self.bins as usize => b,
            other => return Err(shape_mismatch(&self.kind, other)),
        };
        let bins = self.bins_mut(state)?;
        for (a, b) in bins.iter_mut().zip(other_bins) {
            *a += b;
        }
        Ok(())
    }

    fn is_invertible(&self) -> bool {
        true
    }

    fn retract(&self, state: &mut StatState, record: &Record) -> Result<()> {
        let bins = self.bins_mut(state)?;
        if let Some(i) = self.bin_for(record) {
            bins[i] = bins[i]
                .checked_sub(1)
                .ok_or_else(|| retract_underflow(&self.kind, record))?;
        }
        Ok(())
    }

    fn result(&self, state: &StatState) -> Result<StatResult> {
        match state {
            StatState::Histogram(bins) => Ok(StatResult::Histogram(HistogramResult {
                lower: self.lower,
                upper: self.upper,
                bins: bins.clone(),
            })),
            other => Err(shape_mismatch(&self.kind, other)),
        }
    }
}
