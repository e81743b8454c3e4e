//! Statistics values: one mutable aggregate bound to its identity
//!
//! A `StatisticsValue` pairs a `StatisticId` with the algebra for its kind
//! and the current merge state. Every mutation goes through the algebra, so
//! the value never needs to know which kind it holds.
//!
//! Values are transient: the dispatcher decodes one from the store, mutates
//! it and encodes it back under an optimistic version check.

use geostats_algebra::{AlgebraRegistry, StatResult, StatState, StatisticAlgebra};
use geostats_core::{Error, Record, Result, StatisticId, StatisticKind};
use std::sync::Arc;

/// Read contract shared by every statistic
pub trait Statistics {
    /// Materialized result; side-effect free
    fn result(&self) -> Result<StatResult>;

    /// Aggregation function
    fn kind(&self) -> &StatisticKind;

    /// Field or index disambiguator; empty for type-wide statistics
    fn extended_id(&self) -> &str;

    /// Record type the statistic summarizes
    fn data_type_name(&self) -> &str;
}

/// A statistic's merge state bound to its identity and algebra
#[derive(Debug, Clone)]
pub struct StatisticsValue {
    id: StatisticId,
    algebra: Arc<dyn StatisticAlgebra>,
    state: StatState,
}

impl StatisticsValue {
    /// Identity value for `id`
    ///
    /// # Errors
    ///
    /// Returns `InvalidKind` if the algebra maintains another kind.
    pub fn new(id: StatisticId, algebra: Arc<dyn StatisticAlgebra>) -> Result<Self> {
        let state = algebra.identity();
        Self::with_state(id, algebra, state)
    }

    /// Identity value with the algebra looked up in `registry`
    pub fn from_registry(id: StatisticId, registry: &AlgebraRegistry) -> Result<Self> {
        let algebra = registry.lookup(&id.kind)?;
        Self::new(id, algebra)
    }

    /// Value holding an existing state
    pub fn with_state(
        id: StatisticId,
        algebra: Arc<dyn StatisticAlgebra>,
        state: StatState,
    ) -> Result<Self> {
        if algebra.kind() != &id.kind {
            return Err(Error::InvalidKind {
                kind: id.kind.clone(),
                reason: format!("algebra maintains {}", algebra.kind()),
            });
        }
        Ok(StatisticsValue { id, algebra, state })
    }

    /// Decode a stored payload
    pub fn decode(id: StatisticId, algebra: Arc<dyn StatisticAlgebra>, payload: &[u8]) -> Result<Self> {
        let state: StatState = bincode::deserialize(payload)?;
        Self::with_state(id, algebra, state)
    }

    /// Encode the state as a store payload
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(&self.state)?)
    }

    /// Identity triple
    pub fn id(&self) -> &StatisticId {
        &self.id
    }

    /// The algebra maintaining this value
    pub fn algebra(&self) -> &Arc<dyn StatisticAlgebra> {
        &self.algebra
    }

    /// Current merge state
    pub fn state(&self) -> &StatState {
        &self.state
    }

    /// Check if the state equals the algebra identity
    pub fn is_identity(&self) -> bool {
        self.state == self.algebra.identity()
    }

    fn check_type(&self, record: &Record) -> Result<()> {
        if record.record_type != self.id.record_type {
            return Err(Error::TypeMismatch {
                expected: self.id.record_type.clone(),
                actual: record.record_type.clone(),
            });
        }
        Ok(())
    }

    /// Fold one record in
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if the record belongs to another record type.
    pub fn apply(&mut self, record: &Record) -> Result<()> {
        self.check_type(record)?;
        self.algebra.apply(&mut self.state, record)
    }

    /// Remove one previously applied record
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if the record belongs to another record type,
    /// or `NotInvertible` if the kind cannot retract.
    pub fn retract(&mut self, record: &Record) -> Result<()> {
        self.check_type(record)?;
        if !self.algebra.is_invertible() {
            return Err(Error::NotInvertible(self.id.kind.clone()));
        }
        self.algebra.retract(&mut self.state, record)
    }

    /// Combine another value of the same identity into this one
    ///
    /// # Errors
    ///
    /// Returns `IdentityMismatch` if the identities differ or the values
    /// were built from different algebras.
    pub fn merge_from(&mut self, other: &StatisticsValue) -> Result<()> {
        if self.id != other.id || !Arc::ptr_eq(&self.algebra, &other.algebra) {
            return Err(Error::IdentityMismatch {
                left: self.id.clone(),
                right: other.id.clone(),
            });
        }
        self.algebra.combine(&mut self.state, &other.state)
    }

    /// Restore the identity value
    pub fn reset(&mut self) {
        self.state = self.algebra.identity();
    }
}

impl Statistics for StatisticsValue {
    fn result(&self) -> Result<StatResult> {
        self.algebra.result(&self.state)
    }

    fn kind(&self) -> &StatisticKind {
        &self.id.kind
    }

    fn extended_id(&self) -> &str {
        &self.id.extended_id
    }

    fn data_type_name(&self) -> &str {
        &self.id.record_type
    }
}
