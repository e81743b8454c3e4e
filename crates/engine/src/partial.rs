//! Partial aggregates folded off-store
//!
//! A partition's updater folds its records into a `PartialAggregator`
//! without touching the store, partials from several partitions are merged,
//! and the result is published with one combine per statistic.
//!
//! ```ignore
//! let mut left = engine.partial();
//! let mut right = engine.partial();
//! left.add(&record_a)?;
//! right.add(&record_b)?;
//! left.merge(right)?;
//! engine.publish(left)?;
//! ```

use crate::catalog::{Binding, TypeCatalog};
use crate::value::StatisticsValue;
use geostats_core::{Record, Result, StatisticId};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Per-statistic partial values for a set of records
#[derive(Debug, Clone)]
pub struct PartialAggregator {
    catalog: Arc<TypeCatalog>,
    values: BTreeMap<StatisticId, StatisticsValue>,
    records: usize,
}

impl PartialAggregator {
    /// Create an empty aggregator over a catalog's bindings
    pub fn new(catalog: Arc<TypeCatalog>) -> Self {
        PartialAggregator {
            catalog,
            values: BTreeMap::new(),
            records: 0,
        }
    }

    fn value_for(&mut self, binding: &Binding) -> Result<&mut StatisticsValue> {
        match self.values.entry(binding.id.clone()) {
            Entry::Occupied(slot) => Ok(slot.into_mut()),
            Entry::Vacant(slot) => Ok(slot.insert(binding.identity_value()?)),
        }
    }

    /// Fold a record into every statistic it contributes to
    pub fn add(&mut self, record: &Record) -> Result<()> {
        let bindings = self.catalog.bindings_for(&record.record_type)?;
        for binding in bindings.applicable(record) {
            self.value_for(binding)?.apply(record)?;
        }
        self.records += 1;
        Ok(())
    }

    /// Fold many records
    pub fn extend<'a, I>(&mut self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        for record in records {
            self.add(record)?;
        }
        Ok(())
    }

    /// Combine another partition's partials into this one
    pub fn merge(&mut self, other: PartialAggregator) -> Result<()> {
        for (id, value) in other.values {
            match self.values.entry(id) {
                Entry::Occupied(mut slot) => slot.get_mut().merge_from(&value)?,
                Entry::Vacant(slot) => {
                    slot.insert(value);
                }
            }
        }
        self.records += other.records;
        Ok(())
    }

    /// Partial value of a statistic, if any record touched it
    pub fn value(&self, id: &StatisticId) -> Option<&StatisticsValue> {
        self.values.get(id)
    }

    /// Partial values in identity order
    pub fn values(&self) -> impl Iterator<Item = &StatisticsValue> {
        self.values.values()
    }

    /// Consume into partial values in identity order
    pub fn into_values(self) -> impl Iterator<Item = StatisticsValue> {
        self.values.into_values()
    }

    /// Number of records folded in, merged partitions included
    pub fn record_count(&self) -> usize {
        self.records
    }

    /// Number of statistics touched
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if no statistic was touched
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
