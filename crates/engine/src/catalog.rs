//! Type catalog: which statistics each record type maintains
//!
//! A binding ties a `StatisticId` to the algebra that maintains it. Every
//! record type has an implicit type-wide `COUNT` binding; registration adds
//! type-wide and field-scoped bindings, and indexes add bindings whose
//! extended id is the index name.
//!
//! Readers get an `Arc` snapshot of a type's bindings, so ingest never holds
//! the catalog lock while it talks to the store.

use geostats_algebra::{AlgebraRegistry, StatisticAlgebra};
use geostats_core::{
    Error, Record, Result, ScanQuery, StatisticEntry, StatisticId, StatisticKind,
    StatisticsStore, Version,
};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::value::StatisticsValue;

/// A maintained statistic and its algebra
#[derive(Debug, Clone)]
pub struct Binding {
    /// Identity of the maintained statistic
    pub id: StatisticId,
    /// Algebra for the statistic's kind
    pub algebra: Arc<dyn StatisticAlgebra>,
}

impl Binding {
    /// Resolve the algebra for an identity
    pub fn resolve(id: StatisticId, registry: &AlgebraRegistry) -> Result<Self> {
        let algebra = registry.lookup(&id.kind)?;
        Ok(Binding { id, algebra })
    }

    /// Check if a record contributes to this statistic
    ///
    /// Kinds that read a field only see records carrying it.
    pub fn applies_to(&self, record: &Record) -> bool {
        self.algebra
            .depends_on()
            .map_or(true, |field| record.has_field(field))
    }

    /// Check if deletes can be subtracted instead of recomputed
    pub fn is_invertible(&self) -> bool {
        self.algebra.is_invertible()
    }

    /// Identity value for this binding
    pub fn identity_value(&self) -> Result<StatisticsValue> {
        StatisticsValue::new(self.id.clone(), Arc::clone(&self.algebra))
    }
}

/// Declaration of a statistic to maintain for a record type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSpec {
    /// Aggregation function
    pub kind: StatisticKind,
    /// Extended id; empty for type-wide
    pub extended_id: String,
}

impl BindingSpec {
    /// Type-wide statistic
    pub fn type_wide(kind: StatisticKind) -> Self {
        BindingSpec {
            kind,
            extended_id: String::new(),
        }
    }

    /// Statistic scoped to the field its kind reads
    ///
    /// Kinds without a field are type-wide.
    pub fn field(kind: StatisticKind) -> Self {
        let extended_id = kind.field().unwrap_or_default().to_string();
        BindingSpec { kind, extended_id }
    }

    /// Statistic with an explicit extended id
    pub fn scoped(kind: StatisticKind, extended_id: impl Into<String>) -> Self {
        BindingSpec {
            kind,
            extended_id: extended_id.into(),
        }
    }
}

/// Bindings of one record type
#[derive(Debug, Clone)]
pub struct TypeBindings {
    /// Record type name
    pub record_type: String,
    /// Maintained statistics, in identity order
    pub bindings: Vec<Binding>,
    /// Registered index names
    pub indexes: BTreeSet<String>,
}

impl TypeBindings {
    fn implicit(record_type: &str, registry: &AlgebraRegistry) -> Result<Self> {
        Ok(TypeBindings {
            record_type: record_type.to_string(),
            bindings: vec![Binding::resolve(StatisticId::count(record_type), registry)?],
            indexes: BTreeSet::new(),
        })
    }

    fn contains(&self, id: &StatisticId) -> bool {
        self.bindings.iter().any(|b| &b.id == id)
    }

    fn insert(&mut self, binding: Binding) -> bool {
        if self.contains(&binding.id) {
            return false;
        }
        self.bindings.push(binding);
        self.bindings.sort_by(|a, b| a.id.cmp(&b.id));
        true
    }

    /// Bindings a record contributes to
    pub fn applicable<'a>(&'a self, record: &'a Record) -> impl Iterator<Item = &'a Binding> + 'a {
        self.bindings.iter().filter(move |b| b.applies_to(record))
    }

    /// Binding for an identity
    pub fn get(&self, id: &StatisticId) -> Option<&Binding> {
        self.bindings.iter().find(|b| &b.id == id)
    }
}

/// Registry of record types and their statistic bindings
pub struct TypeCatalog {
    registry: Arc<AlgebraRegistry>,
    store: Arc<dyn StatisticsStore>,
    types: RwLock<FxHashMap<String, Arc<TypeBindings>>>,
}

impl TypeCatalog {
    /// Create an empty catalog
    pub fn new(registry: Arc<AlgebraRegistry>, store: Arc<dyn StatisticsStore>) -> Self {
        TypeCatalog {
            registry,
            store,
            types: RwLock::new(FxHashMap::default()),
        }
    }

    /// The algebra registry bindings resolve against
    pub fn registry(&self) -> &Arc<AlgebraRegistry> {
        &self.registry
    }

    fn resolve_specs(&self, record_type: &str, specs: &[BindingSpec]) -> Result<Vec<Binding>> {
        specs
            .iter()
            .map(|spec| {
                let id = StatisticId::new(record_type, spec.kind.clone(), spec.extended_id.clone());
                Binding::resolve(id, &self.registry)
            })
            .collect()
    }

    /// Write identity values for keys that do not exist yet
    fn precreate(&self, bindings: &[Binding]) -> Result<()> {
        for binding in bindings {
            let payload = binding.identity_value()?.encode()?;
            match self
                .store
                .put(binding.id.clone(), StatisticEntry::clean(payload), Version::ZERO)
            {
                Ok(_) => {}
                // Already present, possibly already updated
                Err(Error::VersionConflict { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn update<F>(&self, record_type: &str, mutate: F) -> Result<Arc<TypeBindings>>
    where
        F: FnOnce(&mut TypeBindings) -> Result<()>,
    {
        let mut types = self.types.write();
        let mut entry = match types.get(record_type) {
            Some(existing) => (**existing).clone(),
            None => TypeBindings::implicit(record_type, &self.registry)?,
        };
        mutate(&mut entry)?;
        let entry = Arc::new(entry);
        types.insert(record_type.to_string(), Arc::clone(&entry));
        Ok(entry)
    }

    /// Declare the statistics maintained for a record type
    ///
    /// Re-registering adds bindings not yet present. Identity values are
    /// written for keys that do not exist in the store. Returns the new
    /// bindings' identities.
    ///
    /// # Errors
    ///
    /// Returns `UnknownKind` or `InvalidKind` if a kind cannot be resolved,
    /// or `InvalidOperation` if an extended id names an index; nothing is
    /// registered in that case.
    pub fn register_type(&self, record_type: &str, specs: &[BindingSpec]) -> Result<Vec<StatisticId>> {
        let resolved = self.resolve_specs(record_type, specs)?;
        let mut added = Vec::new();
        let entry = self.update(record_type, |entry| {
            if let Some(clash) = resolved
                .iter()
                .find(|b| entry.indexes.contains(&b.id.extended_id))
            {
                return Err(Error::InvalidOperation(format!(
                    "extended id '{}' of {} is an index name on '{}'",
                    clash.id.extended_id, clash.id.kind, record_type
                )));
            }
            for binding in resolved {
                let id = binding.id.clone();
                if entry.insert(binding) {
                    added.push(id);
                }
            }
            Ok(())
        })?;
        self.precreate(&entry.bindings)?;
        info!(
            target: "geostats::catalog",
            record_type,
            added = added.len(),
            total = entry.bindings.len(),
            "Record type registered"
        );
        Ok(added)
    }

    /// Add index-scoped statistics whose extended id is the index name
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the index already exists or its name is
    /// already used as an extended id, or a kind resolution error.
    pub fn add_index(
        &self,
        record_type: &str,
        index_name: &str,
        kinds: &[StatisticKind],
    ) -> Result<Vec<StatisticId>> {
        if index_name.is_empty() {
            return Err(Error::InvalidOperation("index name must not be empty".into()));
        }
        let specs: Vec<BindingSpec> = kinds
            .iter()
            .map(|k| BindingSpec::scoped(k.clone(), index_name))
            .collect();
        let resolved = self.resolve_specs(record_type, &specs)?;
        let mut added = Vec::new();
        let entry = self.update(record_type, |entry| {
            if !entry.indexes.insert(index_name.to_string()) {
                return Err(Error::InvalidOperation(format!(
                    "index '{}' already exists on '{}'",
                    index_name, record_type
                )));
            }
            // The index owns every binding under its name
            if entry.bindings.iter().any(|b| b.id.extended_id == index_name) {
                return Err(Error::InvalidOperation(format!(
                    "index name '{}' is already an extended id on '{}'",
                    index_name, record_type
                )));
            }
            for binding in resolved {
                let id = binding.id.clone();
                if entry.insert(binding) {
                    added.push(id);
                }
            }
            Ok(())
        })?;
        let new_bindings: Vec<Binding> = added
            .iter()
            .filter_map(|id| entry.get(id).cloned())
            .collect();
        self.precreate(&new_bindings)?;
        debug!(target: "geostats::catalog", record_type, index = index_name, added = added.len(), "Index added");
        Ok(added)
    }

    /// Remove a record type and every statistic stored for it
    ///
    /// Returns the number of deleted statistics.
    pub fn drop_type(&self, record_type: &str) -> Result<usize> {
        self.types.write().remove(record_type);
        let removed = self
            .store
            .delete_matching(&ScanQuery::record_type(record_type))?;
        info!(target: "geostats::catalog", record_type, removed, "Record type dropped");
        Ok(removed)
    }

    /// Remove an index's bindings and their stored statistics
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the index does not exist.
    pub fn drop_index(&self, record_type: &str, index_name: &str) -> Result<usize> {
        let mut dropped = Vec::new();
        {
            let mut types = self.types.write();
            let current = types
                .get(record_type)
                .filter(|entry| entry.indexes.contains(index_name))
                .ok_or_else(|| {
                    Error::InvalidOperation(format!(
                        "no index '{}' on '{}'",
                        index_name, record_type
                    ))
                })?;
            let mut entry = (**current).clone();
            entry.indexes.remove(index_name);
            entry.bindings.retain(|b| {
                let keep = b.id.extended_id != index_name;
                if !keep {
                    dropped.push(b.id.clone());
                }
                keep
            });
            types.insert(record_type.to_string(), Arc::new(entry));
        }
        let mut removed = 0;
        for id in &dropped {
            if self.store.delete(id)?.is_some() {
                removed += 1;
            }
        }
        debug!(target: "geostats::catalog", record_type, index = index_name, removed, "Index dropped");
        Ok(removed)
    }

    /// Bindings of a record type, registering the implicit count on first use
    pub fn bindings_for(&self, record_type: &str) -> Result<Arc<TypeBindings>> {
        if let Some(entry) = self.types.read().get(record_type) {
            return Ok(Arc::clone(entry));
        }
        let mut types = self.types.write();
        if let Some(entry) = types.get(record_type) {
            return Ok(Arc::clone(entry));
        }
        let entry = Arc::new(TypeBindings::implicit(record_type, &self.registry)?);
        types.insert(record_type.to_string(), Arc::clone(&entry));
        debug!(target: "geostats::catalog", record_type, "Record type created on first use");
        Ok(entry)
    }

    /// Bindings of a record type if it is known
    pub fn get(&self, record_type: &str) -> Option<Arc<TypeBindings>> {
        self.types.read().get(record_type).cloned()
    }

    /// Check if an identity is currently bound
    pub fn is_bound(&self, id: &StatisticId) -> bool {
        self.types
            .read()
            .get(&id.record_type)
            .map_or(false, |entry| entry.contains(id))
    }

    /// Binding for a stored identity
    ///
    /// Falls back to the registry for identities the catalog does not know,
    /// as after a restart before types are re-registered.
    pub fn binding(&self, id: &StatisticId) -> Result<Binding> {
        if let Some(binding) = self
            .types
            .read()
            .get(&id.record_type)
            .and_then(|entry| entry.get(id).cloned())
        {
            return Ok(binding);
        }
        Binding::resolve(id.clone(), &self.registry)
    }

    /// Known record types, sorted
    pub fn record_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for TypeCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeCatalog")
            .field("record_types", &self.types.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geostats_core::{FieldValue, KindParams};
    use geostats_storage::ShardedStatisticsStore;

    fn catalog() -> (TypeCatalog, Arc<ShardedStatisticsStore>) {
        let store = Arc::new(ShardedStatisticsStore::new());
        let catalog = TypeCatalog::new(
            Arc::new(AlgebraRegistry::with_builtins()),
            Arc::clone(&store) as Arc<dyn StatisticsStore>,
        );
        (catalog, store)
    }

    #[test]
    fn test_implicit_count_on_first_use() {
        let (catalog, _) = catalog();
        let entry = catalog.bindings_for("Station").unwrap();
        assert_eq!(entry.bindings.len(), 1);
        assert_eq!(entry.bindings[0].id, StatisticId::count("Station"));
    }

    #[test]
    fn test_register_precreates_identity_values() {
        let (catalog, store) = catalog();
        let added = catalog
            .register_type(
                "Station",
                &[BindingSpec::field(StatisticKind::bounding_extent("geom"))],
            )
            .unwrap();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].extended_id, "geom");

        let entry = catalog.get("Station").unwrap();
        assert_eq!(entry.bindings.len(), 2);
        for binding in &entry.bindings {
            let stored = store.get(&binding.id).unwrap().unwrap();
            let value = StatisticsValue::decode(
                binding.id.clone(),
                Arc::clone(&binding.algebra),
                &stored.value.payload,
            )
            .unwrap();
            assert!(value.is_identity());
        }
    }

    #[test]
    fn test_reregister_is_additive_and_keeps_values() {
        let (catalog, store) = catalog();
        catalog.register_type("Station", &[]).unwrap();
        let id = StatisticId::count("Station");
        let before = store.get(&id).unwrap().unwrap().version;

        let added = catalog
            .register_type("Station", &[BindingSpec::type_wide(StatisticKind::count())])
            .unwrap();
        assert!(added.is_empty());
        assert_eq!(store.get(&id).unwrap().unwrap().version, before);
    }

    #[test]
    fn test_register_unknown_kind_registers_nothing() {
        let (catalog, _) = catalog();
        let err = catalog
            .register_type(
                "Station",
                &[
                    BindingSpec::field(StatisticKind::sum("pop")),
                    BindingSpec::type_wide(StatisticKind::custom("MEDIAN", KindParams::default())),
                ],
            )
            .unwrap_err();
        assert!(matches!(err, Error::UnknownKind(_)));
        assert!(catalog.get("Station").is_none());
    }

    #[test]
    fn test_applicable_filters_on_dependency_field() {
        let (catalog, _) = catalog();
        catalog
            .register_type("Station", &[BindingSpec::field(StatisticKind::sum("pop"))])
            .unwrap();
        let entry = catalog.get("Station").unwrap();

        let bare = Record::new("s1", "Station");
        assert_eq!(entry.applicable(&bare).count(), 1);

        let with_pop = bare.with_field("pop", FieldValue::Int(3));
        assert_eq!(entry.applicable(&with_pop).count(), 2);
    }

    #[test]
    fn test_add_and_drop_index() {
        let (catalog, store) = catalog();
        catalog.register_type("Station", &[]).unwrap();
        let added = catalog
            .add_index(
                "Station",
                "idx_geom",
                &[StatisticKind::count(), StatisticKind::bounding_extent("geom")],
            )
            .unwrap();
        assert_eq!(added.len(), 2);
        assert!(added.iter().all(|id| id.extended_id == "idx_geom"));
        assert_eq!(store.total_entries(), 3);

        assert!(matches!(
            catalog.add_index("Station", "idx_geom", &[StatisticKind::count()]),
            Err(Error::InvalidOperation(_))
        ));

        assert_eq!(catalog.drop_index("Station", "idx_geom").unwrap(), 2);
        assert_eq!(store.total_entries(), 1);
        assert_eq!(catalog.get("Station").unwrap().bindings.len(), 1);
        assert!(matches!(
            catalog.drop_index("Station", "idx_geom"),
            Err(Error::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_index_name_cannot_shadow_field_statistics() {
        let (catalog, store) = catalog();
        catalog
            .register_type("Station", &[BindingSpec::field(StatisticKind::bounding_extent("geom"))])
            .unwrap();
        assert!(matches!(
            catalog.add_index("Station", "geom", &[StatisticKind::bounding_extent("geom")]),
            Err(Error::InvalidOperation(_))
        ));
        // Rejected index leaves nothing behind to drop
        assert!(catalog.get("Station").unwrap().indexes.is_empty());
        assert!(matches!(
            catalog.drop_index("Station", "geom"),
            Err(Error::InvalidOperation(_))
        ));
        let field_id = StatisticId::new("Station", StatisticKind::bounding_extent("geom"), "geom");
        assert!(catalog.is_bound(&field_id));
        assert!(store.get(&field_id).unwrap().is_some());

        // Nor can a field statistic move into an index's namespace
        catalog
            .add_index("Station", "when", &[StatisticKind::count()])
            .unwrap();
        assert!(matches!(
            catalog.register_type("Station", &[BindingSpec::field(StatisticKind::time_range("when"))]),
            Err(Error::InvalidOperation(_))
        ));
        assert_eq!(catalog.drop_index("Station", "when").unwrap(), 1);
        assert_eq!(catalog.get("Station").unwrap().bindings.len(), 2);
    }

    #[test]
    fn test_drop_type_removes_values() {
        let (catalog, store) = catalog();
        catalog
            .register_type("Station", &[BindingSpec::field(StatisticKind::time_range("when"))])
            .unwrap();
        catalog.register_type("Road", &[]).unwrap();
        assert_eq!(catalog.drop_type("Station").unwrap(), 2);
        assert!(catalog.get("Station").is_none());
        assert_eq!(store.record_types().unwrap(), vec!["Road"]);
        assert_eq!(catalog.record_types(), vec!["Road"]);
    }

    #[test]
    fn test_binding_falls_back_to_registry() {
        let (catalog, _) = catalog();
        let id = StatisticId::new("Road", StatisticKind::numeric_range("lanes"), "lanes");
        assert!(!catalog.is_bound(&id));
        let binding = catalog.binding(&id).unwrap();
        assert_eq!(binding.id, id);
        assert!(!binding.is_invertible());
    }
}
