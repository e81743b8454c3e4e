//! Algebra registry for dynamic statistic kinds
//!
//! The registry maps a statistic kind (tag plus parameters) to the algebra
//! that maintains it, so the dispatcher never hardcodes per-kind behavior.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let registry = AlgebraRegistry::with_builtins();
//!
//! // Built-in kinds resolve on demand for any valid parameters
//! let extent = registry.lookup(&StatisticKind::bounding_extent("geom"))?;
//!
//! // Third-party kinds are registered at startup
//! registry.register(Arc::new(MedianAlgebra::new("depth")))?;
//! ```
//!
//! Registration is append-only and expected at startup; steady-state
//! traffic only reads.

use crate::algebra::StatisticAlgebra;
use crate::builtin::builtin_algebra;
use geostats_core::{Error, Result, StatisticKind};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

static GLOBAL: Lazy<Arc<AlgebraRegistry>> = Lazy::new(|| Arc::new(AlgebraRegistry::with_builtins()));

/// Registry of statistic algebras
///
/// Maintains:
/// - Kind -> algebra for every registered or already-resolved kind
/// - Whether built-in tags resolve on demand
pub struct AlgebraRegistry {
    /// Algebras by kind
    algebras: RwLock<HashMap<StatisticKind, Arc<dyn StatisticAlgebra>>>,
    /// Resolve built-in tags lazily on lookup
    builtins: bool,
}

impl AlgebraRegistry {
    /// Create an empty registry without built-ins
    pub fn new() -> Self {
        AlgebraRegistry {
            algebras: RwLock::new(HashMap::new()),
            builtins: false,
        }
    }

    /// Create a registry that resolves built-in kinds on demand
    pub fn with_builtins() -> Self {
        AlgebraRegistry {
            algebras: RwLock::new(HashMap::new()),
            builtins: true,
        }
    }

    /// Process-wide registry with built-ins enabled
    pub fn global() -> Arc<AlgebraRegistry> {
        Arc::clone(&GLOBAL)
    }

    /// Register an algebra under its kind
    ///
    /// # Errors
    ///
    /// Returns `DuplicateKind` if the kind is already present, including a
    /// built-in kind that has already been resolved.
    pub fn register(&self, algebra: Arc<dyn StatisticAlgebra>) -> Result<()> {
        let kind = algebra.kind().clone();
        let mut algebras = self.algebras.write();
        if algebras.contains_key(&kind) {
            return Err(Error::DuplicateKind(kind));
        }
        debug!(target: "geostats::registry", kind = %kind, invertible = algebra.is_invertible(), "Algebra registered");
        algebras.insert(kind, algebra);
        Ok(())
    }

    /// Look up the algebra for a kind
    ///
    /// # Errors
    ///
    /// Returns `UnknownKind` if the kind is neither registered nor a
    /// built-in, or `InvalidKind` if built-in parameters are rejected.
    pub fn lookup(&self, kind: &StatisticKind) -> Result<Arc<dyn StatisticAlgebra>> {
        if let Some(algebra) = self.algebras.read().get(kind) {
            return Ok(Arc::clone(algebra));
        }
        if !self.builtins || !kind.tag().is_builtin() {
            return Err(Error::UnknownKind(kind.clone()));
        }
        let built = builtin_algebra(kind)?;
        // A concurrent lookup may have resolved the same kind first
        let mut algebras = self.algebras.write();
        let algebra = algebras.entry(kind.clone()).or_insert(built);
        Ok(Arc::clone(algebra))
    }

    /// Check if a kind is present (registered or resolved)
    pub fn contains(&self, kind: &StatisticKind) -> bool {
        self.algebras.read().contains_key(kind)
    }

    /// All present kinds, sorted
    pub fn kinds(&self) -> Vec<StatisticKind> {
        let mut kinds: Vec<_> = self.algebras.read().keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Get the number of present kinds
    pub fn len(&self) -> usize {
        self.algebras.read().len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.algebras.read().is_empty()
    }
}

impl Default for AlgebraRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for AlgebraRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlgebraRegistry")
            .field("kind_count", &self.len())
            .field("builtins", &self.builtins)
            .finish()
    }
}
