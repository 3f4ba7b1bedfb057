//! Pluggable legacy filter strategies.
//!
//! A subscription in `legacy_only` mode may name a strategy through
//! `legacyFilterClassName`. The strategy receives the candidates that already
//! passed identifier, time and watermark filtering and may only narrow them.
//! Strategies are looked up by name in a [`StrategyRegistry`].

mod builtin;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use vigil_core::AnomalyEvent;

use crate::error::{AlertError, Result};

pub use builtin::{DummyAlertFilter, IdentityFilter, ScoreThresholdConfig, ScoreThresholdFilter};

/// Legacy-pipeline business rules applied after identifier matching.
pub trait LegacyFilterStrategy: Send + Sync {
    /// Name the strategy is registered under by default.
    fn name(&self) -> &str;

    /// Return the subset of `candidates` that should still be notified.
    fn apply(
        &self,
        candidates: BTreeSet<AnomalyEvent>,
        config: &serde_yaml::Value,
    ) -> Result<BTreeSet<AnomalyEvent>>;
}

/// Name → strategy lookup table.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: HashMap<String, Arc<dyn LegacyFilterStrategy>>,
}

impl StrategyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `identity`, `dummy` (alias `DummyAlertFilter`) and
    /// `score_threshold`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(IdentityFilter));
        let dummy: Arc<dyn LegacyFilterStrategy> = Arc::new(DummyAlertFilter);
        registry.register_as("DummyAlertFilter", Arc::clone(&dummy));
        registry.register(dummy);
        registry.register(Arc::new(ScoreThresholdFilter));
        registry
    }

    /// Register a strategy under its own name, replacing any previous one.
    pub fn register(&mut self, strategy: Arc<dyn LegacyFilterStrategy>) {
        let name = strategy.name().to_string();
        self.register_as(&name, strategy);
    }

    /// Register a strategy under an explicit name.
    pub fn register_as(&mut self, name: &str, strategy: Arc<dyn LegacyFilterStrategy>) {
        self.strategies.insert(name.to_string(), strategy);
    }

    /// Resolve a configured name, failing with `UnknownLegacyStrategy`.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn LegacyFilterStrategy>> {
        self.strategies
            .get(name)
            .cloned()
            .ok_or_else(|| AlertError::UnknownLegacyStrategy(name.to_string()))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.strategies.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.names())
            .finish()
    }
}
