//! Named strategy registry
//!
//! Explicit name → strategy map. Configuration refers to strategies by
//! name; `select` resolves those names or fails on the first unknown one.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::AppError;
use crate::pipeline::traits::Strategy;

#[derive(Default, Clone)]
pub struct StrategyRegistry {
    strategies: BTreeMap<String, Arc<dyn Strategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under `strategy.name()`, returning any strategy it replaced
    pub fn register(&mut self, strategy: Arc<dyn Strategy>) -> Option<Arc<dyn Strategy>> {
        self.strategies.insert(strategy.name().to_string(), strategy)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Strategy>> {
        self.strategies.get(name).cloned()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        self.strategies.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Resolve configured names in the given order.
    ///
    /// An empty list selects every registered strategy (sorted by name).
    pub fn select(&self, names: &[String]) -> Result<Vec<Arc<dyn Strategy>>, AppError> {
        if names.is_empty() {
            return Ok(self.strategies.values().cloned().collect());
        }

        names
            .iter()
            .map(|name| {
                self.get(name).ok_or_else(|| {
                    AppError::Config(format!(
                        "Unknown strategy '{}' (registered: {:?})",
                        name,
                        self.names()
                    ))
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.names())
            .finish()
    }
}
