use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use core_config::upstream::BreakerConfig;

use crate::breaker::{BreakerSnapshot, CircuitBreaker};

/// One breaker per upstream name, created on first use.
///
/// Owned by the application state and handed to each client; breakers are
/// never shared between names.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    config: BreakerConfig,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    pub fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self
            .breakers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return existing.clone();
        }

        let mut breakers = self.breakers.write().unwrap_or_else(PoisonError::into_inner);
        breakers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(name, self.config.clone())))
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// All breakers, sorted by name.
    pub fn snapshot(&self) -> Vec<BreakerSnapshot> {
        let breakers = self.breakers.read().unwrap_or_else(PoisonError::into_inner);
        let mut snapshots: Vec<_> = breakers.values().map(|b| b.snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::CircuitState;

    #[test]
    fn test_same_name_returns_same_breaker() {
        let registry = BreakerRegistry::default();
        let a = registry.get_or_create("llm");
        let b = registry.get_or_create("llm");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_state_is_not_shared_between_names() {
        let registry = BreakerRegistry::new(BreakerConfig {
            failure_threshold: 1,
            ..BreakerConfig::default()
        });

        registry.get_or_create("llm").on_failure();

        assert_eq!(registry.get_or_create("llm").state(), CircuitState::Open);
        assert_eq!(registry.get_or_create("embeddings").state(), CircuitState::Closed);
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let registry = BreakerRegistry::default();
        registry.get_or_create("llm");
        registry.get_or_create("embeddings");

        let names: Vec<_> = registry.snapshot().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["embeddings", "llm"]);
        assert!(registry.get("missing").is_none());
    }
}
