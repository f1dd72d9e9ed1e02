//! Strategy registry: builders keyed by name, plus a cache of live shared
//! instances so every consumer drives the same ledger.

use std::collections::HashMap;

use serde::Serialize;

use strategy_core::{share, SharedStrategy, Strategy, StrategyCategory, StrategyError};

use crate::conservative::{ConservativeTrendStrategy, CONSERVATIVE_TREND};
use crate::momentum::{ModerateMomentumStrategy, MODERATE_MOMENTUM};

type StrategyBuilder = Box<dyn Fn() -> Result<Box<dyn Strategy>, StrategyError> + Send + Sync>;

struct RegistryEntry {
    builder: StrategyBuilder,
    description: String,
    category: StrategyCategory,
}

/// Catalog entry returned by [`StrategyRegistry::list`].
#[derive(Debug, Clone, Serialize)]
pub struct StrategyInfo {
    pub name: String,
    pub description: String,
    pub category: StrategyCategory,
}

/// Result of probing every registered builder.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryValidation {
    pub valid: Vec<String>,
    pub invalid: Vec<(String, String)>,
}

impl RegistryValidation {
    pub fn all_valid(&self) -> bool {
        self.invalid.is_empty()
    }
}

/// Registry of strategy builders and cached live instances.
///
/// Consumers receive shared handles; a second `get_instance` for the same
/// name returns the same instance with its accumulated state.
#[derive(Default)]
pub struct StrategyRegistry {
    entries: HashMap<String, RegistryEntry>,
    instances: HashMap<String, SharedStrategy>,
}

impl StrategyRegistry {
    /// An empty registry with no strategies registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-loaded with the built-in strategies.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(
            CONSERVATIVE_TREND,
            "Trend following with strict risk management",
            StrategyCategory::Conservative,
            || Ok(Box::new(ConservativeTrendStrategy::new())),
        );
        registry.register(
            MODERATE_MOMENTUM,
            "MACD/Bollinger momentum with volume confirmation",
            StrategyCategory::Moderate,
            || Ok(Box::new(ModerateMomentumStrategy::new())),
        );
        registry
    }

    /// Register a builder under a name. Re-registering a name replaces the
    /// builder and drops any cached instance.
    pub fn register<F>(
        &mut self,
        name: &str,
        description: &str,
        category: StrategyCategory,
        builder: F,
    ) where
        F: Fn() -> Result<Box<dyn Strategy>, StrategyError> + Send + Sync + 'static,
    {
        if self.entries.contains_key(name) {
            tracing::warn!("Strategy {} re-registered, replacing builder", name);
            self.instances.remove(name);
        }
        self.entries.insert(
            name.to_string(),
            RegistryEntry {
                builder: Box::new(builder),
                description: description.to_string(),
                category,
            },
        );
        tracing::info!("Strategy registered: {} ({})", name, category.as_str());
    }

    /// Build a fresh, unshared instance. Failures are logged at error
    /// level and returned, never panicked on.
    pub fn create(&self, name: &str) -> Result<Box<dyn Strategy>, StrategyError> {
        let Some(entry) = self.entries.get(name) else {
            tracing::error!("Unknown strategy requested: {}", name);
            return Err(StrategyError::UnknownStrategy(name.to_string()));
        };
        (entry.builder)().map_err(|e| {
            tracing::error!("Strategy {} failed to construct: {}", name, e);
            e
        })
    }

    /// Shared instance for a name, built on first use and cached after.
    pub fn get_instance(&mut self, name: &str) -> Result<SharedStrategy, StrategyError> {
        if let Some(instance) = self.instances.get(name) {
            return Ok(instance.clone());
        }
        let strategy = self.create(name)?;
        let shared = share(strategy);
        self.instances.insert(name.to_string(), shared.clone());
        Ok(shared)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Catalog of registered strategies, sorted by name.
    pub fn list(&self) -> Vec<StrategyInfo> {
        let mut infos: Vec<StrategyInfo> = self
            .entries
            .iter()
            .map(|(name, entry)| StrategyInfo {
                name: name.clone(),
                description: entry.description.clone(),
                category: entry.category,
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    /// Names of strategies in one risk category, sorted.
    pub fn get_by_category(&self, category: StrategyCategory) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.category == category)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Probe every builder once and report which construct successfully.
    pub fn validate(&self) -> RegistryValidation {
        let mut valid = Vec::new();
        let mut invalid = Vec::new();

        let mut names: Vec<&String> = self.entries.keys().collect();
        names.sort();

        for name in names {
            match self.create(name) {
                Ok(strategy) => {
                    // Construction and self-description must both work.
                    let params = strategy.parameters();
                    if params.get("name").and_then(|v| v.as_str()) == Some(name.as_str()) {
                        valid.push(name.clone());
                    } else {
                        invalid.push((
                            name.clone(),
                            "parameters() does not report the registered name".to_string(),
                        ));
                    }
                }
                // create already logged the failure
                Err(e) => invalid.push((name.clone(), e.to_string())),
            }
        }

        RegistryValidation { valid, invalid }
    }
}
