//! Strategy registry: the prioritized, validated set of active strategies.
//!
//! # Responsibility
//! - Decode raw strategy definitions into typed `StrategyConfig` values.
//! - Isolate configuration failures to the offending strategy.
//!
//! # Invariants
//! - A built registry is immutable; configuration changes build a new one.
//! - `active_strategies()` is ordered by ascending priority, ties broken by
//!   definition order.
//! - The registry performs no I/O.

use crate::strategy::{ConfigurationError, StrategyConfig};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw, untyped strategy definition as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategyDefinition {
    pub kind: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub params: Value,
}

fn default_enabled() -> bool {
    true
}

impl StrategyDefinition {
    pub fn new(kind: &str, priority: i32, params: Value) -> Self {
        Self {
            kind: kind.to_string(),
            priority,
            enabled: true,
            params,
        }
    }
}

/// One active strategy with its bound configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredStrategy {
    pub label: String,
    pub priority: i32,
    pub config: StrategyConfig,
}

/// Read-only snapshot of active strategies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrategyRegistry {
    strategies: Vec<RegisteredStrategy>,
}

/// Result of building a registry: the usable registry plus every rejected
/// strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryBuild {
    pub registry: StrategyRegistry,
    pub errors: Vec<ConfigurationError>,
}

impl StrategyRegistry {
    /// Builds a registry from raw definitions.
    ///
    /// Disabled definitions are skipped. A definition that fails to decode
    /// is excluded and reported in `RegistryBuild::errors`; all other
    /// strategies still become active.
    pub fn build(definitions: &[StrategyDefinition]) -> RegistryBuild {
        let mut strategies = Vec::new();
        let mut errors = Vec::new();

        for (index, definition) in definitions.iter().enumerate() {
            let label = format!("{}[{index}]", definition.kind.trim());
            if !definition.enabled {
                debug!(
                    "event=registry_build module=registry status=skip strategy={label} reason=disabled"
                );
                continue;
            }

            match StrategyConfig::decode(&label, &definition.kind, &definition.params) {
                Ok(config) => strategies.push(RegisteredStrategy {
                    label,
                    priority: definition.priority,
                    config,
                }),
                Err(err) => {
                    warn!(
                        "event=registry_build module=registry status=error strategy={} error_code=invalid_strategy_config error={}",
                        err.strategy, err.message
                    );
                    errors.push(err);
                }
            }
        }

        let registry = Self::from_strategies(strategies);
        info!(
            "event=registry_build module=registry status=ok active={} rejected={}",
            registry.len(),
            errors.len()
        );
        RegistryBuild { registry, errors }
    }

    /// Builds a registry from already-typed configurations.
    ///
    /// Each configuration is range-checked the same way decoded definitions
    /// are; failures are excluded and reported in `RegistryBuild::errors`.
    pub fn from_configs(
        configs: impl IntoIterator<Item = (i32, StrategyConfig)>,
    ) -> RegistryBuild {
        let mut strategies = Vec::new();
        let mut errors = Vec::new();

        for (index, (priority, config)) in configs.into_iter().enumerate() {
            let label = format!("{}[{index}]", config.kind());
            match config.validate() {
                Ok(()) => strategies.push(RegisteredStrategy {
                    label,
                    priority,
                    config,
                }),
                Err(message) => {
                    warn!(
                        "event=registry_build module=registry status=error strategy={label} error_code=invalid_strategy_config error={message}"
                    );
                    errors.push(ConfigurationError::new(label, message));
                }
            }
        }

        RegistryBuild {
            registry: Self::from_strategies(strategies),
            errors,
        }
    }

    fn from_strategies(mut strategies: Vec<RegisteredStrategy>) -> Self {
        // Stable sort keeps definition order among equal priorities.
        strategies.sort_by_key(|strategy| strategy.priority);
        Self { strategies }
    }

    /// Returns active strategies in priority order.
    pub fn active_strategies(&self) -> &[RegisteredStrategy] {
        &self.strategies
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}
