//! Engine configuration document.
//!
//! # Responsibility
//! - Load the horizon settings and strategy definitions from JSON.
//! - Provide the built-in default strategy catalog.
//!
//! # Invariants
//! - Strategy parameters stay untyped here; they are decoded and validated
//!   per strategy by `StrategyRegistry::build`.

use crate::registry::{RegistryBuild, StrategyDefinition, StrategyRegistry};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

const DEFAULT_LOOKAHEAD_DAYS: u32 = 365;

/// Horizon settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HorizonConfig {
    /// Days past "today" that upcoming milestones are discoverable.
    pub lookahead_days: u32,
}

impl Default for HorizonConfig {
    fn default() -> Self {
        Self {
            lookahead_days: DEFAULT_LOOKAHEAD_DAYS,
        }
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub horizon: HorizonConfig,
    pub strategies: Vec<StrategyDefinition>,
}

/// The configuration document could not be read or parsed.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read configuration: {err}"),
            Self::Parse(err) => write!(f, "failed to parse configuration: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

impl EngineConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Decodes strategy definitions into a registry snapshot.
    pub fn build_registry(&self) -> RegistryBuild {
        StrategyRegistry::build(&self.strategies)
    }

    /// Built-in catalog used when no configuration file is supplied.
    pub fn default_catalog() -> Self {
        Self {
            horizon: HorizonConfig::default(),
            strategies: vec![
                StrategyDefinition::new("anniversary", 10, json!({ "max_years": 100 })),
                StrategyDefinition::new(
                    "round_multiple",
                    20,
                    json!({ "bases": [100, 500, 1000, 5000, 10000], "units": ["day"] }),
                ),
                StrategyDefinition::new(
                    "round_multiple",
                    21,
                    json!({ "bases": [10], "units": ["week", "month"] }),
                ),
                StrategyDefinition::new(
                    "repdigit",
                    30,
                    json!({ "min_digits": 3, "max_digits": 6, "units": ["day"] }),
                ),
                StrategyDefinition::new(
                    "palindrome",
                    40,
                    json!({ "min_digits": 4, "max_digits": 6, "units": ["day"] }),
                ),
                StrategyDefinition::new(
                    "power_of_two",
                    50,
                    json!({ "min_exponent": 8, "units": ["day", "week"] }),
                ),
                StrategyDefinition::new(
                    "sequence",
                    60,
                    json!({ "min_length": 3, "max_length": 9, "units": ["day"] }),
                ),
                StrategyDefinition::new(
                    "special",
                    70,
                    json!({ "curated_values": [
                        { "value": 69, "unit": "day" },
                        { "value": 314, "unit": "day" },
                        { "value": 1001, "unit": "day" },
                        { "value": 42, "unit": "month" }
                    ] }),
                ),
                StrategyDefinition::new(
                    "compound",
                    80,
                    json!({ "granularities": [
                        { "years": 1, "months": 1, "days": 1 },
                        { "years": 2, "months": 2, "days": 2 },
                        { "years": 3, "months": 3, "days": 3 }
                    ] }),
                ),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, EngineConfig};

    #[test]
    fn default_catalog_builds_without_errors() {
        let build = EngineConfig::default_catalog().build_registry();
        assert!(build.errors.is_empty(), "{:?}", build.errors);
        assert_eq!(build.registry.len(), 9);
    }

    #[test]
    fn parses_document_with_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{ "strategies": [ { "kind": "anniversary", "params": { "max_years": 5 } } ] }"#,
        )
        .expect("config should parse");
        assert_eq!(config.horizon.lookahead_days, 365);
        assert_eq!(config.strategies.len(), 1);
        assert!(config.strategies[0].enabled);
        assert_eq!(config.strategies[0].priority, 0);
    }

    #[test]
    fn rejects_unknown_top_level_fields() {
        let err = EngineConfig::from_json_str(r#"{ "horizon": { "lookback_days": 3 } }"#)
            .expect_err("unknown field should fail");
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
