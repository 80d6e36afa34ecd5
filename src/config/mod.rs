//! Unified configuration for a resolution run.
//!
//! Configuration is loaded with precedence: CLI args > Env vars > Config file > Defaults
//!
//! # Example config file (unistudent.toml)
//! ```toml
//! [engine]
//! max_rounds = 12
//!
//! [identifier]
//! style = "year-prefixed"
//! prefix = "ETU"
//! width = 6
//!
//! [consolidation]
//! columns = ["nom", "prenoms", "cin", "naissance_date"]
//! ```
//!
//! Environment variables use the `UNISTUDENT_` prefix with `__` between
//! sections, e.g. `UNISTUDENT_ENGINE__MAX_ROUNDS=12`.

pub mod defaults;

pub use defaults::*;

use crate::assign::{IdentifierPolicy, PlainSequence, YearSequence};
use crate::error::ResolveError;
use crate::ontology::Ontology;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration for the resolver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Cluster engine settings
    pub engine: EngineConfig,
    /// Student identifier format
    pub identifier: IdentifierConfig,
    /// Attributes propagated across each cluster
    pub consolidation: ConsolidationConfig,
    /// Candidate keys and strong identifiers
    pub ontology: Ontology,
}

impl ResolverConfig {
    /// Load configuration with precedence: CLI args > Env > File > Defaults
    pub fn load(
        config_path: Option<&Path>,
        overrides: ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(ResolverConfig::default()));

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("UNISTUDENT_").split("__"));
        figment = figment.merge(Serialized::defaults(overrides));

        figment.extract().map_err(ConfigError::from)
    }

    /// Load from environment and optional config file only (no CLI overrides)
    pub fn from_env(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load(config_path, ConfigOverrides::default())
    }

    /// Check the settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ResolveError> {
        self.ontology.validate()?;
        if self.engine.max_rounds == Some(0) {
            return Err(ResolveError::InvalidConfig(
                "engine.max_rounds must be at least 1".to_string(),
            ));
        }
        if self.identifier.width == 0 {
            return Err(ResolveError::InvalidConfig(
                "identifier.width must be at least 1".to_string(),
            ));
        }
        if self.identifier.column.trim().is_empty() {
            return Err(ResolveError::InvalidConfig(
                "identifier.column must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Cluster engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Round cap; defaults to `DEFAULT_ROUNDS_PER_KEY` times the key count
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_rounds: Option<usize>,
}

impl EngineConfig {
    pub fn round_cap(&self, key_count: usize) -> usize {
        self.max_rounds
            .unwrap_or_else(|| key_count.max(1) * DEFAULT_ROUNDS_PER_KEY)
    }
}

/// Identifier format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum IdentifierStyle {
    /// `ETU000001`
    Plain,
    /// `ETU2023_000001`
    #[default]
    YearPrefixed,
}

/// Student identifier configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifierConfig {
    pub style: IdentifierStyle,
    pub prefix: String,
    /// Zero-padding width of the sequence
    pub width: usize,
    /// Year used for clusters without a parseable academic year
    pub missing_year_sentinel: u32,
    /// Output column for the generated identifier
    pub column: String,
    /// Optional output column for the raw cluster label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_column: Option<String>,
}

impl Default for IdentifierConfig {
    fn default() -> Self {
        Self {
            style: IdentifierStyle::default(),
            prefix: DEFAULT_ID_PREFIX.to_string(),
            width: DEFAULT_ID_WIDTH,
            missing_year_sentinel: DEFAULT_MISSING_YEAR,
            column: DEFAULT_ID_COLUMN.to_string(),
            cluster_column: None,
        }
    }
}

impl IdentifierConfig {
    /// Build the formatting policy selected by `style`.
    pub fn policy(&self) -> Box<dyn IdentifierPolicy> {
        match self.style {
            IdentifierStyle::Plain => Box::new(PlainSequence::new(&self.prefix, self.width)),
            IdentifierStyle::YearPrefixed => Box::new(YearSequence::new(
                &self.prefix,
                self.width,
                self.missing_year_sentinel,
            )),
        }
    }
}

/// Field consolidation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationConfig {
    pub columns: Vec<String>,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            columns: default_consolidation_columns(),
        }
    }
}

/// CLI overrides that take precedence over file and env config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<EngineOverrides>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<IdentifierOverrides>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_rounds: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifierOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<IdentifierStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

/// Configuration error.
#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ResolverConfig::default();
        assert_eq!(config.identifier.style, IdentifierStyle::YearPrefixed);
        assert_eq!(config.identifier.prefix, "ETU");
        assert_eq!(config.identifier.width, DEFAULT_ID_WIDTH);
        assert_eq!(config.engine.round_cap(6), 24);
        assert_eq!(config.consolidation.columns.len(), 18);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_round_cap_override() {
        let engine = EngineConfig {
            max_rounds: Some(3),
        };
        assert_eq!(engine.round_cap(6), 3);
    }

    #[test]
    fn test_validate_rejects_zero_width_and_rounds() {
        let mut config = ResolverConfig::default();
        config.identifier.width = 0;
        assert!(config.validate().is_err());

        let mut config = ResolverConfig::default();
        config.engine.max_rounds = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_style_serde() {
        let json = serde_json::to_string(&IdentifierStyle::YearPrefixed).unwrap();
        assert_eq!(json, "\"year-prefixed\"");

        let style: IdentifierStyle = serde_json::from_str("\"plain\"").unwrap();
        assert_eq!(style, IdentifierStyle::Plain);
    }

    #[test]
    fn test_policy_follows_style() {
        let mut config = IdentifierConfig::default();
        config.style = IdentifierStyle::Plain;
        assert_eq!(config.policy().format(7, Some(2023)), "ETU000007");

        config.style = IdentifierStyle::YearPrefixed;
        assert_eq!(config.policy().format(7, Some(2023)), "ETU2023_000007");
        assert_eq!(config.policy().format(7, None), "ETU9999_000007");
    }
}
