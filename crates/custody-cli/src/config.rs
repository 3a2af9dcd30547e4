//! CLI configuration: chain limits and log level
//!
//! Loaded from an optional TOML file, then overridden by `CUSTODY_*`
//! environment variables, then validated.
//!
//! ```toml
//! [chain]
//! max_nodes = 64
//! max_claims_per_node = 256
//!
//! [log]
//! level = "info"
//! ```

use custody_core::{ChainConfig, ConfigValidation, ConfigValidator, CustodyError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Log levels accepted in `[log] level`
pub const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

/// Environment variable overriding `chain.max_nodes`
pub const ENV_MAX_NODES: &str = "CUSTODY_MAX_NODES";
/// Environment variable overriding `chain.max_claims_per_node`
pub const ENV_MAX_CLAIMS: &str = "CUSTODY_MAX_CLAIMS_PER_NODE";
/// Environment variable overriding `log.level`
pub const ENV_LOG_LEVEL: &str = "CUSTODY_LOG_LEVEL";

/// Logging section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Default tracing level
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Full CLI configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CustodyConfig {
    /// Chain engine limits
    pub chain: ChainConfig,
    /// Logging
    pub log: LogConfig,
}

impl CustodyConfig {
    /// Load from `path` if given, apply environment overrides and validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.merge_env(std::env::vars())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file without overrides or validation
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CustodyError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        toml::from_str(&content)
            .map_err(|e| CustodyError::config(format!("invalid TOML in {}: {e}", path.display())))
    }

    /// Apply `CUSTODY_*` overrides from `vars`
    pub fn merge_env<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            match key.as_str() {
                ENV_MAX_NODES => self.chain.max_nodes = parse_limit(&key, &value)?,
                ENV_MAX_CLAIMS => self.chain.max_claims_per_node = parse_limit(&key, &value)?,
                ENV_LOG_LEVEL => self.log.level = value.trim().to_lowercase(),
                _ => {}
            }
        }
        Ok(())
    }
}

impl ConfigValidation for CustodyConfig {
    fn validate(&self) -> Result<()> {
        self.chain.validate()?;
        let mut validator = ConfigValidator::for_section("log");
        validator.one_of("level", &self.log.level, LOG_LEVELS);
        validator.finish()
    }
}

fn parse_limit(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| CustodyError::config(format!("{key} must be a positive integer")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = CustodyConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.log.level, "info");
        assert_eq!(config.chain, ChainConfig::default());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: CustodyConfig = toml::from_str("[chain]\nmax_nodes = 8\n").unwrap();
        assert_eq!(config.chain.max_nodes, 8);
        assert_eq!(
            config.chain.max_claims_per_node,
            ChainConfig::default().max_claims_per_node
        );
        assert_eq!(config.log, LogConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = CustodyConfig::default();
        config
            .merge_env(vars(&[
                (ENV_MAX_NODES, "12"),
                (ENV_LOG_LEVEL, " DEBUG "),
                ("UNRELATED", "x"),
            ]))
            .unwrap();
        assert_eq!(config.chain.max_nodes, 12);
        assert_eq!(config.log.level, "debug");

        assert!(config.merge_env(vars(&[(ENV_MAX_CLAIMS, "many")])).is_err());
    }

    #[test]
    fn test_unknown_level_rejected() {
        let mut config = CustodyConfig::default();
        config.log.level = "loud".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, CustodyError::Config { .. }));
        assert!(err.to_string().contains("log.level"));
    }
}
