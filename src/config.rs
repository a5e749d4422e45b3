//! Client configuration
//!
//! Loaded from JSON. Every field is optional:
//!
//! ```json
//! {
//!   "write_pool_size": 50,
//!   "rules": [
//!     { "resource": "major-read", "strategy": "error_ratio", "threshold": 0.5 },
//!     { "resource": "major-read", "strategy": "slow_request_ratio", "threshold": 0.5,
//!       "slow_threshold_ms": 1000, "window_seconds": 5 }
//!   ]
//! }
//! ```

use crate::breaker::DegradeRule;
use crate::replicator::DEFAULT_POOL_SIZE;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Replication pool size and degrade rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossRoomConfig {
    /// Number of minor-region replication workers
    pub write_pool_size: usize,
    /// Degrade rules installed on the breaker; an empty list disables it
    pub rules: Vec<DegradeRule>,
}

impl Default for CrossRoomConfig {
    fn default() -> Self {
        CrossRoomConfig {
            write_pool_size: DEFAULT_POOL_SIZE,
            rules: DegradeRule::defaults(),
        }
    }
}

impl CrossRoomConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let config: CrossRoomConfig =
            serde_json::from_str(json).context("invalid cross-room configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_json_str(&content).with_context(|| format!("in config file {}", path.display()))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.write_pool_size > 0,
            "write_pool_size must be at least 1"
        );
        for rule in &self.rules {
            rule.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::{ResourceKey, Strategy};
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = CrossRoomConfig::default();
        assert_eq!(config.write_pool_size, 50);
        assert_eq!(config.rules.len(), 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config = CrossRoomConfig::from_json_str(r#"{ "write_pool_size": 8 }"#).unwrap();
        assert_eq!(config.write_pool_size, 8);
        assert_eq!(config.rules, DegradeRule::defaults());
    }

    #[test]
    fn test_rules_parsed() {
        let config = CrossRoomConfig::from_json_str(
            r#"{ "rules": [
                { "resource": "minor-write", "strategy": "slow_request_ratio",
                  "threshold": 0.8, "slow_threshold_ms": 200, "window_seconds": 10 }
            ] }"#,
        )
        .unwrap();

        assert_eq!(config.rules.len(), 1);
        let rule = &config.rules[0];
        assert_eq!(rule.resource, ResourceKey::MinorWrite);
        assert_eq!(rule.strategy, Strategy::SlowRequestRatio);
        assert_eq!(rule.slow_threshold_ms, 200);
        assert_eq!(rule.window_seconds, 10);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(CrossRoomConfig::from_json_str(r#"{ "write_pool_size": 0 }"#).is_err());
        assert!(CrossRoomConfig::from_json_str(
            r#"{ "rules": [
                { "resource": "major-read", "strategy": "error_ratio", "threshold": 1.5 }
            ] }"#
        )
        .is_err());
        assert!(CrossRoomConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir()
            .join(format!("crossroom-config-{}.json", std::process::id()));
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(br#"{ "write_pool_size": 3, "rules": [] }"#).unwrap();

        let config = CrossRoomConfig::load(&path).unwrap();
        assert_eq!(config.write_pool_size, 3);
        assert!(config.rules.is_empty());

        fs::remove_file(&path).unwrap();
        assert!(CrossRoomConfig::load(&path).is_err());
    }
}
