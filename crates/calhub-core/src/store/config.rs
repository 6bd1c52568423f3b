//! TOML-based application configuration.
//!
//! Stores the database location, query window defaults, and the
//! deduplication rules shared by all sync adapters:
//! - `[database]` path override for the store file
//! - `[query]` default days_back / days_ahead window
//! - `[dedup]` per-source precedence and the same-source skip flag
//!
//! Configuration is stored at `~/.config/calhub/config.toml`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use super::data_dir;
use crate::dedup::DedupRules;
use crate::error::ConfigError;

/// Database location configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Explicit store file path. Defaults to `calendar.db` in the data dir.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Default query window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_days_back")]
    pub days_back: i64,
    #[serde(default = "default_days_ahead")]
    pub days_ahead: i64,
}

/// Deduplication configuration shared by all write batches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Skip candidates that tie with a record from the same source.
    #[serde(default)]
    pub skip_same_source: bool,
    /// Source name -> priority; higher wins.
    #[serde(default)]
    pub precedence: HashMap<String, i64>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/calhub/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
}

fn default_days_back() -> i64 {
    0
}
fn default_days_ahead() -> i64 {
    30
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            days_back: default_days_back(),
            days_ahead: default_days_ahead(),
        }
    }
}

impl Config {
    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/calhub"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from disk or return (and persist) the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let cfg: Config =
                    toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
                Ok(cfg)
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Resolved store file path: explicit override or `calendar.db` in the
    /// data directory.
    pub fn database_path(&self) -> Result<PathBuf, std::io::Error> {
        match &self.database.path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("calendar.db")),
        }
    }

    /// Assemble the per-batch dedup rules for a write from `source`.
    pub fn dedup_rules(&self, source: impl Into<String>) -> DedupRules {
        DedupRules {
            source: source.into(),
            skip_same_source: self.dedup.skip_same_source,
            precedence: self.dedup.precedence.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.query.days_back, 0);
        assert_eq!(parsed.query.days_ahead, 30);
        assert!(!parsed.dedup.skip_same_source);
    }

    #[test]
    fn partial_toml_takes_defaults() {
        let parsed: Config = toml::from_str(
            "[dedup]\nskip_same_source = true\n\n[dedup.precedence]\noutlook = 2\nics = 1\n",
        )
        .unwrap();
        assert_eq!(parsed.query.days_ahead, 30);
        assert!(parsed.dedup.skip_same_source);
        assert_eq!(parsed.dedup.precedence.get("outlook"), Some(&2));
    }

    #[test]
    fn dedup_rules_carry_batch_source() {
        let parsed: Config =
            toml::from_str("[dedup.precedence]\noutlook = 2\n").unwrap();
        let rules = parsed.dedup_rules("outlook");
        assert_eq!(rules.source, "outlook");
        assert_eq!(rules.priority_of("outlook"), 2);
        assert_eq!(rules.priority_of("unknown"), 0);
    }
}
