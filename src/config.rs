//! Configuration management
//!
//! Loads the JSON configuration file that selects a strategy store, with
//! environment variable overrides for the backend URL, credentials and the
//! local database.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::store::http::DEFAULT_BASE_URL;
use crate::store::{ConfiguredStore, HttpStoreConfig, HttpStrategyStore, SqliteStrategyStore};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
}

impl Config {
    /// Load configuration from a JSON file, then apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Defaults plus environment overrides, for running without a file
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// `STRATEGY_DB_PATH` selects the SQLite store; otherwise
    /// `STRATEGY_API_URL` selects the HTTP store. `STRATEGY_API_TOKEN` and
    /// `STRATEGY_OWNER` fill in the matching backend.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("STRATEGY_DB_PATH") {
            let path = PathBuf::from(path);
            if let StoreConfig::Sqlite(settings) = &mut self.store {
                settings.path = path;
            } else {
                self.store = StoreConfig::Sqlite(SqliteSettings {
                    path,
                    ..SqliteSettings::default()
                });
            }
        } else if let Some(url) = lookup("STRATEGY_API_URL") {
            if let StoreConfig::Http(settings) = &mut self.store {
                settings.base_url = url;
            } else {
                self.store = StoreConfig::Http(HttpSettings {
                    base_url: url,
                    ..HttpSettings::default()
                });
            }
        }

        match &mut self.store {
            StoreConfig::Http(settings) => {
                if let Some(token) = lookup("STRATEGY_API_TOKEN") {
                    settings.token = Some(token);
                }
            }
            StoreConfig::Sqlite(settings) => {
                if let Some(owner) = lookup("STRATEGY_OWNER") {
                    settings.owner = owner;
                }
            }
        }
    }
}

/// Which strategy store to use
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    Http(HttpSettings),
    Sqlite(SqliteSettings),
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Http(HttpSettings::default())
    }
}

impl StoreConfig {
    pub fn open(&self) -> Result<ConfiguredStore> {
        match self {
            StoreConfig::Http(settings) => {
                let store = HttpStrategyStore::new(settings.client_config())
                    .context("Failed to create HTTP strategy store")?;
                Ok(ConfiguredStore::Http(store))
            }
            StoreConfig::Sqlite(settings) => {
                let mut store = SqliteStrategyStore::new(&settings.path, settings.owner.clone())
                    .with_context(|| format!("Failed to open {}", settings.path.display()))?;
                if let Some(backup) = &settings.json_backup {
                    store = store.with_json_backup(backup);
                }
                Ok(ConfiguredStore::Sqlite(store))
            }
        }
    }
}

/// REST backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for HttpSettings {
    fn default() -> Self {
        HttpSettings {
            base_url: default_base_url(),
            token: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl HttpSettings {
    pub fn client_config(&self) -> HttpStoreConfig {
        let config = HttpStoreConfig::new(self.base_url.clone())
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_max_retries(self.max_retries);
        match &self.token {
            Some(token) => config.with_token(token.clone()),
            None => config,
        }
    }
}

/// Local SQLite store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteSettings {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    #[serde(default = "default_owner")]
    pub owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_backup: Option<PathBuf>,
}

impl Default for SqliteSettings {
    fn default() -> Self {
        SqliteSettings {
            path: default_db_path(),
            owner: default_owner(),
            json_backup: None,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/strategies.db")
}

fn default_owner() -> String {
    "local".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_is_local_http() {
        match Config::default().store {
            StoreConfig::Http(settings) => {
                assert_eq!(settings.base_url, "http://localhost:8000");
                assert_eq!(settings.timeout_secs, 30);
                assert_eq!(settings.max_retries, 3);
            }
            other => panic!("unexpected store {:?}", other),
        }
    }

    #[test]
    fn test_parse_sqlite_with_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"store": {"backend": "sqlite", "owner": "alice"}}"#).unwrap();
        match config.store {
            StoreConfig::Sqlite(settings) => {
                assert_eq!(settings.owner, "alice");
                assert_eq!(settings.path, PathBuf::from("data/strategies.db"));
                assert!(settings.json_backup.is_none());
            }
            other => panic!("unexpected store {:?}", other),
        }
    }

    #[test]
    fn test_token_override() {
        let mut config = Config::default();
        config.apply_overrides(env(&[
            ("STRATEGY_API_URL", "https://strategies.example.com"),
            ("STRATEGY_API_TOKEN", "secret"),
        ]));
        match &config.store {
            StoreConfig::Http(settings) => {
                assert_eq!(settings.base_url, "https://strategies.example.com");
                assert_eq!(settings.token.as_deref(), Some("secret"));
                assert_eq!(settings.client_config().token.as_deref(), Some("secret"));
            }
            other => panic!("unexpected store {:?}", other),
        }
    }

    #[test]
    fn test_db_path_switches_to_sqlite() {
        let mut config = Config::default();
        config.apply_overrides(env(&[
            ("STRATEGY_DB_PATH", "/tmp/s.db"),
            ("STRATEGY_OWNER", "bob"),
            ("STRATEGY_API_TOKEN", "ignored"),
        ]));
        match &config.store {
            StoreConfig::Sqlite(settings) => {
                assert_eq!(settings.path, PathBuf::from("/tmp/s.db"));
                assert_eq!(settings.owner, "bob");
            }
            other => panic!("unexpected store {:?}", other),
        }
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"store": {"backend": "http", "base_url": "http://api.internal:9000", "max_retries": 1}}"#,
        )
        .unwrap();
        let config = Config::from_file(&path).unwrap();
        match config.store {
            StoreConfig::Http(settings) => assert_eq!(settings.max_retries, 1),
            other => panic!("unexpected store {:?}", other),
        }
    }

    #[test]
    fn test_from_file_missing() {
        let err = Config::from_file("/nonexistent/config.json").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
