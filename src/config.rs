use serde::Deserialize;
use std::{fs, path::Path};
use tracing::warn;

/// Where the config lives when neither `--config` nor the env var says otherwise.
pub const DEFAULT_CONFIG_PATH: &str = ".config/bill_splitter.toml";
pub const CONFIG_ENV_VAR: &str = "BILL_SPLITTER_CONFIG";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub parties: PartiesConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Json,
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// JSON file or SQLite database, depending on `backend`. Ignored for `memory`.
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> String {
    "data/previous_meter_readings.json".to_string()
}

/// Display names for the two households sharing the bills.
#[derive(Debug, Clone, Deserialize)]
pub struct PartiesConfig {
    #[serde(default = "default_party1")]
    pub party1: String,
    #[serde(default = "default_party2")]
    pub party2: String,
}

impl Default for PartiesConfig {
    fn default() -> Self {
        Self {
            party1: default_party1(),
            party2: default_party2(),
        }
    }
}

fn default_party1() -> String {
    "Apartment 1".to_string()
}

fn default_party2() -> String {
    "Apartment 2".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG`.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    File,
    Defaults,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Like `load`, but a missing file yields the defaults. A malformed file is still an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let (config, source) = Self::load_with_source(path.as_ref())?;
        if source == ConfigSource::Defaults {
            warn!(path = %path.as_ref().display(), "Config file not found — using defaults");
        }
        Ok(config)
    }

    /// Same as `load_or_default` without logging, also reporting where the values came from.
    /// For callers that load before a tracing subscriber is installed.
    pub fn load_with_source(
        path: impl AsRef<Path>,
    ) -> Result<(Self, ConfigSource), Box<dyn std::error::Error>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok((Self::default(), ConfigSource::Defaults));
        }
        Ok((Self::load(path)?, ConfigSource::File))
    }

    /// `--config` wins, then the environment variable, then the default location.
    pub fn resolve_path(cli_path: Option<&str>) -> String {
        cli_path
            .map(str::to_string)
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.store.backend, StoreBackend::Json);
        assert_eq!(cfg.store.path, "data/previous_meter_readings.json");
        assert_eq!(cfg.parties.party1, "Apartment 1");
        assert_eq!(cfg.parties.party2, "Apartment 2");
        assert_eq!(cfg.log.filter, "info");
    }

    #[test]
    fn test_load_with_source_reports_fallback() {
        let (cfg, source) = Config::load_with_source("/nonexistent/bill_splitter.toml").unwrap();
        assert_eq!(source, ConfigSource::Defaults);
        assert_eq!(cfg.store.backend, StoreBackend::Json);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bill_splitter.toml");
        fs::write(&path, "[parties]\nparty1 = \"Basement\"\n").unwrap();
        let (cfg, source) = Config::load_with_source(&path).unwrap();
        assert_eq!(source, ConfigSource::File);
        assert_eq!(cfg.parties.party1, "Basement");
    }

    #[test]
    fn test_partial_sections() {
        let cfg: Config = toml::from_str(
            r#"
[store]
backend = "sqlite"

[parties]
party2 = "Upstairs"
"#,
        )
        .unwrap();
        assert_eq!(cfg.store.backend, StoreBackend::Sqlite);
        assert_eq!(cfg.store.path, "data/previous_meter_readings.json");
        assert_eq!(cfg.parties.party1, "Apartment 1");
        assert_eq!(cfg.parties.party2, "Upstairs");
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let res: Result<Config, _> = toml::from_str("[store]\nbackend = \"redis\"\n");
        assert!(res.is_err());
    }

    #[test]
    fn test_cli_path_wins() {
        assert_eq!(Config::resolve_path(Some("my.toml")), "my.toml");
    }
}
