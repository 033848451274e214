//! Configuration module
//!
//! TOML file at `~/.config/ocpp-csms/config.toml` by default. Every
//! section is optional and falls back to its defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::SyncConfig;
use crate::infrastructure::DatabaseConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub database: DatabaseSection,
    pub metrics: MetricsConfig,
    pub sync: SyncSection,
}

/// WebSocket listener
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Seconds allowed for cleanup after the shutdown signal
    pub shutdown_timeout: u64,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9000,
            shutdown_timeout: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `json` or `plain`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "plain".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        let db = DatabaseConfig::default();
        Self {
            url: db.url,
            max_connections: db.max_connections,
        }
    }
}

impl DatabaseSection {
    pub fn to_database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.url.clone(),
            max_connections: self.max_connections.max(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Prometheus scrape endpoint
    pub listen: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: "0.0.0.0:9100".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    pub page_size: usize,
    pub max_concurrent_sends: usize,
    pub diagnostics: SyncLoopConfig,
    pub logs: SyncLoopConfig,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            page_size: 50,
            max_concurrent_sends: 16,
            diagnostics: SyncLoopConfig::default(),
            logs: SyncLoopConfig::default(),
        }
    }
}

/// One deferred-operation loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncLoopConfig {
    pub enabled: bool,
    pub run_every_secs: u64,
    pub retry_after_secs: u64,
}

impl Default for SyncLoopConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            run_every_secs: 60,
            retry_after_secs: 300,
        }
    }
}

impl SyncSection {
    /// Engine settings for one loop. Zero durations and sizes are clamped to 1.
    pub fn engine_config(&self, loop_config: &SyncLoopConfig) -> SyncConfig {
        SyncConfig {
            run_every: Duration::from_secs(loop_config.run_every_secs.max(1)),
            retry_after: chrono::Duration::seconds(loop_config.retry_after_secs.max(1) as i64),
            page_size: self.page_size.max(1),
            max_concurrent_sends: self.max_concurrent_sends.max(1),
        }
    }
}

impl AppConfig {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// `<config dir>/ocpp-csms/config.toml`, or `./config.toml` when the
/// platform has no config directory.
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .map(|dir| dir.join("ocpp-csms").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(AppConfig::parse("").unwrap(), AppConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = AppConfig::parse(
            r#"
            [server]
            port = 8887

            [sync.logs]
            enabled = false
            retry_after_secs = 30
            "#,
        )
        .unwrap();

        assert_eq!(cfg.server.port, 8887);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert!(!cfg.sync.logs.enabled);
        assert_eq!(cfg.sync.logs.retry_after_secs, 30);
        assert_eq!(cfg.sync.logs.run_every_secs, 60);
        assert!(cfg.sync.diagnostics.enabled);
    }

    #[test]
    fn zero_durations_are_clamped() {
        let cfg = AppConfig::parse(
            r#"
            [sync]
            page_size = 0
            max_concurrent_sends = 0

            [sync.diagnostics]
            run_every_secs = 0
            retry_after_secs = 0
            "#,
        )
        .unwrap();

        let engine = cfg.sync.engine_config(&cfg.sync.diagnostics);
        assert_eq!(engine.run_every, Duration::from_secs(1));
        assert_eq!(engine.retry_after, chrono::Duration::seconds(1));
        assert_eq!(engine.page_size, 1);
        assert_eq!(engine.max_concurrent_sends, 1);
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        assert!(AppConfig::parse("[server\nport = 1").is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("ocpp-csms-does-not-exist.toml");
        assert_eq!(AppConfig::load(&path).unwrap(), AppConfig::default());
    }

    #[test]
    fn default_path_points_at_config_toml() {
        assert!(default_config_path().ends_with("config.toml"));
    }
}
