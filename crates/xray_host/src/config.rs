//! Configuration management for the forensics host.
//!
//! This module handles loading and validation of the host configuration from
//! TOML files. The `[forensics]` table is passed through to the core service
//! unchanged.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use xray_forensics::ForensicsConfig;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

fn default_tick_interval() -> u64 {
    50 // 20 ticks per second
}

fn default_storage_directory() -> String {
    "recordings".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Application configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub host: HostSettings,
    /// Detector, recording, replay and notification settings
    #[serde(default)]
    pub forensics: ForensicsConfig,
}

/// Logging configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

/// Where finished recordings are persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "default_storage_directory")]
    pub directory: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            directory: default_storage_directory(),
        }
    }
}

/// Scheduler settings for the host tick loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSettings {
    /// Interval between service ticks in milliseconds
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file, creating a default one if the
    /// file doesn't exist.
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Validates the configuration for correctness.
    pub fn validate(&self) -> Result<(), String> {
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {VALID_LOG_LEVELS:?}",
                &self.logging.level
            ));
        }

        if self.storage.directory.trim().is_empty() {
            return Err("Storage directory cannot be empty".to_string());
        }

        if self.host.tick_interval_ms == 0 {
            return Err("host.tick_interval_ms must be greater than 0".to_string());
        }

        self.forensics.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();

        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json_format);
        assert_eq!(config.storage.directory, "recordings");
        assert_eq!(config.host.tick_interval_ms, 50);
        assert_eq!(config.forensics.recording.max_retained, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().unwrap_err().contains("Invalid log level"));

        let mut config = AppConfig::default();
        config.storage.directory = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.host.tick_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.forensics.recording.interval_ticks = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [storage]
            directory = "/var/lib/xray"

            [forensics.recording]
            max_duration_secs = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.directory, "/var/lib/xray");
        assert_eq!(config.forensics.recording.max_duration_secs, 60);
        assert_eq!(config.forensics.recording.interval_ticks, 2);
        assert_eq!(config.host.tick_interval_ms, 50);
        assert_eq!(config.logging.level, "info");
    }

    #[tokio::test]
    async fn test_load_from_nonexistent_file_creates_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("xray.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config.host.tick_interval_ms, 50);
        assert!(path.exists());

        let reloaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded.storage.directory, config.storage.directory);
        assert_eq!(
            reloaded.forensics.detector.categories.len(),
            config.forensics.detector.categories.len()
        );
    }

    #[tokio::test]
    async fn test_load_rejects_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        tokio::fs::write(&path, "[logging\nlevel = ").await.unwrap();
        assert!(AppConfig::load_from_file(&path).await.is_err());
    }
}
