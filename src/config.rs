//! # Configuration Management Module
//!
//! ## Purpose
//! Centralized configuration for the caselaw access service, supporting
//! configuration files, environment variables, and command line arguments
//! with validation and type-safe access to all settings.
//!
//! ## Input/Output Specification
//! - **Input**: Configuration files (TOML), environment variables, CLI arguments
//! - **Output**: Validated configuration structs with defaults and overrides
//! - **Validation**: Type checking, range validation
//!
//! ## Configuration Sources (in order of precedence)
//! 1. Command line arguments (highest priority)
//! 2. Environment variables
//! 3. Configuration files
//! 4. Default values (lowest priority)

use crate::errors::{AccessError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure containing all system settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server and API configuration
    pub server: ServerConfig,
    /// Access quota behavior
    pub quota: QuotaConfig,
    /// Storage and database settings
    pub storage: StorageConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server and API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Number of HTTP worker threads
    pub workers: usize,
    /// Enable CORS
    pub enable_cors: bool,
}

/// Access quota configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Restricted case views granted per visitor session per day
    pub daily_case_allowance: u32,
    /// Seconds between session allowance resets
    pub reset_interval_seconds: i64,
    /// Case views granted to an authenticated account
    pub account_case_allowance: u32,
    /// Whether account allowances reset on the same interval as sessions
    pub account_allowance_resets: bool,
    /// User-agent substrings recognized as verified crawlers
    pub verified_crawlers: Vec<String>,
}

/// Storage and database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path
    pub db_path: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable structured JSON logging
    pub json_format: bool,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::from_file("config.toml")
    }

    /// Load configuration from a specific file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!("Configuration file not found: {:?}, using defaults", path);
            let mut config = Self::default();
            config.apply_env_overrides()?;
            config.validate()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path).map_err(|e| AccessError::Config {
            message: format!("Failed to read config file {:?}: {}", path, e),
        })?;

        let mut config: Config = toml::from_str(&content).map_err(|e| AccessError::Config {
            message: format!("Failed to parse config file {:?}: {}", path, e),
        })?;

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("CASELAW_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("CASELAW_PORT") {
            self.server.port = port.parse().map_err(|_| AccessError::Config {
                message: "Invalid port number in CASELAW_PORT".to_string(),
            })?;
        }
        if let Ok(db_path) = std::env::var("CASELAW_DB_PATH") {
            self.storage.db_path = PathBuf::from(db_path);
        }
        if let Ok(allowance) = std::env::var("CASELAW_DAILY_ALLOWANCE") {
            self.quota.daily_case_allowance =
                allowance.parse().map_err(|_| AccessError::Config {
                    message: "Invalid allowance in CASELAW_DAILY_ALLOWANCE".to_string(),
                })?;
        }
        if let Ok(level) = std::env::var("CASELAW_LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(AccessError::Config {
                message: "server.port cannot be zero".to_string(),
            });
        }
        if self.quota.daily_case_allowance == 0 {
            return Err(AccessError::Config {
                message: "quota.daily_case_allowance must be greater than zero".to_string(),
            });
        }
        if self.quota.reset_interval_seconds <= 0 {
            return Err(AccessError::Config {
                message: "quota.reset_interval_seconds must be positive".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            quota: QuotaConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            workers: num_cpus::get(),
            enable_cors: true,
        }
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            daily_case_allowance: 500,
            reset_interval_seconds: crate::quota::RESET_INTERVAL_SECS,
            account_case_allowance: 500,
            account_allowance_resets: false,
            verified_crawlers: vec!["Googlebot".to_string(), "bingbot".to_string()],
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/caselaw.db"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.quota.daily_case_allowance, 500);
        assert!(!config.quota.account_allowance_resets);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 9000

            [quota]
            daily_case_allowance = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.quota.daily_case_allowance, 3);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_zero_allowance_rejected() {
        let mut config = Config::default();
        config.quota.daily_case_allowance = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::from_file("/nonexistent/config.toml").unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
    }
}
