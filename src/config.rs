//! Configuration module for fshare.

use serde::Deserialize;
use std::path::Path;

use crate::{FshareError, Result};

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/fshare.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Upload storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory holding one sub-directory per credential.
    #[serde(default = "default_upload_path")]
    pub upload_path: String,
    /// Maximum upload size in megabytes (0 = no limit).
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size_mb: u64,
}

fn default_upload_path() -> String {
    "data/uploads".to_string()
}

fn default_max_upload_size() -> u64 {
    10
}

impl StorageConfig {
    /// Upload cap in bytes, or `None` when uploads are unlimited.
    pub fn max_upload_bytes(&self) -> Option<u64> {
        if self.max_upload_size_mb == 0 {
            None
        } else {
            Some(self.max_upload_size_mb << 20)
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_path: default_upload_path(),
            max_upload_size_mb: default_max_upload_size(),
        }
    }
}

/// Signed URL configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SigningConfig {
    /// File holding the hex-encoded HMAC secret (created on first run).
    #[serde(default = "default_secret_path")]
    pub secret_path: String,
    /// Lifetime of issued signed links in seconds.
    #[serde(default = "default_link_ttl")]
    pub link_ttl_secs: u64,
}

fn default_secret_path() -> String {
    "data/hmac_secret".to_string()
}

fn default_link_ttl() -> u64 {
    30
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            secret_path: default_secret_path(),
            link_ttl_secs: default_link_ttl(),
        }
    }
}

/// Expired-resource cleanup configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CleanupConfig {
    /// Whether the background sweep runs.
    #[serde(default = "default_cleanup_enabled")]
    pub enabled: bool,
    /// Sweep interval in seconds.
    #[serde(default = "default_cleanup_interval")]
    pub interval_secs: u64,
}

fn default_cleanup_enabled() -> bool {
    true
}

fn default_cleanup_interval() -> u64 {
    crate::cleanup::DEFAULT_SWEEP_INTERVAL_SECS
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: default_cleanup_enabled(),
            interval_secs: default_cleanup_interval(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/fshare.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Upload storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Signed URL configuration.
    #[serde(default)]
    pub signing: SigningConfig,
    /// Cleanup configuration.
    #[serde(default)]
    pub cleanup: CleanupConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(FshareError::Io)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| FshareError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `FSHARE_UPLOAD_PATH`: Override the upload root
    /// - `FSHARE_DATABASE_PATH`: Override the SQLite file path
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("FSHARE_UPLOAD_PATH") {
            if !path.is_empty() {
                self.storage.upload_path = path;
            }
        }
        if let Ok(path) = std::env::var("FSHARE_DATABASE_PATH") {
            if !path.is_empty() {
                self.database.path = path;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(FshareError::Config(
                "port value is probably not set (0 is not allowed)".to_string(),
            ));
        }
        if self.storage.upload_path.trim().is_empty() {
            return Err(FshareError::Config("upload_path is required".to_string()));
        }
        if self.signing.secret_path.trim().is_empty() {
            return Err(FshareError::Config("secret_path is required".to_string()));
        }
        if self.cleanup.enabled && self.cleanup.interval_secs == 0 {
            return Err(FshareError::Config(
                "cleanup interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
