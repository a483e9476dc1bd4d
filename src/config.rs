//! Configuration
//!
//! Layered configuration built with the `config` crate. Precedence, lowest first:
//! built-in defaults, the global file (`$XDG_CONFIG_HOME/yeek/config.toml`), an
//! explicit `--config` file, then `YEEK__SECTION__KEY` environment variables.

mod facade;
pub mod merge {
    pub mod policy;
    pub mod service;
}
pub mod paths {
    pub mod xdg_root;
}
pub mod sources {
    pub mod environment;
    pub mod global_file;
}

pub use facade::ConfigLoader;
pub use paths::xdg_root as xdg;

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::projection::BuilderOptions;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YeekConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub builder: BuilderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl YeekConfig {
    /// Reject values that deserialize but cannot work
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.builder.interval_ms == 0 {
            return Err(ApiError::ConfigError(
                "builder.interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.builder.fetch_timeout_ms == 0 {
            return Err(ApiError::ConfigError(
                "builder.fetch_timeout_ms must be greater than zero".to_string(),
            ));
        }
        let extension = self.builder.file_extension.trim();
        if extension.is_empty() || extension.contains(['/', '\\', '.']) {
            return Err(ApiError::ConfigError(format!(
                "builder.file_extension is not a plain extension: {:?}",
                self.builder.file_extension
            )));
        }
        let prefix = &self.server.dav_prefix;
        if !prefix.starts_with('/') || prefix.trim_matches('/').is_empty() {
            return Err(ApiError::ConfigError(format!(
                "server.dav_prefix must be an absolute path below '/': {}",
                self.server.dav_prefix
            )));
        }
        self.server.socket_addr()?;
        Ok(())
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_dav_prefix() -> String {
    "/webdav".to_string()
}

fn default_retry_after_secs() -> u64 {
    10
}

/// HTTP front settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Mount point of the WebDAV share
    #[serde(default = "default_dav_prefix")]
    pub dav_prefix: String,
    /// `Retry-After` hint sent while the share is still being built
    #[serde(default = "default_retry_after_secs")]
    pub retry_after_secs: u64,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ApiError> {
        self.bind
            .parse()
            .map_err(|e| ApiError::ConfigError(format!("Invalid server.bind {}: {}", self.bind, e)))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            dav_prefix: default_dav_prefix(),
            retry_after_secs: default_retry_after_secs(),
        }
    }
}

fn default_content_dir() -> PathBuf {
    PathBuf::from("data/uploads")
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("data/catalog")
}

fn default_max_upload_bytes() -> u64 {
    1024 * 1024
}

fn default_true() -> bool {
    true
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding uploaded bytes
    #[serde(default = "default_content_dir")]
    pub content_dir: PathBuf,
    /// Catalog database directory
    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    #[serde(default = "default_true")]
    pub create_missing_directories: bool,
}

impl StorageConfig {
    /// Resolve relative storage paths against `base`; returns (content_dir, catalog_path).
    pub fn resolve_paths(&self, base: &Path) -> (PathBuf, PathBuf) {
        (base.join(&self.content_dir), base.join(&self.catalog_path))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            content_dir: default_content_dir(),
            catalog_path: default_catalog_path(),
            max_upload_bytes: default_max_upload_bytes(),
            create_missing_directories: default_true(),
        }
    }
}

fn default_interval_ms() -> u64 {
    5000
}

fn default_fetch_timeout_ms() -> u64 {
    2000
}

fn default_file_extension() -> String {
    "midi".to_string()
}

fn default_content_type() -> String {
    "audio/midi".to_string()
}

/// Projection builder settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuilderConfig {
    /// Pause between builder passes
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    /// Extension of share file names
    #[serde(default = "default_file_extension")]
    pub file_extension: String,
    /// Content type reported for shared files
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

impl BuilderConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn options(&self) -> BuilderOptions {
        BuilderOptions {
            fetch_timeout: Duration::from_millis(self.fetch_timeout_ms),
            file_extension: self.file_extension.trim().to_string(),
        }
    }
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            file_extension: default_file_extension(),
            content_type: default_content_type(),
        }
    }
}
