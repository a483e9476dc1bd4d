//! ConfigLoader facade delegating to merge service.

use super::merge::service::MergeService;
use super::YeekConfig;
use crate::error::ApiError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the standard sources plus an optional explicit file,
    /// then validate it.
    pub fn load(explicit: Option<&Path>) -> Result<YeekConfig, ApiError> {
        let config = MergeService::load(explicit)
            .map_err(|e| ApiError::ConfigError(format!("Failed to load configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file only, with environment overlay.
    pub fn load_from_file(path: &Path) -> Result<YeekConfig, ApiError> {
        let config = MergeService::load_from_file(path).map_err(|e| {
            ApiError::ConfigError(format!("Failed to load {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Create default configuration.
    pub fn default() -> YeekConfig {
        YeekConfig::default()
    }
}
