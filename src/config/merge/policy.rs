//! Merge policy: the built-in defaults form the lowest layer.

use crate::config::YeekConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// A builder seeded with [`YeekConfig::default`], so every later source only has
/// to name the keys it overrides.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let defaults = Config::try_from(&YeekConfig::default())?;
    Ok(Config::builder().add_source(defaults))
}
