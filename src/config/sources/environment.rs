//! Environment variable source: YEEK__ prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

/// Add environment variable overlay to builder.
/// `YEEK__SERVER__BIND=127.0.0.1:9000` sets `server.bind`.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let builder = builder.add_source(
        Environment::with_prefix("YEEK")
            .separator("__")
            .try_parsing(true),
    );
    Ok(builder)
}
