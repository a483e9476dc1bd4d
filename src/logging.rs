//! Logging System
//!
//! Structured logging on top of `tracing`. Level, format and destination come from
//! the `[logging]` config section and can be overridden through `YEEK_LOG*`
//! environment variables or CLI flags.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

const LOG_ENV: &str = "YEEK_LOG";
const LOG_FORMAT_ENV: &str = "YEEK_LOG_FORMAT";
const LOG_OUTPUT_ENV: &str = "YEEK_LOG_OUTPUT";
const LOG_FILE_ENV: &str = "YEEK_LOG_FILE";
const LOG_MODULES_ENV: &str = "YEEK_LOG_MODULES";

/// Resolve the log file path with precedence: CLI, `YEEK_LOG_FILE`, config file, default.
pub fn resolve_log_file_path(
    cli_file: Option<PathBuf>,
    config_file: Option<PathBuf>,
) -> Result<PathBuf, ApiError> {
    let env_file = std::env::var(LOG_FILE_ENV).ok().map(PathBuf::from);
    [cli_file, env_file, config_file]
        .into_iter()
        .flatten()
        .find(|p| !p.as_os_str().is_empty())
        .map(Ok)
        .unwrap_or_else(default_log_file_path)
}

fn default_log_file_path() -> Result<PathBuf, ApiError> {
    let project_dirs = directories::ProjectDirs::from("", "yeek", "yeek").ok_or_else(|| {
        ApiError::ConfigError("Could not determine platform directories for log file".to_string())
    })?;
    // macOS and Windows have no state dir
    let dir = project_dirs
        .state_dir()
        .unwrap_or_else(|| project_dirs.data_local_dir())
        .to_path_buf();
    Ok(dir.join("yeek.log"))
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Whether logging is enabled (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text (default: text)
    #[serde(default = "default_format")]
    pub format: String,

    /// Output destination: stdout, stderr, file, file+stderr, both
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file path when output includes file; None means the platform state dir
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// Enable colored output (text format on a terminal stream only)
    #[serde(default = "default_true")]
    pub color: bool,

    /// Module-specific log levels
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "stderr".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: None,
            color: default_true(),
            modules: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

/// Output destinations
#[derive(Debug, PartialEq, Eq)]
struct OutputDestinations {
    stdout: bool,
    stderr: bool,
    file: bool,
}

/// Initialize the global subscriber.
///
/// Priority order (highest to lowest): environment variables (`YEEK_LOG`,
/// `YEEK_LOG_FORMAT`, `YEEK_LOG_OUTPUT`, `YEEK_LOG_FILE`, `YEEK_LOG_MODULES`),
/// the given config (CLI flags are already folded into it), defaults.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ApiError> {
    if !config.enabled {
        return Registry::default()
            .with(EnvFilter::new("off"))
            .try_init()
            .map_err(|e| ApiError::ConfigError(format!("Failed to install logger: {}", e)));
    }

    let filter = build_env_filter(config)?;
    let format = determine_format(config)?;
    let output = determine_output(config)?;
    let writer = make_writer(&output, config)?;
    let ansi = config.color && !output.file;

    let layer = match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_writer(writer)
            .boxed(),
        LogFormat::Text => fmt::layer()
            .with_target(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(ansi)
            .with_writer(writer)
            .boxed(),
    };

    Registry::default()
        .with(filter)
        .with(layer)
        .try_init()
        .map_err(|e| ApiError::ConfigError(format!("Failed to install logger: {}", e)))
}

fn make_writer(output: &OutputDestinations, config: &LoggingConfig) -> Result<BoxMakeWriter, ApiError> {
    let file = if output.file {
        Some(open_log_file(config)?)
    } else {
        None
    };

    let writer = match (file, output.stdout, output.stderr) {
        (Some(file), _, true) => BoxMakeWriter::new(Mutex::new(file).and(std::io::stderr)),
        (Some(file), _, false) => BoxMakeWriter::new(Mutex::new(file)),
        (None, true, true) => BoxMakeWriter::new(std::io::stdout.and(std::io::stderr)),
        (None, true, false) => BoxMakeWriter::new(std::io::stdout),
        (None, false, _) => BoxMakeWriter::new(std::io::stderr),
    };
    Ok(writer)
}

fn open_log_file(config: &LoggingConfig) -> Result<std::fs::File, ApiError> {
    let log_file = resolve_log_file_path(None, config.file.clone())?;
    if let Some(parent) = log_file.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ApiError::ConfigError(format!("Failed to create log directory: {}", e)))?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .map_err(|e| ApiError::ConfigError(format!("Failed to open log file {:?}: {}", log_file, e)))
}

/// Build environment filter from config or environment variables
fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter, ApiError> {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) {
        return Ok(filter);
    }

    if config.level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut filter = EnvFilter::new(&config.level);
    for (module, level) in &config.modules {
        filter = filter.add_directive(parse_directive(module, level)?);
    }

    if let Ok(modules) = std::env::var(LOG_MODULES_ENV) {
        for spec in modules.split(',') {
            if let Some((module, level)) = spec.split_once('=') {
                filter = filter.add_directive(parse_directive(module.trim(), level.trim())?);
            }
        }
    }

    Ok(filter)
}

fn parse_directive(
    module: &str,
    level: &str,
) -> Result<tracing_subscriber::filter::Directive, ApiError> {
    format!("{}={}", module, level)
        .parse()
        .map_err(|e| ApiError::ConfigError(format!("Invalid log directive {}={}: {}", module, level, e)))
}

/// Determine output format from environment or config
fn determine_format(config: &LoggingConfig) -> Result<LogFormat, ApiError> {
    if let Ok(format) = std::env::var(LOG_FORMAT_ENV) {
        if let Ok(format) = parse_format(&format) {
            return Ok(format);
        }
    }
    parse_format(&config.format)
}

fn parse_format(format: &str) -> Result<LogFormat, ApiError> {
    match format {
        "text" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        other => Err(ApiError::ConfigError(format!(
            "Invalid log format: {} (must be 'json' or 'text')",
            other
        ))),
    }
}

/// Determine output destinations from environment or config
fn determine_output(config: &LoggingConfig) -> Result<OutputDestinations, ApiError> {
    match std::env::var(LOG_OUTPUT_ENV) {
        Ok(output) => parse_output_destinations(&output),
        Err(_) => parse_output_destinations(&config.output),
    }
}

fn parse_output_destinations(output: &str) -> Result<OutputDestinations, ApiError> {
    let (stdout, stderr, file) = match output {
        "stdout" => (true, false, false),
        "stderr" => (false, true, false),
        "file" => (false, false, true),
        "file+stderr" => (false, true, true),
        "both" => (true, true, false),
        _ => {
            return Err(ApiError::ConfigError(format!(
                "Invalid log output: {} (must be 'stdout', 'stderr', 'file', 'file+stderr', or 'both')",
                output
            )))
        }
    };
    Ok(OutputDestinations { stdout, stderr, file })
}
