//! Yeek CLI Binary
//!
//! Command-line entry point: loads configuration, installs logging and runs the
//! requested command.

use anyhow::Context;
use clap::Parser;
use yeek::config::ConfigLoader;
use yeek::logging::init_logging;
use yeek::tooling::cli::{Cli, CliContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigLoader::load(cli.config.as_deref()).context("Error loading configuration")?;
    cli.apply_logging_overrides(&mut config.logging);
    init_logging(&config.logging).context("Error initializing logging")?;

    let context = CliContext::new(config, &cli.data_root).context("Error opening catalog storage")?;
    let output = context.execute(&cli.command).await?;
    println!("{}", output);
    Ok(())
}
