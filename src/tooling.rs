//! Tooling & Integration Layer
//!
//! Operator entry points: the `yeek` command line, which serves the share and
//! manages the catalog from a shell.

pub mod cli;

pub use cli::{CatalogCommands, Cli, CliContext, Commands};
