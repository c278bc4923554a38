//! Core library for `issue-sync`: a level-triggered reconciler that keeps
//! declared issues in sync with GitHub.

pub mod adapters;
pub mod cassette;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod model;
pub mod ports;
pub mod reconcile;

use clap::Parser;

use crate::config::Config;

/// Run the CLI with the provided arguments.
///
/// # Errors
///
/// Returns an error string when argument parsing, configuration or command
/// execution fails.
pub async fn run<I, T>(args: I) -> Result<(), String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = cli::Cli::try_parse_from(args).map_err(|err| err.to_string())?;
    let config = Config::from_env().map_err(|e| e.to_string())?;
    commands::dispatch(&cli.command, &config).await
}
