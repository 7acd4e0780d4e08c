//! Command implementations for the QC runner CLI
//!
//! Each command lives in its own module:
//! - `run`: read observations, run the QC steps and export flags
//! - `config`: validate and print the effective configuration

pub mod config;
pub mod run;
pub mod shared;

pub use run::RunSummary;
pub use shared::OutputFiles;

use crate::cli::args::{Args, Commands};
use anyhow::Result;

/// Dispatch to the subcommand handler
///
/// Returns the run summary for `run`, `None` for commands without one.
pub async fn run(args: Args) -> Result<Option<RunSummary>> {
    match args.command {
        Some(Commands::Run(run_args)) => run::run_qc(run_args).await.map(Some),
        Some(Commands::Config(config_args)) => config::run_config(config_args).map(|_| None),
        None => Ok(None),
    }
}
