//! Command-line argument definitions for the QC runner
//!
//! Defines the CLI using the clap derive API.

use crate::config::QcConfig;
use crate::error::{QcError, Result};
use crate::export::ExportFormat;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// CLI arguments for the marine sensor QC runner
///
/// Reads a flat observation table, runs the configured QC steps and writes
/// the resulting flag updates for the write-back side.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "marine-qc",
    version,
    about = "Quality control for marine sensor observations",
    long_about = "Runs an ordered battery of quality-control tests (region, depth, spatial \
                  outliers, platform motion, value range, gradient, z-score and dependent \
                  quantities) over a table of marine observations and exports one NERC L20 \
                  flag per observation and per feature of interest."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Run QC over an observation table and export the flags
    Run(RunArgs),
    /// Print the effective configuration as YAML
    Config(ConfigArgs),
}

/// Arguments for the run command
#[derive(Debug, Clone, Parser)]
pub struct RunArgs {
    /// Observation table: a CSV file or a glob pattern matching several
    #[arg(value_name = "INPUT")]
    pub input: String,

    /// Directory for the exported flag tables
    #[arg(
        short = 'o',
        long = "output",
        value_name = "DIR",
        default_value = "qc-output",
        help = "Output directory for flag tables"
    )]
    pub output_path: PathBuf,

    /// QC configuration file
    ///
    /// YAML file with thresholds and the step list. If not specified, looks
    /// for marine-qc/config.yaml under the user config directory and falls
    /// back to the built-in defaults.
    #[arg(
        short = 'c',
        long = "config",
        value_name = "FILE",
        help = "Path to configuration file (YAML format)"
    )]
    pub config_file: Option<PathBuf>,

    #[arg(
        short = 'f',
        long = "format",
        value_enum,
        default_value = "csv",
        help = "File format of the exported flag tables"
    )]
    pub format: ExportFormat,

    /// Ignore existing flags and start every row from no QC
    #[arg(long = "reset-flags")]
    pub reset_flags: bool,

    /// Write the per-observation flag history as JSON to this file
    #[arg(long = "history", value_name = "FILE")]
    pub history_path: Option<PathBuf>,

    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    #[arg(
        short = 'q',
        long = "quiet",
        help = "Suppress output except errors",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,

    #[arg(
        long = "report",
        value_enum,
        default_value = "human",
        help = "Format of the run summary printed to stdout"
    )]
    pub report_format: ReportFormat,
}

/// Arguments for the config command
#[derive(Debug, Clone, Parser)]
pub struct ConfigArgs {
    /// Configuration file to validate and print; defaults as for `run`
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,
}

/// Run summary formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Human,
    Json,
}

impl RunArgs {
    /// Validate the run arguments for consistency
    pub fn validate(&self) -> Result<()> {
        if self.input.trim().is_empty() {
            return Err(QcError::configuration("Input path cannot be empty"));
        }

        if let Some(config_file) = &self.config_file {
            if !config_file.exists() {
                return Err(QcError::InputNotFound {
                    path: config_file.clone(),
                });
            }
        }

        if self.output_path.is_file() {
            return Err(QcError::configuration(format!(
                "Output path is a file: {}",
                self.output_path.display()
            )));
        }

        if let Some(history) = &self.history_path {
            if let Some(parent) = history.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    return Err(QcError::configuration(format!(
                        "History file directory does not exist: {}",
                        parent.display()
                    )));
                }
            }
        }

        Ok(())
    }

    /// Determine the appropriate log level based on verbosity flags
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            log_level_for(self.verbose)
        }
    }

    /// Progress bars are hidden in quiet mode and for machine-readable reports
    pub fn show_progress(&self) -> bool {
        !self.quiet && self.report_format == ReportFormat::Human
    }
}

impl ConfigArgs {
    pub fn get_log_level(&self) -> &'static str {
        log_level_for(self.verbose)
    }
}

fn log_level_for(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Explicit path, else the default location when a file exists there
pub fn resolve_config_path(explicit: Option<&PathBuf>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.clone()),
        None => QcConfig::default_path().filter(|path| path.exists()),
    }
}
