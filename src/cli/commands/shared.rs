//! Shared components for CLI commands
//!
//! Logging setup, configuration loading, input reading and progress bars
//! used by more than one command.

use crate::cli::args::resolve_config_path;
use crate::config::QcConfig;
use crate::table::ObservationTable;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Byte sizes of written files, for reporting
#[derive(Debug, Clone, Default)]
pub struct OutputFiles {
    pub files: Vec<(PathBuf, u64)>,
}

impl OutputFiles {
    pub fn record(&mut self, path: PathBuf) {
        let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        self.files.push((path, size));
    }

    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|(_, size)| size).sum()
    }

    /// Format a byte count in human-readable form
    pub fn format_size(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", bytes, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }
}

/// Set up structured logging on stderr
pub fn setup_logging(log_level: &str, quiet: bool) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("marine_qc={}", log_level)));

    // try_init: a second command in the same process keeps the first subscriber
    if quiet {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .try_init();
    }

    debug!("Logging initialized at level: {}", log_level);
}

/// Load the QC configuration: explicit file, then the default location, then built-in defaults
pub fn load_configuration(config_file: Option<&PathBuf>) -> Result<QcConfig> {
    match resolve_config_path(config_file) {
        Some(path) => {
            info!("Using config file: {}", path.display());
            QcConfig::from_yaml_file(&path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))
        }
        None => {
            info!("No config file found, using built-in defaults");
            let config = QcConfig::default();
            config.validate().context("Built-in configuration is invalid")?;
            Ok(config)
        }
    }
}

/// Read the observation table from a file path or glob pattern
pub fn read_input(input: &str) -> Result<ObservationTable> {
    let path = Path::new(input);
    let table = if path.is_file() {
        ObservationTable::read_csv(path)
    } else {
        ObservationTable::read_csv_glob(input)
    }
    .with_context(|| format!("Failed to read observations from {}", input))?;

    info!("Loaded {} observations from {}", table.height(), input);
    Ok(table)
}

/// Create a progress bar with the standard styling
pub fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
    ) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(message.to_string());
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_size() {
        assert_eq!(OutputFiles::format_size(500), "500 B");
        assert_eq!(OutputFiles::format_size(1536), "1.50 KB");
        assert_eq!(OutputFiles::format_size(1048576), "1.00 MB");
    }

    #[test]
    fn test_output_files_total() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("flags.csv");
        std::fs::write(&path, "observation_id,qc_flag\n1,4\n").unwrap();

        let mut outputs = OutputFiles::default();
        outputs.record(path);
        outputs.record(temp_dir.path().join("missing.csv"));
        assert_eq!(outputs.total_size(), 27);
    }

    #[test]
    fn test_load_explicit_configuration() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("qc.yaml");
        std::fs::write(&path, "QC:\n  salinity:\n    range: [2.0, 9.2]\n").unwrap();

        let config = load_configuration(Some(&path)).unwrap();
        assert!(config.observation_type("salinity").is_some());
    }

    #[test]
    fn test_read_input_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let pattern = temp_dir.path().join("nothing-*.csv");
        assert!(read_input(&pattern.to_string_lossy()).is_err());
    }
}
