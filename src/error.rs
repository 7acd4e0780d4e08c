//! Error handling for QC runs.
//!
//! Fatal conditions abort the whole run. Evaluation gaps (missing reference
//! data, unmatched joins) are not errors and never surface here.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Input not found: {path}")]
    InputNotFound { path: PathBuf },

    #[error("Missing required column: {column}")]
    MissingColumn { column: String },

    #[error("Invalid column {column}: {reason}")]
    InvalidColumn { column: String, reason: String },

    #[error("Invalid quality flag: {value:?}")]
    InvalidFlag { value: String },

    #[error("Invalid duration: {value:?}")]
    InvalidDuration { value: String },

    #[error("Row count changed during {stage}: expected {expected}, found {found}")]
    RowCountMismatch {
        stage: String,
        expected: usize,
        found: usize,
    },

    #[error("QC step {label} failed: {reason}")]
    StepFailed { label: String, reason: String },

    #[error("Unknown QC step referenced: {label}")]
    UnknownStep { label: String },

    #[error("Timestamp parsing failed for {value:?}: {source}")]
    TimestampParsing {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

impl QcError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn missing_column(column: impl Into<String>) -> Self {
        Self::MissingColumn {
            column: column.into(),
        }
    }

    pub fn invalid_column(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidColumn {
            column: column.into(),
            reason: reason.into(),
        }
    }

    pub fn step_failed(label: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::StepFailed {
            label: label.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, QcError>;
