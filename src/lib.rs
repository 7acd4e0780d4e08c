//! Marine QC Library
//!
//! Quality control for marine sensor observations. An observation table is
//! run through an ordered, configurable battery of tests and every row ends
//! up with a NERC L20 quality flag.
//!
//! This library provides:
//! - The L20 flag vocabulary and its merge algebra
//! - Platform kinematics, rolling-window statistics and an asof join over
//!   irregularly sampled series
//! - Region, depth, spatial outlier, motion, range, gradient, z-score and
//!   dependent-quantity tests
//! - A sequential driver that folds test results into the flag column
//! - CSV/Parquet input and flag export

pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod export;
pub mod flags;
pub mod models;
pub mod qc;
pub mod table;
pub mod timeseries;

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
}

// Re-export commonly used types
pub use config::QcConfig;
pub use engine::QcEngine;
pub use error::{QcError, Result};
pub use flags::{Flag, FlagHistory, QualityFlags};
pub use models::{FeatureFlagUpdate, FlagUpdate, Observation, QcReport};
pub use table::ObservationTable;
