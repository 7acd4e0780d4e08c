//! Core data structures for QC runs.
//!
//! Defines the observation row used to build tables, the typed flag updates
//! handed to the write-back side, and the run report.

use crate::flags::{FlagHistory, QualityFlags};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One sensor reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: u64,
    pub datastream_id: u64,
    pub phenomenon_time: DateTime<Utc>,
    pub result: f64,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub observation_type: String,
    pub units: String,
    pub feature_id: Option<u64>,
    pub qc_flag: Option<QualityFlags>,
    pub region: Option<String>,
    pub elevation: Option<f64>,
}

impl Observation {
    pub fn new(
        id: u64,
        datastream_id: u64,
        phenomenon_time: DateTime<Utc>,
        result: f64,
        observation_type: impl Into<String>,
    ) -> Self {
        Self {
            id,
            datastream_id,
            phenomenon_time,
            result,
            longitude: None,
            latitude: None,
            observation_type: observation_type.into(),
            units: String::new(),
            feature_id: None,
            qc_flag: None,
            region: None,
            elevation: None,
        }
    }

    pub fn with_position(mut self, longitude: f64, latitude: f64) -> Self {
        self.longitude = Some(longitude);
        self.latitude = Some(latitude);
        self
    }

    pub fn with_feature(mut self, feature_id: u64) -> Self {
        self.feature_id = Some(feature_id);
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = units.into();
        self
    }

    pub fn with_flag(mut self, flag: QualityFlags) -> Self {
        self.qc_flag = Some(flag);
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }
}

/// Flag to write back for one observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagUpdate {
    pub observation_id: u64,
    pub qc_flag: QualityFlags,
}

/// Flag to write back for one feature of interest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlagUpdate {
    pub feature_id: u64,
    pub qc_flag: QualityFlags,
}

/// Driver state; a run never leaves `Failed`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Running { step: String },
    Done,
    Failed { step: String },
}

/// Outcome of one executed step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub label: String,
    /// Rows in the step's evaluation domain
    pub evaluated: usize,
    /// Rows where the predicate fired
    pub fired: usize,
    /// Rows the predicate could not evaluate
    pub undetermined: usize,
    pub elapsed: Duration,
}

/// Summary of a finished run
#[derive(Debug, Clone, Default, Serialize)]
pub struct QcReport {
    pub rows: usize,
    pub steps: Vec<StepReport>,
    pub flag_counts: Vec<(QualityFlags, usize)>,
    pub feature_flags: Vec<FeatureFlagUpdate>,
    /// Observation types with rows flagged probably bad or worse, spatial outliers aside
    pub flagged_observation_types: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<FlagHistory>,
    pub elapsed: Duration,
}

impl QcReport {
    pub fn total_fired(&self) -> usize {
        self.steps.iter().map(|step| step.fired).sum()
    }

    pub fn count_of(&self, flag: QualityFlags) -> usize {
        self.flag_counts
            .iter()
            .find(|(candidate, _)| *candidate == flag)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }
}
