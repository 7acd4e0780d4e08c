//! Configuration management and validation.
//!
//! Provides the QC configuration consumed by the engine: per observation type
//! thresholds, dependent-quantity pairs, location thresholds, and the ordered
//! list of QC steps with their flag mappings.

use crate::constants::{self, labels};
use crate::error::{QcError, Result};
use crate::flags::QualityFlags;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d*\.?\d+)\s*([A-Za-zµ]+)\s*$").expect("duration pattern is valid")
});

/// Parse a frequency offset string ("5min", "0.5s", "1d") into microseconds
pub fn parse_duration(text: &str) -> Result<i64> {
    let invalid = || QcError::InvalidDuration {
        value: text.to_string(),
    };

    let caps = DURATION_RE.captures(text).ok_or_else(invalid)?;
    let amount: f64 = caps[1].parse().map_err(|_| invalid())?;
    let unit_micros: f64 = match caps[2].to_ascii_lowercase().as_str() {
        "d" | "day" | "days" => 86_400e6,
        "h" | "hr" | "hour" | "hours" => 3_600e6,
        "min" | "t" | "minute" | "minutes" => 60e6,
        "s" | "sec" | "second" | "seconds" => 1e6,
        "ms" | "l" | "milli" | "millis" | "milliseconds" => 1e3,
        "us" | "µs" | "u" | "micro" | "micros" | "microseconds" => 1.0,
        _ => return Err(invalid()),
    };

    Ok((amount * unit_micros).round() as i64)
}

/// Non-negative time span parsed from an offset string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeSpan {
    micros: i64,
}

impl TimeSpan {
    pub fn from_micros(micros: i64) -> Self {
        Self { micros }
    }

    pub fn from_secs_f64(seconds: f64) -> Self {
        Self {
            micros: (seconds * constants::MICROS_PER_SECOND as f64).round() as i64,
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        parse_duration(text).map(Self::from_micros)
    }

    pub fn as_micros(self) -> i64 {
        self.micros
    }

    pub fn as_secs_f64(self) -> f64 {
        self.micros as f64 / constants::MICROS_PER_SECOND as f64
    }
}

impl TryFrom<String> for TimeSpan {
    type Error = QcError;

    fn try_from(value: String) -> Result<Self> {
        TimeSpan::parse(&value)
    }
}

impl From<TimeSpan> for String {
    fn from(span: TimeSpan) -> Self {
        span.to_string()
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const UNITS: [(i64, &str); 5] = [
            (86_400_000_000, "d"),
            (3_600_000_000, "h"),
            (60_000_000, "min"),
            (1_000_000, "s"),
            (1_000, "ms"),
        ];
        for (size, suffix) in UNITS {
            if self.micros != 0 && self.micros % size == 0 {
                return write!(f, "{}{}", self.micros / size, suffix);
            }
        }
        write!(f, "{}us", self.micros)
    }
}

/// Closed value interval, written as `[min, max]` in configuration files
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct RangeBounds {
    pub min: f64,
    pub max: f64,
}

impl RangeBounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// `Some(true)` when outside the interval; bounds themselves pass.
    /// `None` when the value is NaN.
    pub fn is_outside(&self, value: f64) -> Option<bool> {
        if value.is_nan() {
            None
        } else {
            Some(value < self.min || value > self.max)
        }
    }

    fn validate(&self, context: &str) -> Result<()> {
        if self.min.is_nan() || self.max.is_nan() || self.min > self.max {
            return Err(QcError::configuration(format!(
                "{context}: invalid range [{}, {}]",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

impl From<[f64; 2]> for RangeBounds {
    fn from([min, max]: [f64; 2]) -> Self {
        Self { min, max }
    }
}

impl From<RangeBounds> for [f64; 2] {
    fn from(bounds: RangeBounds) -> Self {
        [bounds.min, bounds.max]
    }
}

/// Thresholds for a single observation type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservationTypeQc {
    /// Accepted range of the measured value
    pub range: Option<RangeBounds>,

    /// Accepted range of the time derivative (value units per second)
    pub gradient: Option<RangeBounds>,

    /// Accepted range of the rolling z-score
    pub zscore: Option<RangeBounds>,
}

impl ObservationTypeQc {
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.range = Some(RangeBounds::new(min, max));
        self
    }

    pub fn with_gradient(mut self, min: f64, max: f64) -> Self {
        self.gradient = Some(RangeBounds::new(min, max));
        self
    }

    pub fn with_zscore(mut self, min: f64, max: f64) -> Self {
        self.zscore = Some(RangeBounds::new(min, max));
        self
    }
}

/// Checks applied to the independent value of a dependent-quantity pair
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DependentQc {
    pub range: Option<RangeBounds>,
}

/// A datastream whose validity follows another datastream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependentQuantityConfig {
    pub independent: u64,

    /// One or more dependent datastreams: `3`, `[3, 4]` or `"3,4"`
    #[serde(deserialize_with = "deserialize_datastreams")]
    pub dependent: Vec<u64>,

    #[serde(default = "default_dt_tolerance")]
    pub dt_tolerance: TimeSpan,

    #[serde(default, alias = "QC")]
    pub qc: DependentQc,

    /// Flag for dependent rows without an independent row within tolerance
    #[serde(default = "default_flag_when_missing")]
    pub flag_when_missing: Option<QualityFlags>,
}

impl DependentQuantityConfig {
    pub fn new(independent: u64, dependent: u64) -> Self {
        Self {
            independent,
            dependent: vec![dependent],
            dt_tolerance: default_dt_tolerance(),
            qc: DependentQc::default(),
            flag_when_missing: default_flag_when_missing(),
        }
    }

    pub fn with_dt_tolerance(mut self, dt_tolerance: TimeSpan) -> Self {
        self.dt_tolerance = dt_tolerance;
        self
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.qc.range = Some(RangeBounds::new(min, max));
        self
    }

    pub fn with_flag_when_missing(mut self, flag: Option<QualityFlags>) -> Self {
        self.flag_when_missing = flag;
        self
    }

    /// (independent, dependent) pairs in configured order
    pub fn pairs(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.dependent
            .iter()
            .map(move |dependent| (self.independent, *dependent))
    }
}

fn default_dt_tolerance() -> TimeSpan {
    TimeSpan::parse(constants::DEFAULT_DT_TOLERANCE).unwrap_or(TimeSpan::from_micros(500_000))
}

fn default_flag_when_missing() -> Option<QualityFlags> {
    Some(QualityFlags::Bad)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DatastreamList {
    One(u64),
    Many(Vec<u64>),
    Text(String),
}

fn deserialize_datastreams<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<u64>, D::Error> {
    match DatastreamList::deserialize(deserializer)? {
        DatastreamList::One(id) => Ok(vec![id]),
        DatastreamList::Many(ids) => Ok(ids),
        DatastreamList::Text(text) => text
            .split(',')
            .map(|part| part.trim().parse::<u64>().map_err(serde::de::Error::custom))
            .collect(),
    }
}

/// Platform motion thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Maximum speed in m/s
    pub max_dx_dt: f64,

    /// Maximum acceleration in m/s^2
    pub max_ddx_dtdt: f64,

    /// Centered rolling window of the spatial-outlier median
    pub time_window: TimeSpan,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            max_dx_dt: constants::DEFAULT_MAX_DX_DT,
            max_ddx_dtdt: constants::DEFAULT_MAX_DDX_DTDT,
            time_window: TimeSpan::parse(constants::DEFAULT_LOCATION_WINDOW)
                .unwrap_or(TimeSpan::from_micros(5 * 60 * constants::MICROS_PER_SECOND)),
        }
    }
}

/// Which test a step runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    /// Position outside every known region
    RegionNull,
    /// Position inside a land region
    RegionMainland,
    /// Position outside known regions with elevation at or above the threshold
    DepthAboveThreshold,
    SpatialOutlier,
    Velocity,
    Acceleration,
    Range,
    Gradient,
    Zscore,
    /// Expands to a base and a secondary check per configured pair
    DependentQuantity,
}

impl CheckKind {
    /// Checks that judge the platform position rather than the measured value
    pub fn is_location_class(self) -> bool {
        matches!(
            self,
            CheckKind::RegionNull
                | CheckKind::RegionMainland
                | CheckKind::DepthAboveThreshold
                | CheckKind::SpatialOutlier
        )
    }
}

/// Mapping of a predicate outcome to flags
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlagMapping {
    pub on_true: QualityFlags,

    /// Absent: rows that passed are left untouched
    #[serde(default)]
    pub on_false: Option<QualityFlags>,

    /// Absent: rows that could not be evaluated are left untouched
    #[serde(default)]
    pub on_nan: Option<QualityFlags>,
}

impl FlagMapping {
    pub fn new(on_true: QualityFlags) -> Self {
        Self {
            on_true,
            on_false: None,
            on_nan: None,
        }
    }

    pub fn with_on_false(mut self, flag: QualityFlags) -> Self {
        self.on_false = Some(flag);
        self
    }

    pub fn with_on_nan(mut self, flag: QualityFlags) -> Self {
        self.on_nan = Some(flag);
        self
    }
}

/// One entry of the ordered QC run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepConfig {
    pub label: String,

    pub check: CheckKind,

    pub flags: FlagMapping,

    /// Labels of earlier steps whose flagged rows are removed from this step's domain
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl StepConfig {
    pub fn new(label: impl Into<String>, check: CheckKind, flags: FlagMapping) -> Self {
        Self {
            label: label.into(),
            check,
            flags,
            exclude: Vec::new(),
        }
    }

    pub fn excluding(mut self, label: impl Into<String>) -> Self {
        self.exclude.push(label.into());
        self
    }
}

/// The run order and flag mappings of the original pipeline
pub fn default_steps() -> Vec<StepConfig> {
    use QualityFlags::*;

    let value_check = FlagMapping::new(Bad)
        .with_on_false(ProbablyGood)
        .with_on_nan(NoQualityControl);

    vec![
        StepConfig::new(
            labels::REGION_NULL,
            CheckKind::RegionNull,
            FlagMapping::new(ProbablyGood).with_on_false(NoQualityControl),
        ),
        StepConfig::new(
            labels::REGION_MAINLAND,
            CheckKind::RegionMainland,
            FlagMapping::new(Bad),
        ),
        StepConfig::new(
            labels::DEPTH,
            CheckKind::DepthAboveThreshold,
            FlagMapping::new(Bad),
        ),
        StepConfig::new(
            labels::SPATIAL_OUTLIER,
            CheckKind::SpatialOutlier,
            FlagMapping::new(Bad).with_on_nan(ProbablyGood),
        ),
        StepConfig::new(
            labels::VELOCITY,
            CheckKind::Velocity,
            FlagMapping::new(Bad).with_on_nan(NoQualityControl),
        )
        .excluding(labels::SPATIAL_OUTLIER),
        StepConfig::new(
            labels::ACCELERATION,
            CheckKind::Acceleration,
            FlagMapping::new(Bad).with_on_nan(NoQualityControl),
        )
        .excluding(labels::SPATIAL_OUTLIER),
        StepConfig::new(labels::RANGE, CheckKind::Range, value_check),
        StepConfig::new(labels::GRADIENT, CheckKind::Gradient, value_check),
        StepConfig::new(
            labels::ZSCORE,
            CheckKind::Zscore,
            FlagMapping::new(ProbablyBad),
        ),
        StepConfig::new(
            labels::DEPENDENT,
            CheckKind::DependentQuantity,
            FlagMapping::new(Bad),
        ),
    ]
}

/// Global configuration of a QC run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QcConfig {
    /// Thresholds keyed by observation type
    #[serde(alias = "QC")]
    pub qc: BTreeMap<String, ObservationTypeQc>,

    /// Dependent-quantity pairs, applied in order
    #[serde(alias = "QC_dependent")]
    pub dependent: Vec<DependentQuantityConfig>,

    /// Motion and spatial-outlier thresholds
    pub location: LocationConfig,

    /// Centered rolling window of the z-score test
    pub zscore_window: TimeSpan,

    /// Elevation at or above which an unregioned position counts as land
    pub depth_threshold: f64,

    /// Ordered QC steps
    pub steps: Vec<StepConfig>,

    /// Record which steps assigned which flag to every observation
    pub flag_history: bool,
}

impl Default for QcConfig {
    fn default() -> Self {
        Self {
            qc: BTreeMap::new(),
            dependent: Vec::new(),
            location: LocationConfig::default(),
            zscore_window: TimeSpan::parse(constants::DEFAULT_ZSCORE_WINDOW)
                .unwrap_or(TimeSpan::from_micros(60 * 60 * constants::MICROS_PER_SECOND)),
            depth_threshold: constants::DEFAULT_DEPTH_THRESHOLD,
            steps: default_steps(),
            flag_history: false,
        }
    }
}

impl QcConfig {
    /// Load and validate a YAML configuration file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(QcError::InputNotFound {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&text)?;
        debug!(
            "Loaded QC configuration from {} ({} observation types, {} steps)",
            path.display(),
            config.qc.len(),
            config.steps.len()
        );
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: QcConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// `<config dir>/marine-qc/config.yaml`, when the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| {
            dir.join(constants::CONFIG_DIR_NAME)
                .join(constants::CONFIG_FILE_NAME)
        })
    }

    pub fn with_observation_type(mut self, name: impl Into<String>, qc: ObservationTypeQc) -> Self {
        self.qc.insert(name.into(), qc);
        self
    }

    pub fn with_dependent(mut self, dependent: DependentQuantityConfig) -> Self {
        self.dependent.push(dependent);
        self
    }

    pub fn with_location(mut self, location: LocationConfig) -> Self {
        self.location = location;
        self
    }

    pub fn with_zscore_window(mut self, window: TimeSpan) -> Self {
        self.zscore_window = window;
        self
    }

    pub fn with_depth_threshold(mut self, threshold: f64) -> Self {
        self.depth_threshold = threshold;
        self
    }

    pub fn with_steps(mut self, steps: Vec<StepConfig>) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_flag_history(mut self) -> Self {
        self.flag_history = true;
        self
    }

    pub fn observation_type(&self, name: &str) -> Option<&ObservationTypeQc> {
        self.qc.get(name)
    }

    /// Reject configurations the engine cannot run
    pub fn validate(&self) -> Result<()> {
        for (name, qc) in &self.qc {
            for (kind, bounds) in [
                ("range", qc.range),
                ("gradient", qc.gradient),
                ("zscore", qc.zscore),
            ] {
                if let Some(bounds) = bounds {
                    bounds.validate(&format!("{name}.{kind}"))?;
                }
            }
        }

        for entry in &self.dependent {
            if entry.dependent.is_empty() {
                return Err(QcError::configuration(format!(
                    "dependent entry for datastream {} lists no dependent datastream",
                    entry.independent
                )));
            }
            if entry.dependent.contains(&entry.independent) {
                return Err(QcError::configuration(format!(
                    "datastream {} cannot depend on itself",
                    entry.independent
                )));
            }
            if let Some(bounds) = entry.qc.range {
                bounds.validate(&format!("dependent {}.range", entry.independent))?;
            }
        }

        if !(self.location.max_dx_dt >= 0.0) || !(self.location.max_ddx_dtdt >= 0.0) {
            return Err(QcError::configuration(
                "location thresholds must be non-negative numbers",
            ));
        }
        if self.location.time_window.as_micros() <= 0 || self.zscore_window.as_micros() <= 0 {
            return Err(QcError::configuration("rolling windows must be positive"));
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for step in &self.steps {
            for excluded in &step.exclude {
                if !seen.contains(excluded.as_str()) {
                    return Err(QcError::UnknownStep {
                        label: excluded.clone(),
                    });
                }
            }
            if !seen.insert(step.label.as_str()) {
                return Err(QcError::configuration(format!(
                    "duplicate step label: {}",
                    step.label
                )));
            }
        }

        Ok(())
    }
}
