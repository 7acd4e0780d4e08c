//! Application constants for the QC engine
//!
//! Column names of the observation table, default thresholds and the
//! default run order of QC steps.

// =============================================================================
// Observation Table Columns
// =============================================================================

/// Column names of the flat observation table handed over by the fetch side
pub mod columns {
    pub const ID: &str = "id";
    pub const DATASTREAM_ID: &str = "datastream_id";
    pub const PHENOMENON_TIME: &str = "phenomenon_time";
    pub const RESULT: &str = "result";
    pub const LONGITUDE: &str = "longitude";
    pub const LATITUDE: &str = "latitude";
    pub const OBSERVATION_TYPE: &str = "observation_type";
    pub const UNITS: &str = "units";
    pub const FEATURE_ID: &str = "feature_id";
    pub const QC_FLAG: &str = "qc_flag";

    /// Region name from the region lookup; null when outside every known region
    pub const REGION: &str = "region";
    /// Seabed/terrain elevation in metres, negative below sea level
    pub const ELEVATION: &str = "elevation";

    /// Row position, added by the time-series queries
    pub const ROW_INDEX: &str = "row_index";
    /// Phenomenon time as integer UTC microseconds, added by the time-series queries
    pub const TIME_MICROS: &str = "time_us";

    /// Columns every input table must carry
    pub const REQUIRED: &[&str] = &[
        ID,
        DATASTREAM_ID,
        PHENOMENON_TIME,
        RESULT,
        OBSERVATION_TYPE,
        QC_FLAG,
    ];
}

/// Column names used when exporting flag updates
pub mod export {
    pub const OBSERVATION_ID: &str = "observation_id";
    pub const FEATURE_ID: &str = "feature_id";
    pub const QC_FLAG: &str = "qc_flag";
}

// =============================================================================
// Defaults
// =============================================================================

/// Rolling window of the spatial-outlier test
pub const DEFAULT_LOCATION_WINDOW: &str = "5min";

/// Rolling window of the z-score test
pub const DEFAULT_ZSCORE_WINDOW: &str = "60min";

/// Maximum plausible platform speed in m/s
pub const DEFAULT_MAX_DX_DT: f64 = 5.0;

/// Maximum plausible platform acceleration in m/s^2
pub const DEFAULT_MAX_DDX_DTDT: f64 = 0.5;

/// Elevation at or above which a position is considered on land
pub const DEFAULT_DEPTH_THRESHOLD: f64 = 0.0;

/// Time tolerance of the dependent-quantity join
pub const DEFAULT_DT_TOLERANCE: &str = "0.5s";

/// Region-name fragment identifying land polygons
pub const MAINLAND_REGION_MARKER: &str = "mainland";

/// Minimum rows a rolling window needs before a spread can be computed
pub const MIN_WINDOW_ROWS: usize = 2;

pub const MICROS_PER_SECOND: i64 = 1_000_000;

/// Default file name of the QC configuration under the user config directory
pub const CONFIG_DIR_NAME: &str = "marine-qc";
pub const CONFIG_FILE_NAME: &str = "config.yaml";

// =============================================================================
// Default Step Labels
// =============================================================================

pub mod labels {
    pub const REGION_NULL: &str = "region_null";
    pub const REGION_MAINLAND: &str = "region_mainland";
    pub const DEPTH: &str = "depth";
    pub const SPATIAL_OUTLIER: &str = "spatial_outlier";
    pub const VELOCITY: &str = "velocity";
    pub const ACCELERATION: &str = "acceleration";
    pub const RANGE: &str = "range";
    pub const GRADIENT: &str = "gradient";
    pub const ZSCORE: &str = "zscore";
    pub const DEPENDENT: &str = "dependent";
}
