//! Unit tests for the QC test battery
//!
//! The shared fixture holds two datastreams of five rows each, sampled once a
//! second at the same instants, with results `i * 2.345 + 10 * datastream`.

pub mod motion_tests;

use crate::models::Observation;
use crate::table::ObservationTable;
use chrono::{DateTime, Duration, TimeZone, Utc};

pub const ROWS_PER_STREAM: u64 = 5;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 3, 14, 9, 0, 0).unwrap()
}

pub fn observation_type_of(datastream: u64) -> &'static str {
    if datastream == 0 { "salinity" } else { "temperature" }
}

pub fn fixture_observations() -> Vec<Observation> {
    let mut observations = Vec::new();
    for datastream in 0..2u64 {
        for i in 0..ROWS_PER_STREAM {
            observations.push(
                Observation::new(
                    datastream * ROWS_PER_STREAM + i,
                    datastream,
                    t0() + Duration::seconds(i as i64),
                    i as f64 * 2.345 + 10.0 * datastream as f64,
                    observation_type_of(datastream),
                )
                .with_position(3.0 + i as f64 * 1e-5, 51.0 + i as f64 * 1e-5)
                .with_feature(1000 + i),
            );
        }
    }
    observations
}

pub fn fixture_table() -> ObservationTable {
    ObservationTable::from_observations(&fixture_observations()).unwrap()
}

/// Indices of rows with the given verdict
pub fn rows_with(verdicts: &[crate::qc::Verdict], wanted: crate::qc::Verdict) -> Vec<usize> {
    verdicts
        .iter()
        .enumerate()
        .filter(|(_, v)| **v == wanted)
        .map(|(i, _)| i)
        .collect()
}
