//! Platform motion derived from timestamped positions.

use super::{finite_or_null, float_values, seconds, stable};
use crate::constants::columns::{FEATURE_ID, LATITUDE, LONGITUDE, TIME_MICROS};
use geo::{Distance, Geodesic, Point};
use polars::prelude::*;
use tracing::debug;

pub const DT: &str = "dt";
pub const DISTANCE: &str = "distance";
pub const VELOCITY: &str = "velocity";
pub const ACCELERATION: &str = "acceleration";

const NEXT_LONGITUDE: &str = "next_longitude";
const NEXT_LATITUDE: &str = "next_latitude";

/// Geodesic (WGS84) distance in metres; NaN when a coordinate is missing
pub fn geodesic_distance(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    if [lon1, lat1, lon2, lat2].iter().any(|v| !v.is_finite()) {
        return f64::NAN;
    }
    Geodesic::distance(Point::new(lon1, lat1), Point::new(lon2, lat2))
}

/// Compute dt, distance, velocity and acceleration for a position track.
///
/// `track` needs time, longitude, latitude and feature id columns; other
/// columns are carried along. Rows are time-sorted (stably) and rows
/// repeating an earlier `(time, feature_id)` are dropped, so the result holds
/// the retained rows in time order. `dt` and `distance` look forward to the
/// next row and are null on the last one. Non-finite rates become null and
/// are back-filled from the next valid value.
pub fn kinematics(track: LazyFrame) -> PolarsResult<DataFrame> {
    let mut retained = track
        .sort([TIME_MICROS], stable())
        .unique_stable(
            Some(vec![TIME_MICROS.into(), FEATURE_ID.into()]),
            UniqueKeepStrategy::First,
        )
        .with_columns([
            seconds(col(TIME_MICROS).shift(lit(-1)) - col(TIME_MICROS)).alias(DT),
            col(LONGITUDE).shift(lit(-1)).alias(NEXT_LONGITUDE),
            col(LATITUDE).shift(lit(-1)).alias(NEXT_LATITUDE),
        ])
        .collect()?;
    debug!("Kinematics over {} retained fixes", retained.height());

    let lons = float_values(&retained, LONGITUDE)?;
    let lats = float_values(&retained, LATITUDE)?;
    let next_lons = float_values(&retained, NEXT_LONGITUDE)?;
    let next_lats = float_values(&retained, NEXT_LATITUDE)?;
    let distances: Vec<Option<f64>> = (0..retained.height())
        .map(|k| {
            let distance = geodesic_distance(lons[k], lats[k], next_lons[k], next_lats[k]);
            (!distance.is_nan()).then_some(distance)
        })
        .collect();
    retained.with_column(Column::new(DISTANCE.into(), distances))?;

    retained
        .lazy()
        .with_column(
            finite_or_null(col(DISTANCE) / col(DT))
                .fill_null_with_strategy(FillNullStrategy::Backward(None))
                .alias(VELOCITY),
        )
        .with_column(
            finite_or_null((col(VELOCITY).shift(lit(-1)) - col(VELOCITY)) / col(DT))
                .fill_null_with_strategy(FillNullStrategy::Backward(None))
                .alias(ACCELERATION),
        )
        .drop([NEXT_LONGITUDE, NEXT_LATITUDE])
        .collect()
}
