//! Spatial outlier test against a rolling median position.

use super::Verdict;
use crate::config::LocationConfig;
use crate::constants::columns::{LATITUDE, LONGITUDE, ROW_INDEX, TIME_MICROS};
use crate::error::Result;
use crate::table::ObservationTable;
use crate::timeseries::{
    centered_rolling, float_values, geodesic_distance, row_positions, stable,
    window_span_seconds,
};
use polars::prelude::*;
use tracing::debug;

const TRACK_ROW: &str = "track_row";
const MEDIAN_LONGITUDE: &str = "median_longitude";
const MEDIAN_LATITUDE: &str = "median_latitude";
const WINDOW_SPAN: &str = "window_span";

/// Flags positions further from the local median position than the platform
/// could travel in the window's actual time span.
///
/// `track` needs time, longitude and latitude columns; the result follows its
/// row order. Median longitude and latitude are taken independently over the
/// centered time window, leaving out degenerate fixes (latitude equal to
/// longitude) and missing positions. Those rows borrow the nearest earlier
/// reference in time, or the next one at the start of the track.
pub fn spatial_outlier_predicate(
    track: LazyFrame,
    location: &LocationConfig,
) -> Result<Vec<Option<bool>>> {
    let window = location.time_window.as_micros();
    let track = track
        .select([col(TIME_MICROS), col(LONGITUDE), col(LATITUDE)])
        .with_row_index(TRACK_ROW, None);

    let usable = col(LONGITUDE)
        .is_finite()
        .and(col(LATITUDE).is_finite())
        .and(col(LONGITUDE).neq(col(LATITUDE)));
    let medians = centered_rolling(
        track.clone().filter(usable),
        TIME_MICROS,
        &[],
        window,
        &[
            col(LONGITUDE).median().alias(MEDIAN_LONGITUDE),
            col(LATITUDE).median().alias(MEDIAN_LATITUDE),
        ],
    )
    .select([col(TRACK_ROW), col(MEDIAN_LONGITUDE), col(MEDIAN_LATITUDE)]);
    let spans = centered_rolling(
        track,
        TIME_MICROS,
        &[],
        window,
        &[window_span_seconds(TIME_MICROS).alias(WINDOW_SPAN)],
    );

    let nearest_reference = |name: &str| {
        col(name)
            .fill_null_with_strategy(FillNullStrategy::Forward(None))
            .fill_null_with_strategy(FillNullStrategy::Backward(None))
    };
    let referenced = spans
        .join(
            medians,
            [col(TRACK_ROW)],
            [col(TRACK_ROW)],
            JoinArgs::new(JoinType::Left),
        )
        .sort([TIME_MICROS, TRACK_ROW], stable())
        .with_columns([
            nearest_reference(MEDIAN_LONGITUDE),
            nearest_reference(MEDIAN_LATITUDE),
        ])
        .sort([TRACK_ROW], SortMultipleOptions::default())
        .collect()?;

    let rows = row_positions(&referenced, TRACK_ROW)?;
    let longitudes = float_values(&referenced, LONGITUDE)?;
    let latitudes = float_values(&referenced, LATITUDE)?;
    let median_longitudes = float_values(&referenced, MEDIAN_LONGITUDE)?;
    let median_latitudes = float_values(&referenced, MEDIAN_LATITUDE)?;
    let spans = float_values(&referenced, WINDOW_SPAN)?;

    let mut out = vec![None; rows.len()];
    for (k, &row) in rows.iter().enumerate() {
        let distance = geodesic_distance(
            longitudes[k],
            latitudes[k],
            median_longitudes[k],
            median_latitudes[k],
        );
        out[row] = (!distance.is_nan()).then(|| distance > spans[k] * location.max_dx_dt);
    }
    Ok(out)
}

/// Rows without a position are outside the test's domain
pub fn spatial_outlier_check(
    table: &ObservationTable,
    location: &LocationConfig,
) -> Result<Vec<Verdict>> {
    let positioned = table
        .indexed_frame()
        .filter(col(LONGITUDE).is_finite().and(col(LATITUDE).is_finite()))
        .select([col(ROW_INDEX), col(TIME_MICROS), col(LONGITUDE), col(LATITUDE)])
        .collect()?;
    debug!(
        "Spatial outliers: {} of {} rows positioned",
        positioned.height(),
        table.height()
    );

    let mut verdicts = vec![Verdict::Outside; table.height()];
    if positioned.height() == 0 {
        return Ok(verdicts);
    }

    let rows = row_positions(&positioned, ROW_INDEX)?;
    let predicate = spatial_outlier_predicate(positioned.lazy(), location)?;
    for (row, value) in rows.into_iter().zip(predicate) {
        verdicts[row] = Verdict::from_predicate(value);
    }
    Ok(verdicts)
}
