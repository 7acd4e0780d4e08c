//! Rolling z-score test.

use super::{Verdict, bounded_verdicts};
use crate::config::QcConfig;
use crate::constants::MIN_WINDOW_ROWS;
use crate::constants::columns::{DATASTREAM_ID, RESULT, TIME_MICROS};
use crate::error::Result;
use crate::table::ObservationTable;
use crate::timeseries::{centered_rolling, float_values};
use polars::prelude::*;

const WINDOW_COUNT: &str = "window_count";
const WINDOW_MEAN: &str = "window_mean";
const WINDOW_STD: &str = "window_std";
const ZSCORE: &str = "zscore";

/// Z-score of every row against a centered rolling window of its own
/// datastream, in input row order.
///
/// `frame` needs datastream, time and result columns. NaN where the window
/// has fewer than two values or no spread.
pub fn rolling_zscores(frame: LazyFrame, window_micros: i64) -> PolarsResult<Vec<f64>> {
    let values = frame.select([
        col(DATASTREAM_ID),
        col(TIME_MICROS),
        col(RESULT).fill_nan(lit(NULL)).alias(RESULT),
    ]);
    let scored = centered_rolling(
        values,
        TIME_MICROS,
        &[DATASTREAM_ID],
        window_micros,
        &[
            col(RESULT).count().alias(WINDOW_COUNT),
            col(RESULT).mean().alias(WINDOW_MEAN),
            col(RESULT).std(1).alias(WINDOW_STD),
        ],
    )
    .select([when(
        col(WINDOW_COUNT)
            .gt_eq(lit(MIN_WINDOW_ROWS as u32))
            .and(col(WINDOW_STD).gt(lit(0.0))),
    )
    .then((col(RESULT) - col(WINDOW_MEAN)) / col(WINDOW_STD))
    .otherwise(lit(NULL))
    .alias(ZSCORE)])
    .collect()?;

    float_values(&scored, ZSCORE)
}

/// Flags rows whose z-score leaves the configured `[min, max]`
pub fn zscore_check(table: &ObservationTable, config: &QcConfig) -> Result<Vec<Verdict>> {
    let bounds = super::range::bounds_per_row(table, config, |qc| qc.zscore)?;
    if bounds.iter().all(Option::is_none) {
        return Ok(vec![Verdict::Outside; table.height()]);
    }

    let zscores = rolling_zscores(table.indexed_frame(), config.zscore_window.as_micros())?;
    Ok(bounded_verdicts(&zscores, bounds.into_iter()))
}
