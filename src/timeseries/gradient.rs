//! Time derivative of a value series.

use super::{finite_or_null, float_values, seconds, stable};
use crate::constants::columns::{DATASTREAM_ID, RESULT, TIME_MICROS};
use polars::prelude::*;

/// Output column of [`gradient`]
pub const GRADIENT: &str = "gradient";

const GRADIENT_ORDER: &str = "gradient_order";
const BACK_STEP: &str = "gradient_back_step";
const FORWARD_STEP: &str = "gradient_forward_step";
const PREVIOUS: &str = "gradient_previous";
const NEXT: &str = "gradient_next";

/// Add the derivative of `value` with respect to `time` (integer
/// microseconds) as [`GRADIENT`], per partition of `by`, in time order.
///
/// Second-order central differences on the interior (correct for uneven
/// spacing) and one-sided first differences at both ends. Partitions with a
/// single row get null. Zero spacing yields null, never infinity. Input row
/// order is kept.
pub fn gradient(frame: LazyFrame, value: &str, time: &str, by: &[&str]) -> LazyFrame {
    let partitions: Vec<Expr> = by.iter().map(|name| col(*name)).collect();
    let neighbour = |name: &str, offset: i64| {
        let shifted = col(name).shift(lit(offset));
        if partitions.is_empty() {
            shifted
        } else {
            shifted.over(partitions.clone())
        }
    };
    let order: Vec<&str> = by.iter().copied().chain([time, GRADIENT_ORDER]).collect();

    let hs = || col(BACK_STEP);
    let hd = || col(FORWARD_STEP);
    let interior = (hs() * hs() * col(NEXT) + (hd() * hd() - hs() * hs()) * col(value)
        - hd() * hd() * col(PREVIOUS))
        / (hs() * hd() * (hd() + hs()));
    let derivative = when(hs().is_null().and(hd().is_null()))
        .then(lit(NULL))
        .when(hs().is_null())
        .then((col(NEXT) - col(value)) / hd())
        .when(hd().is_null())
        .then((col(value) - col(PREVIOUS)) / hs())
        .otherwise(interior);

    frame
        .with_row_index(GRADIENT_ORDER, None)
        .sort(order, stable())
        .with_columns([
            seconds(col(time) - neighbour(time, 1)).alias(BACK_STEP),
            seconds(neighbour(time, -1) - col(time)).alias(FORWARD_STEP),
            neighbour(value, 1).alias(PREVIOUS),
            neighbour(value, -1).alias(NEXT),
        ])
        .with_column(finite_or_null(derivative).alias(GRADIENT))
        .sort([GRADIENT_ORDER], SortMultipleOptions::default())
        .drop([GRADIENT_ORDER, BACK_STEP, FORWARD_STEP, PREVIOUS, NEXT])
}

/// d(result)/dt per datastream, returned in input row order. NaN where the
/// derivative is undefined.
pub fn gradient_per_stream(frame: LazyFrame) -> PolarsResult<Vec<f64>> {
    let derived = gradient(
        frame.select([col(DATASTREAM_ID), col(TIME_MICROS), col(RESULT)]),
        RESULT,
        TIME_MICROS,
        &[DATASTREAM_ID],
    )
    .select([col(GRADIENT)])
    .collect()?;
    float_values(&derived, GRADIENT)
}
