//! Time-series queries over irregularly sampled observations.
//!
//! Everything here is a polars lazy query over frames carrying
//! [`TIME_MICROS`](crate::constants::columns::TIME_MICROS), the phenomenon
//! time in UTC microseconds. Elapsed times and rates are in seconds. Only the
//! geodesic distance is evaluated row by row.

pub mod asof;
pub mod gradient;
pub mod kinematics;
pub mod rolling;

pub use asof::asof_backward;
pub use gradient::{gradient, gradient_per_stream};
pub use kinematics::{geodesic_distance, kinematics};
pub use rolling::{centered_rolling, window_span_seconds};

use crate::constants::MICROS_PER_SECOND;
use polars::prelude::*;

pub fn micros_to_seconds(micros: i64) -> f64 {
    micros as f64 / MICROS_PER_SECOND as f64
}

/// Elapsed seconds of an integer microsecond expression
pub fn seconds(micros: Expr) -> Expr {
    micros.cast(DataType::Float64) / lit(MICROS_PER_SECOND as f64)
}

/// Null out NaN and infinite values
pub fn finite_or_null(expr: Expr) -> Expr {
    when(expr.clone().is_finite())
        .then(expr)
        .otherwise(lit(NULL))
}

/// Stable sort options
pub fn stable() -> SortMultipleOptions {
    SortMultipleOptions::default().with_maintain_order(true)
}

/// A float column with nulls read as NaN
pub fn float_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<f64>> {
    Ok(df
        .column(name)?
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// Row positions held in an index column
pub fn row_positions(df: &DataFrame, name: &str) -> PolarsResult<Vec<usize>> {
    df.column(name)?
        .cast(&DataType::UInt64)?
        .u64()?
        .into_iter()
        .map(|v| {
            v.map(|v| v as usize)
                .ok_or_else(|| polars_err!(ComputeError: "null row position in `{}`", name))
        })
        .collect()
}

#[cfg(test)]
pub mod tests;
