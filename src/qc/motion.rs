//! Velocity and acceleration limit tests.

use super::Verdict;
use crate::constants::columns::{FEATURE_ID, LATITUDE, LONGITUDE, ROW_INDEX, TIME_MICROS};
use crate::error::Result;
use crate::table::ObservationTable;
use crate::timeseries::kinematics::{ACCELERATION, VELOCITY};
use crate::timeseries::{float_values, kinematics, row_positions};
use polars::prelude::*;

/// Which motion quantity a limit applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionQuantity {
    Velocity,
    Acceleration,
}

impl MotionQuantity {
    fn column(self) -> &'static str {
        match self {
            MotionQuantity::Velocity => VELOCITY,
            MotionQuantity::Acceleration => ACCELERATION,
        }
    }
}

/// Motion values for every row of the table.
///
/// Rows without a position are `None`. Rows sharing `(time, feature_id)`
/// with a retained row (other datastreams sampled at the same fix) take the
/// retained row's value.
pub fn motion_per_row(
    table: &ObservationTable,
    quantity: MotionQuantity,
) -> Result<Vec<Option<f64>>> {
    let positioned = table
        .indexed_frame()
        .filter(col(LONGITUDE).is_finite().and(col(LATITUDE).is_finite()))
        .select([
            col(ROW_INDEX),
            col(TIME_MICROS),
            col(LONGITUDE),
            col(LATITUDE),
            col(FEATURE_ID),
        ]);
    let column = quantity.column();
    let by_fix = kinematics(positioned.clone())?
        .lazy()
        .select([col(TIME_MICROS), col(FEATURE_ID), col(column)]);

    let mut args = JoinArgs::new(JoinType::Left);
    args.nulls_equal = true;
    let joined = positioned
        .join(
            by_fix,
            [col(TIME_MICROS), col(FEATURE_ID)],
            [col(TIME_MICROS), col(FEATURE_ID)],
            args,
        )
        .select([col(ROW_INDEX), col(column)])
        .collect()?;

    let mut out = vec![None; table.height()];
    let rows = row_positions(&joined, ROW_INDEX)?;
    for (row, value) in rows.into_iter().zip(float_values(&joined, column)?) {
        out[row] = Some(value);
    }
    Ok(out)
}

/// Fires where `|value| > limit`; NaN values cannot be evaluated
pub fn motion_check(
    table: &ObservationTable,
    quantity: MotionQuantity,
    limit: f64,
) -> Result<Vec<Verdict>> {
    Ok(motion_per_row(table, quantity)?
        .into_iter()
        .map(|value| match value {
            None => Verdict::Outside,
            Some(v) if v.is_nan() => Verdict::Undetermined,
            Some(v) => Verdict::from_predicate(Some(v.abs() > limit)),
        })
        .collect())
}
