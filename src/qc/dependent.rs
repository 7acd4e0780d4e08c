//! Cross-datastream checks for dependent quantities.
//!
//! Dependent rows are aligned to the independent datastream with a backward
//! asof join: the latest independent row at or before the dependent time,
//! within the configured tolerance.

use crate::config::{RangeBounds, TimeSpan};
use crate::constants::columns::{DATASTREAM_ID, ROW_INDEX, TIME_MICROS};
use crate::error::Result;
use crate::flags::{Flag, QualityFlags};
use crate::table::ObservationTable;
use crate::timeseries::{asof_backward, row_positions};
use polars::prelude::*;
use tracing::debug;

const MATCHED_ROW: &str = "matched_row";

/// Dependent rows and their matched independent rows, as table row indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependentAlignment {
    /// In dependent time order
    pub matches: Vec<(usize, Option<usize>)>,
}

impl DependentAlignment {
    pub fn from_table(
        table: &ObservationTable,
        independent: u64,
        dependent: u64,
        tolerance: TimeSpan,
    ) -> Result<Self> {
        let rows = table
            .indexed_frame()
            .select([col(ROW_INDEX), col(DATASTREAM_ID), col(TIME_MICROS)]);
        let dependent_rows = rows
            .clone()
            .filter(col(DATASTREAM_ID).eq(lit(dependent)))
            .select([col(ROW_INDEX), col(TIME_MICROS)]);
        let independent_rows = rows
            .filter(col(DATASTREAM_ID).eq(lit(independent)))
            .select([col(ROW_INDEX).alias(MATCHED_ROW), col(TIME_MICROS)]);

        let joined = asof_backward(
            dependent_rows,
            independent_rows,
            TIME_MICROS,
            tolerance.as_micros(),
        )
        .select([col(ROW_INDEX), col(MATCHED_ROW)])
        .collect()?;

        let dependent_positions = row_positions(&joined, ROW_INDEX)?;
        let matched_positions = joined
            .column(MATCHED_ROW)?
            .cast(&DataType::UInt64)?
            .u64()?
            .into_iter()
            .map(|row| row.map(|row| row as usize))
            .collect::<Vec<_>>();
        let matches: Vec<(usize, Option<usize>)> =
            dependent_positions.into_iter().zip(matched_positions).collect();

        debug!(
            "Aligned datastream {} to {}: {} of {} rows matched within {}",
            dependent,
            independent,
            matches.iter().filter(|(_, m)| m.is_some()).count(),
            matches.len(),
            tolerance
        );
        Ok(Self { matches })
    }
}

/// Propagate the independent flag to matched dependent rows.
///
/// A matched independent flag other than no-QC or good is assigned to the
/// dependent row. Unmatched dependent rows get `flag_when_missing`.
pub fn dependent_base_flags(
    alignment: &DependentAlignment,
    flags: &[Flag],
    flag_when_missing: Option<QualityFlags>,
) -> Vec<Option<QualityFlags>> {
    let mut out = vec![None; flags.len()];
    for &(row, matched) in &alignment.matches {
        out[row] = match matched {
            Some(independent_row) => match flags[independent_row].quality() {
                QualityFlags::NoQualityControl | QualityFlags::Good => None,
                worse => Some(worse),
            },
            None => flag_when_missing,
        };
    }
    out
}

/// BAD on dependent rows whose matched independent value is out of `range`.
///
/// Every other row is left alone, including unmatched rows and rows whose
/// independent value is NaN.
pub fn dependent_secondary_flags(
    alignment: &DependentAlignment,
    results: &[f64],
    range: RangeBounds,
) -> Vec<Option<QualityFlags>> {
    let mut out = vec![None; results.len()];
    for &(row, matched) in &alignment.matches {
        let outside =
            matched.and_then(|independent_row| range.is_outside(results[independent_row]));
        if outside == Some(true) {
            out[row] = Some(QualityFlags::Bad);
        }
    }
    out
}
