//! Value range and gradient range tests.

use super::{Verdict, bounded_verdicts};
use crate::config::{ObservationTypeQc, QcConfig, RangeBounds};
use crate::error::Result;
use crate::table::ObservationTable;
use crate::timeseries::gradient_per_stream;
use tracing::debug;

/// Look up the bounds selected by `pick` for each row's observation type
pub(crate) fn bounds_per_row(
    table: &ObservationTable,
    config: &QcConfig,
    pick: fn(&ObservationTypeQc) -> Option<RangeBounds>,
) -> Result<Vec<Option<RangeBounds>>> {
    Ok(table
        .observation_types()?
        .iter()
        .map(|name| config.observation_type(name).and_then(pick))
        .collect())
}

/// `result < min || result > max` for rows whose observation type has a range.
/// Rows without a configured range are outside the test's domain.
pub fn range_check(table: &ObservationTable, config: &QcConfig) -> Result<Vec<Verdict>> {
    let bounds = bounds_per_row(table, config, |qc| qc.range)?;
    let results = table.results()?;
    Ok(bounded_verdicts(&results, bounds.into_iter()))
}

/// Range check on d(result)/dt, computed per datastream in time order
pub fn gradient_check(table: &ObservationTable, config: &QcConfig) -> Result<Vec<Verdict>> {
    let bounds = bounds_per_row(table, config, |qc| qc.gradient)?;
    if bounds.iter().all(Option::is_none) {
        return Ok(vec![Verdict::Outside; table.height()]);
    }

    let gradients = gradient_per_stream(table.indexed_frame())?;
    debug!(
        "Computed gradients for {} rows ({} undefined)",
        gradients.len(),
        gradients.iter().filter(|g| g.is_nan()).count()
    );
    Ok(bounded_verdicts(&gradients, bounds.into_iter()))
}
