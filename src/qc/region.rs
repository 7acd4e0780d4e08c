//! Region and depth tests.
//!
//! The region lookup and the bathymetry grid are external; their answers
//! arrive as the optional `region` and `elevation` columns.

use super::Verdict;
use crate::constants::MAINLAND_REGION_MARKER;
use crate::error::Result;
use crate::table::ObservationTable;
use tracing::warn;

/// Fires where the position lies outside every known region
pub fn region_null_check(table: &ObservationTable) -> Result<Vec<Verdict>> {
    let Some(regions) = table.regions()? else {
        warn!("No region column; region lookup results unavailable");
        return Ok(vec![Verdict::Undetermined; table.height()]);
    };
    Ok(regions
        .iter()
        .map(|region| Verdict::from_predicate(Some(region.is_none())))
        .collect())
}

/// Fires where the region lookup places the position on land
pub fn region_mainland_check(table: &ObservationTable) -> Result<Vec<Verdict>> {
    let Some(regions) = table.regions()? else {
        return Ok(vec![Verdict::Undetermined; table.height()]);
    };
    Ok(regions
        .iter()
        .map(|region| {
            let on_land = region
                .as_deref()
                .is_some_and(|name| name.to_lowercase().contains(MAINLAND_REGION_MARKER));
            Verdict::from_predicate(Some(on_land))
        })
        .collect())
}

/// Fires where an unregioned position has elevation at or above `threshold`.
///
/// Rows inside a known region are not evaluated. Without a region column
/// every row counts as unregioned. Missing elevation cannot be evaluated.
pub fn depth_above_threshold_check(
    table: &ObservationTable,
    threshold: f64,
) -> Result<Vec<Verdict>> {
    let regions = table.regions()?;
    let Some(elevations) = table.elevations()? else {
        return Ok(vec![Verdict::Undetermined; table.height()]);
    };

    Ok(elevations
        .iter()
        .enumerate()
        .map(|(row, elevation)| {
            let in_region = regions
                .as_ref()
                .is_some_and(|regions| regions[row].is_some());
            if in_region {
                return Verdict::Outside;
            }
            match elevation {
                Some(value) if !value.is_nan() => Verdict::from_predicate(Some(*value >= threshold)),
                _ => Verdict::Undetermined,
            }
        })
        .collect())
}
