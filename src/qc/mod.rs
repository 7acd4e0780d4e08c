//! The QC test battery.
//!
//! Every test maps an observation table (already restricted to the test's
//! domain by the caller) to one outcome per row. Tests never mutate the table
//! and never decide flags themselves, except the dependent checks which
//! propagate flags between datastreams or assign a fixed BAD.

pub mod dependent;
pub mod motion;
pub mod range;
pub mod region;
pub mod spatial;
pub mod zscore;

use crate::config::FlagMapping;
use crate::flags::QualityFlags;

/// Per-row outcome of a test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Not part of the test's domain; the row keeps its flag
    Outside,
    /// Predicate false: the observation passed
    Pass,
    /// Predicate true: the observation is suspect
    Fail,
    /// The predicate could not be evaluated (missing reference data, NaN)
    Undetermined,
}

impl Verdict {
    pub fn from_predicate(predicate: Option<bool>) -> Self {
        match predicate {
            Some(true) => Verdict::Fail,
            Some(false) => Verdict::Pass,
            None => Verdict::Undetermined,
        }
    }

    pub fn is_fail(self) -> bool {
        self == Verdict::Fail
    }

    /// Flag assigned by `mapping`; `None` leaves the row untouched.
    /// A pass with no `on_false` flag takes the `on_nan` fill.
    pub fn map(self, mapping: &FlagMapping) -> Option<QualityFlags> {
        match self {
            Verdict::Outside => None,
            Verdict::Pass => mapping.on_false.or(mapping.on_nan),
            Verdict::Fail => Some(mapping.on_true),
            Verdict::Undetermined => mapping.on_nan,
        }
    }
}

/// What a test hands back to the driver
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutput {
    Verdicts(Vec<Verdict>),
    /// Flags decided by the test itself; `None` leaves the row untouched
    Flags(Vec<Option<QualityFlags>>),
}

impl CheckOutput {
    pub fn len(&self) -> usize {
        match self {
            CheckOutput::Verdicts(verdicts) => verdicts.len(),
            CheckOutput::Flags(flags) => flags.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Range-check a derived quantity row by row, honouring per-row bounds
pub(crate) fn bounded_verdicts(
    values: &[f64],
    bounds: impl Iterator<Item = Option<crate::config::RangeBounds>>,
) -> Vec<Verdict> {
    values
        .iter()
        .zip(bounds)
        .map(|(&value, bounds)| match bounds {
            Some(bounds) => Verdict::from_predicate(bounds.is_outside(value)),
            None => Verdict::Outside,
        })
        .collect()
}

#[cfg(test)]
pub mod tests;
