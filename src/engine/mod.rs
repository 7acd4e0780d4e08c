//! The flag-combination driver.
//!
//! Runs the planned steps strictly in order over one table. Each step sees
//! the table minus the rows fired by the groups it excludes, maps its
//! verdicts to flags and folds them into a working copy of the flag column.
//! The copy is committed to the table only once every step has succeeded.

pub mod plan;

pub use plan::{PlannedCheck, PlannedStep, build_plan};

use crate::config::{CheckKind, QcConfig};
use crate::error::{QcError, Result};
use crate::flags::{Flag, FlagHistory, QualityFlags};
use crate::models::{FeatureFlagUpdate, QcReport, RunState, StepReport};
use crate::qc::dependent::{DependentAlignment, dependent_base_flags, dependent_secondary_flags};
use crate::qc::motion::{MotionQuantity, motion_check};
use crate::qc::range::{gradient_check, range_check};
use crate::qc::region::{depth_above_threshold_check, region_mainland_check, region_null_check};
use crate::qc::spatial::spatial_outlier_check;
use crate::qc::zscore::zscore_check;
use crate::qc::{CheckOutput, Verdict};
use crate::table::ObservationTable;
use indicatif::ProgressBar;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Sequential QC driver bound to one configuration
#[derive(Debug)]
pub struct QcEngine {
    config: QcConfig,
    plan: Vec<PlannedStep>,
    state: RunState,
}

impl QcEngine {
    /// Validate `config` and expand its steps
    pub fn new(config: QcConfig) -> Result<Self> {
        config.validate()?;
        let plan = build_plan(&config);
        debug!(
            "Planned {} QC steps from {} configured",
            plan.len(),
            config.steps.len()
        );
        Ok(Self {
            config,
            plan,
            state: RunState::Pending,
        })
    }

    pub fn config(&self) -> &QcConfig {
        &self.config
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn plan(&self) -> &[PlannedStep] {
        &self.plan
    }

    /// Set every row to `NoQualityControl` before a fresh run
    pub fn reset_flags(table: &mut ObservationTable) -> Result<()> {
        let flags = vec![Flag::Value(QualityFlags::NoQualityControl); table.height()];
        table.set_flags(&flags)
    }

    pub fn run(&mut self, table: &mut ObservationTable) -> Result<QcReport> {
        self.run_with_progress(table, None)
    }

    /// Run every planned step, advancing `progress` once per step
    pub fn run_with_progress(
        &mut self,
        table: &mut ObservationTable,
        progress: Option<&ProgressBar>,
    ) -> Result<QcReport> {
        let start = Instant::now();
        let n = table.height();

        if table.is_empty() {
            warn!("Empty observation table; nothing to check");
            self.state = RunState::Done;
            return Ok(QcReport {
                elapsed: start.elapsed(),
                ..QcReport::default()
            });
        }

        let ids = table.ids()?;
        let mut working = table.flags()?;
        let mut history = FlagHistory::new();
        let mut fired_by_group: HashMap<String, Vec<bool>> = HashMap::new();
        let mut steps = Vec::with_capacity(self.plan.len());
        let mut feature_flags = Vec::new();
        let last_location_step = self.plan.iter().rposition(|step| step.location_class);

        for (index, step) in self.plan.iter().enumerate() {
            self.state = RunState::Running {
                step: step.label.clone(),
            };
            if let Some(pb) = progress {
                pb.set_message(step.label.clone());
            }
            let step_start = Instant::now();

            let mask = domain_mask(n, &step.exclude, &fired_by_group);
            let rows: Vec<usize> = (0..n).filter(|&row| mask[row]).collect();
            let subset = if rows.len() == n {
                table.clone()
            } else {
                table.filter(&mask)?
            };
            let subset_flags: Vec<Flag> = rows.iter().map(|&row| working[row]).collect();

            let evaluated = self.evaluate(step, &subset, &subset_flags);
            let output = accept_output(&mut self.state, step, evaluated, rows.len())?;

            let (assigned, fired, undetermined) = resolve(&output, step);
            let group_fired = fired_by_group
                .entry(step.group.clone())
                .or_insert_with(|| vec![false; n]);

            for (k, &row) in rows.iter().enumerate() {
                if let Some(flag) = assigned[k] {
                    let kept = working[row].quality();
                    if !kept.is_numeric() && !flag.is_numeric() && kept != flag {
                        warn!(
                            "Observation {}: keeping {} over conflicting {} from {}",
                            ids[row],
                            kept.code(),
                            flag.code(),
                            step.label
                        );
                    }
                    working[row] = working[row].merge(Flag::Value(flag));
                }
                if let Some(flag) = fired[k] {
                    group_fired[row] = true;
                    if self.config.flag_history {
                        history.record(ids[row], flag, &step.label);
                    }
                }
            }

            let fired_count = fired.iter().filter(|f| f.is_some()).count();
            info!("Execution {} qc result: {} True", step.label, fired_count);
            steps.push(StepReport {
                label: step.label.clone(),
                evaluated: rows.len(),
                fired: fired_count,
                undetermined,
                elapsed: step_start.elapsed(),
            });

            if Some(index) == last_location_step {
                feature_flags = feature_flag_snapshot(&table.feature_ids()?, &working);
                debug!("Snapshot of {} feature flags", feature_flags.len());
            }
            if let Some(pb) = progress {
                pb.inc(1);
            }
        }

        table.set_flags(&working)?;
        self.state = RunState::Done;

        let spatial_groups: BTreeSet<&str> = self
            .plan
            .iter()
            .filter(|step| step.check == PlannedCheck::Config(CheckKind::SpatialOutlier))
            .map(|step| step.group.as_str())
            .collect();
        let spatial_fired = |row: usize| {
            spatial_groups
                .iter()
                .any(|group| fired_by_group.get(*group).is_some_and(|fired| fired[row]))
        };
        let observation_types = table.observation_types()?;
        let flagged_observation_types: Vec<String> = (0..n)
            .filter(|&row| working[row].quality().is_at_least(QualityFlags::ProbablyBad))
            .filter(|&row| !spatial_fired(row))
            .map(|row| observation_types[row].clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let report = QcReport {
            rows: n,
            steps,
            flag_counts: flag_counts(&working),
            feature_flags,
            flagged_observation_types,
            history: self.config.flag_history.then_some(history),
            elapsed: start.elapsed(),
        };
        info!(
            "QC finished: {} rows, {} steps, {} rows fired in total",
            report.rows,
            report.steps.len(),
            report.total_fired()
        );
        Ok(report)
    }

    fn evaluate(
        &self,
        step: &PlannedStep,
        table: &ObservationTable,
        flags: &[Flag],
    ) -> Result<CheckOutput> {
        let location = &self.config.location;
        let verdicts = match &step.check {
            PlannedCheck::Config(kind) => match kind {
                CheckKind::RegionNull => region_null_check(table)?,
                CheckKind::RegionMainland => region_mainland_check(table)?,
                CheckKind::DepthAboveThreshold => {
                    depth_above_threshold_check(table, self.config.depth_threshold)?
                }
                CheckKind::SpatialOutlier => spatial_outlier_check(table, location)?,
                CheckKind::Velocity => {
                    motion_check(table, MotionQuantity::Velocity, location.max_dx_dt)?
                }
                CheckKind::Acceleration => {
                    motion_check(table, MotionQuantity::Acceleration, location.max_ddx_dtdt)?
                }
                CheckKind::Range => range_check(table, &self.config)?,
                CheckKind::Gradient => gradient_check(table, &self.config)?,
                CheckKind::Zscore => zscore_check(table, &self.config)?,
                CheckKind::DependentQuantity => {
                    return Err(QcError::configuration(
                        "dependent quantity steps must be expanded before evaluation",
                    ));
                }
            },
            PlannedCheck::DependentBase {
                independent,
                dependent,
                tolerance,
                flag_when_missing,
            } => {
                let alignment =
                    DependentAlignment::from_table(table, *independent, *dependent, *tolerance)?;
                return Ok(CheckOutput::Flags(dependent_base_flags(
                    &alignment,
                    flags,
                    *flag_when_missing,
                )));
            }
            PlannedCheck::DependentSecondary {
                independent,
                dependent,
                tolerance,
                range,
            } => {
                let alignment =
                    DependentAlignment::from_table(table, *independent, *dependent, *tolerance)?;
                return Ok(CheckOutput::Flags(dependent_secondary_flags(
                    &alignment,
                    &table.results()?,
                    *range,
                )));
            }
        };
        Ok(CheckOutput::Verdicts(verdicts))
    }
}

/// Pass on a step's output when it covers every row of the step's domain.
/// Otherwise the run fails at this step.
fn accept_output(
    state: &mut RunState,
    step: &PlannedStep,
    evaluated: Result<CheckOutput>,
    expected: usize,
) -> Result<CheckOutput> {
    let error = match evaluated {
        Ok(output) if output.len() == expected => return Ok(output),
        Ok(output) => QcError::RowCountMismatch {
            stage: step.label.clone(),
            expected,
            found: output.len(),
        },
        Err(error @ QcError::RowCountMismatch { .. }) => error,
        Err(other) => QcError::step_failed(&step.label, other),
    };
    *state = RunState::Failed {
        step: step.label.clone(),
    };
    Err(error)
}

/// Rows not fired by any excluded group
fn domain_mask(n: usize, exclude: &[String], fired_by_group: &HashMap<String, Vec<bool>>) -> Vec<bool> {
    let mut mask = vec![true; n];
    for group in exclude {
        if let Some(fired) = fired_by_group.get(group) {
            for (keep, &fired) in mask.iter_mut().zip(fired) {
                *keep &= !fired;
            }
        }
    }
    mask
}

/// Flags to merge, the flag recorded for fired rows, and the undetermined count
fn resolve(
    output: &CheckOutput,
    step: &PlannedStep,
) -> (Vec<Option<QualityFlags>>, Vec<Option<QualityFlags>>, usize) {
    match output {
        CheckOutput::Verdicts(verdicts) => {
            let assigned = verdicts.iter().map(|v| v.map(&step.flags)).collect();
            let fired = verdicts
                .iter()
                .map(|v| v.is_fail().then_some(step.flags.on_true))
                .collect();
            let undetermined = verdicts
                .iter()
                .filter(|v| **v == Verdict::Undetermined)
                .count();
            (assigned, fired, undetermined)
        }
        CheckOutput::Flags(flags) => (flags.clone(), flags.clone(), 0),
    }
}

/// Worst flag per feature of interest, in feature order
fn feature_flag_snapshot(features: &[Option<u64>], flags: &[Flag]) -> Vec<FeatureFlagUpdate> {
    let mut by_feature: BTreeMap<u64, QualityFlags> = BTreeMap::new();
    for (feature, flag) in features.iter().zip(flags) {
        if let Some(feature_id) = feature {
            let entry = by_feature
                .entry(*feature_id)
                .or_insert(QualityFlags::NoQualityControl);
            *entry = entry.merge(flag.quality());
        }
    }
    by_feature
        .into_iter()
        .map(|(feature_id, qc_flag)| FeatureFlagUpdate {
            feature_id,
            qc_flag,
        })
        .collect()
}

fn flag_counts(flags: &[Flag]) -> Vec<(QualityFlags, usize)> {
    QualityFlags::all_values()
        .into_iter()
        .map(|value| {
            let count = flags.iter().filter(|flag| flag.quality() == value).count();
            (value, count)
        })
        .filter(|(_, count)| *count > 0)
        .collect()
}

#[cfg(test)]
pub mod tests;
