//! Expansion of the configured step list into executable steps.

use crate::config::{CheckKind, FlagMapping, QcConfig, RangeBounds, TimeSpan};
use crate::flags::QualityFlags;

/// The test an executable step runs
#[derive(Debug, Clone, PartialEq)]
pub enum PlannedCheck {
    Config(CheckKind),
    DependentBase {
        independent: u64,
        dependent: u64,
        tolerance: TimeSpan,
        flag_when_missing: Option<QualityFlags>,
    },
    DependentSecondary {
        independent: u64,
        dependent: u64,
        tolerance: TimeSpan,
        range: RangeBounds,
    },
}

/// One step of the run, in execution order
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedStep {
    pub label: String,
    /// Label of the configured step this one was expanded from
    pub group: String,
    pub check: PlannedCheck,
    pub flags: FlagMapping,
    /// Groups whose fired rows are removed from this step's domain
    pub exclude: Vec<String>,
    pub location_class: bool,
}

/// Expand `config.steps` in order.
///
/// A dependent-quantity step becomes one base check per configured pair,
/// each followed by a secondary range check when the pair carries a range.
pub fn build_plan(config: &QcConfig) -> Vec<PlannedStep> {
    let mut plan = Vec::new();
    for step in &config.steps {
        let planned = |label: String, check: PlannedCheck| PlannedStep {
            label,
            group: step.label.clone(),
            check,
            flags: step.flags,
            exclude: step.exclude.clone(),
            location_class: step.check.is_location_class(),
        };

        if step.check != CheckKind::DependentQuantity {
            plan.push(planned(step.label.clone(), PlannedCheck::Config(step.check)));
            continue;
        }

        for entry in &config.dependent {
            for (independent, dependent) in entry.pairs() {
                plan.push(planned(
                    format!("{}_base_{}_{}", step.label, independent, dependent),
                    PlannedCheck::DependentBase {
                        independent,
                        dependent,
                        tolerance: entry.dt_tolerance,
                        flag_when_missing: entry.flag_when_missing,
                    },
                ));
                if let Some(range) = entry.qc.range {
                    plan.push(planned(
                        format!("{}_secondary_{}_{}", step.label, independent, dependent),
                        PlannedCheck::DependentSecondary {
                            independent,
                            dependent,
                            tolerance: entry.dt_tolerance,
                            range,
                        },
                    ));
                }
            }
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DependentQuantityConfig;

    #[test]
    fn test_default_plan_matches_steps() {
        let plan = build_plan(&QcConfig::default());
        // no dependent pairs configured: the dependent step expands to nothing
        assert_eq!(plan.len(), 9);
        assert!(plan[..4].iter().all(|step| step.location_class));
        assert!(plan[4..].iter().all(|step| !step.location_class));
        assert_eq!(plan[4].exclude, vec!["spatial_outlier".to_string()]);
    }

    #[test]
    fn test_dependent_pairs_expand_in_order() {
        let config = QcConfig::default()
            .with_dependent(DependentQuantityConfig {
                dependent: vec![2, 3],
                ..DependentQuantityConfig::new(1, 2).with_range(0.0, 10.0)
            })
            .with_dependent(DependentQuantityConfig::new(4, 5));

        let labels: Vec<String> = build_plan(&config)
            .into_iter()
            .filter(|step| step.group == "dependent")
            .map(|step| step.label)
            .collect();
        assert_eq!(
            labels,
            [
                "dependent_base_1_2",
                "dependent_secondary_1_2",
                "dependent_base_1_3",
                "dependent_secondary_1_3",
                "dependent_base_4_5",
            ]
        );
    }
}
