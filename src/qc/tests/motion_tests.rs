use super::{rows_with, t0};
use crate::models::Observation;
use crate::qc::Verdict;
use crate::qc::motion::{MotionQuantity, motion_check, motion_per_row};
use crate::table::ObservationTable;
use chrono::Duration;

/// Eastward track at roughly 1 m/s, one fix every 10 s, with a second
/// datastream sampled at the same fixes
fn shared_track() -> Vec<Observation> {
    let mut observations = Vec::new();
    for datastream in [1u64, 2] {
        for i in 0..11u64 {
            observations.push(
                Observation::new(
                    datastream * 100 + i,
                    datastream,
                    t0() + Duration::seconds(i as i64 * 10),
                    0.0,
                    "temperature",
                )
                .with_position(3.0 + i as f64 * 1.43e-4, 51.0)
                .with_feature(i),
            );
        }
    }
    observations
}

#[test]
fn test_velocity_within_limit() {
    let table = ObservationTable::from_observations(&shared_track()).unwrap();
    let verdicts = motion_check(&table, MotionQuantity::Velocity, 5.0).unwrap();

    assert_eq!(rows_with(&verdicts, Verdict::Pass).len(), 20);
    // last fix of each datastream has no following fix
    assert_eq!(rows_with(&verdicts, Verdict::Undetermined), vec![10, 21]);
}

#[test]
fn test_velocity_over_limit() {
    let table = ObservationTable::from_observations(&shared_track()).unwrap();
    let verdicts = motion_check(&table, MotionQuantity::Velocity, 0.5).unwrap();
    assert_eq!(rows_with(&verdicts, Verdict::Fail).len(), 20);
}

#[test]
fn test_shared_fixes_get_identical_values() {
    let table = ObservationTable::from_observations(&shared_track()).unwrap();
    let velocity = motion_per_row(&table, MotionQuantity::Velocity).unwrap();

    for i in 0..10 {
        let first = velocity[i].unwrap();
        assert!((first - 1.0).abs() < 0.01, "velocity {first}");
        assert_eq!(velocity[i], velocity[11 + i]);
    }
}

#[test]
fn test_acceleration_of_steady_track() {
    let table = ObservationTable::from_observations(&shared_track()).unwrap();
    let verdicts = motion_check(&table, MotionQuantity::Acceleration, 0.5).unwrap();

    assert!(rows_with(&verdicts, Verdict::Fail).is_empty());
    assert_eq!(rows_with(&verdicts, Verdict::Undetermined), vec![9, 10, 20, 21]);
}

#[test]
fn test_rows_without_position_are_outside() {
    let mut observations = shared_track();
    observations.push(Observation::new(999, 3, t0(), 35.0, "salinity"));
    let table = ObservationTable::from_observations(&observations).unwrap();

    let verdicts = motion_check(&table, MotionQuantity::Velocity, 5.0).unwrap();
    assert_eq!(verdicts[22], Verdict::Outside);
}
