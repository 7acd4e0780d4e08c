use super::secs;
use crate::constants::columns::TIME_MICROS;
use crate::timeseries::asof_backward;
use polars::prelude::*;

fn stream(times: &[i64], id: &str) -> LazyFrame {
    let ids: Vec<u32> = (0..times.len() as u32).collect();
    df!(TIME_MICROS => times, id => ids).unwrap().lazy()
}

/// Matched right row for each left row, in left row order
fn matched(left: &[i64], right: &[i64], tolerance_micros: i64) -> Vec<Option<u32>> {
    let joined = asof_backward(stream(left, "left"), stream(right, "right"), TIME_MICROS, tolerance_micros)
        .sort(["left"], SortMultipleOptions::default())
        .collect()
        .unwrap();
    joined.column("right").unwrap().u32().unwrap().into_iter().collect()
}

#[test]
fn test_exact_and_preceding_matches() {
    let right = secs(&[0, 10, 20]);
    let left = vec![0, 5_000_000, 10_000_000, 25_000_000];

    assert_eq!(
        matched(&left, &right, 10_000_000),
        vec![Some(0), Some(0), Some(1), Some(2)]
    );
}

#[test]
fn test_never_looks_forward() {
    assert_eq!(matched(&secs(&[9]), &secs(&[10]), 60_000_000), vec![None]);
}

#[test]
fn test_tolerance_is_inclusive_and_not_extended() {
    let right = secs(&[0, 10]);
    let left = vec![500_000, 10_600_000, 10_000_000];

    // 0.5 s gap matches, 0.6 s gap does not fall back to an older row
    assert_eq!(matched(&left, &right, 500_000), vec![Some(0), None, Some(1)]);
}

#[test]
fn test_ties_take_last_equal_row() {
    let right = secs(&[0, 5, 5, 5]);
    assert_eq!(matched(&secs(&[5]), &right, 0), vec![Some(3)]);
}

#[test]
fn test_unsorted_left_rows() {
    let right = secs(&[0, 10]);
    let left = secs(&[10, 0, 5]);
    assert_eq!(
        matched(&left, &right, 5_000_000),
        vec![Some(1), Some(0), Some(0)]
    );
}

#[test]
fn test_empty_right_stream() {
    assert_eq!(matched(&secs(&[1, 2]), &[], 1_000_000), vec![None, None]);
}
