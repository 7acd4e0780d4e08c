//! Unit tests for the time-series queries

pub mod asof_tests;
pub mod gradient_tests;

/// Whole seconds to microseconds
pub fn secs(values: &[i64]) -> Vec<i64> {
    values.iter().map(|s| s * 1_000_000).collect()
}

pub fn assert_close(actual: f64, expected: f64, relative: f64) {
    let scale = expected.abs().max(1e-12);
    assert!(
        ((actual - expected) / scale).abs() <= relative,
        "expected {expected}, got {actual}"
    );
}
