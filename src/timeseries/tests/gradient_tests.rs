use super::{assert_close, secs};
use crate::constants::columns::{DATASTREAM_ID, RESULT, TIME_MICROS};
use crate::timeseries::gradient::GRADIENT;
use crate::timeseries::{float_values, gradient, gradient_per_stream};
use polars::prelude::*;

fn derivative(values: &[f64], micros: &[i64]) -> Vec<f64> {
    let frame = df!("value" => values, TIME_MICROS => micros).unwrap().lazy();
    let out = gradient(frame, "value", TIME_MICROS, &[]).collect().unwrap();
    float_values(&out, GRADIENT).unwrap()
}

#[test]
fn test_linear_series_has_constant_gradient() {
    let values: Vec<f64> = (0..8).map(f64::from).collect();
    let micros: Vec<i64> = (0..8).map(|i| i * 2_500_000).collect();

    for value in derivative(&values, &micros) {
        assert_close(value, 1.0 / 2.5, 1e-12);
    }
}

#[test]
fn test_uneven_spacing_is_second_order() {
    // f(t) = t^2, exact interior derivative 2t
    let seconds = [0.0, 1.0, 3.0, 3.5, 6.0];
    let values: Vec<f64> = seconds.iter().map(|t| t * t).collect();
    let micros: Vec<i64> = seconds.iter().map(|t| (t * 1e6) as i64).collect();

    let result = derivative(&values, &micros);
    assert_close(result[1], 2.0, 1e-12);
    assert_close(result[2], 6.0, 1e-12);
    assert_close(result[3], 7.0, 1e-12);
    // one-sided differences at the edges
    assert_close(result[0], 1.0, 1e-12);
    assert_close(result[4], (36.0 - 12.25) / 2.5, 1e-12);
}

#[test]
fn test_single_row_has_no_gradient() {
    assert!(derivative(&[1.0], &[0])[0].is_nan());
}

#[test]
fn test_zero_spacing_yields_nan() {
    let result = derivative(&[1.0, 2.0], &[0, 0]);
    assert!(result.iter().all(|v| v.is_nan()));
}

#[test]
fn test_unsorted_rows_keep_their_order() {
    // f(t) = 3t sampled out of order
    let result = derivative(&[6.0, 0.0, 3.0], &secs(&[2, 0, 1]));
    for value in result {
        assert_close(value, 3.0, 1e-12);
    }
}

#[test]
fn test_per_stream_ignores_other_streams() {
    // two interleaved streams, rows out of time order
    let frame = df!(
        DATASTREAM_ID => [1u64, 2, 1, 2, 1, 3],
        TIME_MICROS => secs(&[2, 0, 0, 1, 1, 0]),
        RESULT => [4.0, 100.0, 0.0, 90.0, 2.0, 7.0],
    )
    .unwrap();

    let result = gradient_per_stream(frame.lazy()).unwrap();
    assert_close(result[0], 2.0, 1e-12);
    assert_close(result[2], 2.0, 1e-12);
    assert_close(result[4], 2.0, 1e-12);
    assert_close(result[1], -10.0, 1e-12);
    assert_close(result[3], -10.0, 1e-12);
    // single-row stream
    assert!(result[5].is_nan());
}
