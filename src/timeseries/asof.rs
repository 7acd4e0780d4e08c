//! Backward asof join between two independently sampled streams.

use super::stable;
use polars::prelude::*;

/// Join each `left` row to the latest `right` row at or before it on `on`.
///
/// A match further back than `tolerance_micros` is left null; it is never
/// replaced by an older row. When several right rows share the matched time
/// the last of them in `right` order is taken. Both frames are sorted on `on`
/// here, stably, so callers control tie order through their input order. The
/// result is in left time order and `on` is taken from the left frame.
pub fn asof_backward(
    left: LazyFrame,
    right: LazyFrame,
    on: &str,
    tolerance_micros: i64,
) -> LazyFrame {
    let options = AsOfOptions {
        strategy: AsofStrategy::Backward,
        tolerance: Some(AnyValue::Int64(tolerance_micros)),
        allow_eq: true,
        check_sortedness: true,
        ..Default::default()
    };

    left.sort([on], stable())
        .join_builder()
        .with(right.sort([on], stable()))
        .left_on([col(on)])
        .right_on([col(on)])
        .how(JoinType::AsOf(options))
        .finish()
}
