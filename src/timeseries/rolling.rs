//! Centered, time-keyed rolling windows.
//!
//! A row `j` belongs to the window of row `i` when `|t_j - t_i| <= width / 2`,
//! both ends inclusive, and both rows share the partition keys.

use polars::prelude::*;

const WINDOW_ORDER: &str = "window_order";

/// Aggregate `aggs` over each row's centered window.
///
/// `time` must be an integer microsecond column. The result keeps every input
/// row and column in input order, with one extra column per aggregation. Rows
/// sharing a time (and partition) share a window, so they get identical
/// aggregates. Nulls are skipped by the aggregations; NaN is not, so callers
/// null out NaN values first.
pub fn centered_rolling(
    frame: LazyFrame,
    time: &str,
    by: &[&str],
    width_micros: i64,
    aggs: &[Expr],
) -> LazyFrame {
    let half = (width_micros / 2).max(1);
    let options = RollingGroupOptions {
        index_column: time.into(),
        period: Duration::new(2 * half),
        offset: Duration::new(-half),
        closed_window: ClosedWindow::Both,
    };

    let keys: Vec<&str> = by.iter().copied().chain([time]).collect();
    let key_exprs: Vec<Expr> = keys.iter().map(|name| col(*name)).collect();
    let partitions: Vec<Expr> = by.iter().map(|name| col(*name)).collect();

    let windows = frame
        .clone()
        .sort(keys.clone(), super::stable())
        .rolling(col(time), partitions, options)
        .agg(aggs)
        .unique_stable(
            Some(keys.iter().map(|name| (*name).into()).collect()),
            UniqueKeepStrategy::First,
        );

    frame
        .with_row_index(WINDOW_ORDER, None)
        .join(
            windows,
            key_exprs.clone(),
            key_exprs,
            JoinArgs::new(JoinType::Left),
        )
        .sort([WINDOW_ORDER], SortMultipleOptions::default())
        .drop([WINDOW_ORDER])
}

/// Seconds between the first and last row of a window, as an aggregation
/// over the window's time column
pub fn window_span_seconds(time: &str) -> Expr {
    super::seconds(col(time).max() - col(time).min())
}
