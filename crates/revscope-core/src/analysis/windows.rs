//! Calendar-window aggregation of timestamped revisions.

use chrono::{DateTime, Datelike, Duration, Utc};
use indexmap::IndexMap;
use pyo3::prelude::*;

use crate::analysis::filter::parse_instant;
use crate::models::{TimeWindow, TimedRevision, WindowSize};

/// Canonical bucket label for an instant.
///
/// Week labels carry a `-week` suffix so they never collide with a day label
/// for the same Monday.
pub fn bucket_label(at: &DateTime<Utc>, window: WindowSize) -> String {
    match window {
        WindowSize::Day => at.format("%Y-%m-%d").to_string(),
        WindowSize::Week => {
            let date = at.date_naive();
            let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
            format!("{}-week", monday.format("%Y-%m-%d"))
        }
        WindowSize::Month => at.format("%Y-%m").to_string(),
    }
}

/// Label a raw timestamp the way the aggregator would.
#[pyfunction]
#[pyo3(signature = (timestamp, window_size="day"))]
pub fn window_label(timestamp: &str, window_size: &str) -> PyResult<String> {
    let at = parse_instant(timestamp)?;
    Ok(bucket_label(&at, WindowSize::parse_lenient(window_size)))
}

/// Group revisions into windows keyed by label.
///
/// Windows appear in first-seen order and only exist once a revision lands in
/// them.
pub fn aggregate_windows<'a>(
    revisions: &[TimedRevision<'a>],
    window: WindowSize,
) -> IndexMap<String, TimeWindow<'a>> {
    let mut windows: IndexMap<String, TimeWindow<'a>> = IndexMap::new();
    for timed in revisions {
        let label = bucket_label(&timed.at, window);
        windows
            .entry(label)
            .or_insert_with_key(|label| TimeWindow::new(label.clone()))
            .push(*timed);
    }
    windows
}
