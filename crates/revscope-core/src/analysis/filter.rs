//! Timestamp parsing and date-range filtering of revision streams.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use pyo3::prelude::*;
use tracing::warn;

use crate::errors::{RevscopeError, RevscopeResult};
use crate::models::{Revision, TimedRevision};

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a source timestamp into a UTC instant.
///
/// Offsets are honoured; naive datetimes and bare dates are taken as UTC.
pub fn parse_instant(raw: &str) -> RevscopeResult<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| RevscopeError::InvalidInput(format!("unparseable timestamp: {raw:?}")))
}

/// Normalize a timestamp to RFC 3339 UTC, as the core sees it.
#[pyfunction]
pub fn parse_timestamp(raw: &str) -> PyResult<String> {
    Ok(parse_instant(raw)?.to_rfc3339())
}

/// Inclusive `[start, end]` bounds; either side may be open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Parse optional bound strings. A bound that fails to parse is an error
    /// for the whole call rather than a per-revision skip.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> RevscopeResult<Self> {
        let start = start.map(parse_instant).transpose()?;
        let end = end.map(parse_instant).transpose()?;
        Ok(Self { start, end })
    }

    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| *at >= start) && self.end.map_or(true, |end| *at <= end)
    }
}

/// Keep the revisions inside `range`, annotated with their parsed instants.
///
/// Order is preserved. Revisions with unparseable timestamps are logged and
/// dropped.
pub fn filter_by_date_range<'a>(
    revisions: &'a [Revision],
    range: &DateRange,
) -> Vec<TimedRevision<'a>> {
    revisions
        .iter()
        .filter_map(|revision| match parse_instant(&revision.timestamp) {
            Ok(at) => Some(TimedRevision::new(revision, at)),
            Err(e) => {
                warn!("Skipping revision {}: {e}", revision.id);
                None
            }
        })
        .filter(|timed| range.contains(&timed.at))
        .collect()
}
