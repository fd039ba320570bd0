//! Shared typed models used across the source, analysis, and query layers.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use pyo3::prelude::*;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Placeholder used when a revision carries no author.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Window sizes accepted by the aggregator, in the order they are advertised.
pub const WINDOW_SIZES: [&str; 3] = ["day", "week", "month"];

/// Round to a fixed number of decimal places for reporting.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn round2<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_to(*value, 2))
}

fn round3<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_to(*value, 3))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// 1. Revision
// ---------------------------------------------------------------------------

/// One edit event as supplied by the revision source.
///
/// Field names follow the typed model; the source's own names (`revid`,
/// `user`, `sizediff`) are accepted on input. Fields the model does not know
/// about are kept in `extra` and echoed back in reports.
///
/// The id is opaque and echoed as given; a record without one is still
/// analyzed. Only the timestamp is required.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    #[serde(default, alias = "revid")]
    pub id: serde_json::Value,
    pub timestamp: String,
    #[serde(default, alias = "user")]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub size: i64,
    #[serde(default, alias = "sizediff")]
    pub size_delta: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub comment: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Revision {
    pub fn new(
        id: impl Into<serde_json::Value>,
        timestamp: impl Into<String>,
        author: Option<&str>,
        size: i64,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp: timestamp.into(),
            author: author.map(str::to_string),
            size,
            size_delta: None,
            comment: String::new(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn with_size_delta(mut self, size_delta: Option<i64>) -> Self {
        self.size_delta = size_delta;
        self
    }

    /// Author identity used for distinct-author counting.
    pub fn author_key(&self) -> &str {
        self.author.as_deref().unwrap_or(UNKNOWN_AUTHOR)
    }
}

// ---------------------------------------------------------------------------
// 2. TimedRevision
// ---------------------------------------------------------------------------

/// A revision annotated with its parsed UTC instant.
///
/// The underlying record is borrowed, never mutated.
#[derive(Clone, Copy, Debug)]
pub struct TimedRevision<'a> {
    pub revision: &'a Revision,
    pub at: DateTime<Utc>,
}

impl<'a> TimedRevision<'a> {
    pub fn new(revision: &'a Revision, at: DateTime<Utc>) -> Self {
        Self { revision, at }
    }

    /// Absolute distance to another revision in seconds.
    pub fn seconds_apart(&self, other: &TimedRevision<'_>) -> f64 {
        (other.at - self.at).num_milliseconds().abs() as f64 / 1000.0
    }
}

// ---------------------------------------------------------------------------
// 3. WindowSize
// ---------------------------------------------------------------------------

/// Calendar bucket width for activity aggregation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum WindowSize {
    #[default]
    Day,
    Week,
    Month,
}

impl WindowSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowSize::Day => "day",
            WindowSize::Week => "week",
            WindowSize::Month => "month",
        }
    }

    /// Parse a window size, falling back to [`WindowSize::Day`] for anything
    /// unrecognized.
    pub fn parse_lenient(raw: &str) -> Self {
        raw.parse().unwrap_or_else(|_| {
            tracing::debug!("Unrecognized window size {raw:?}; falling back to day");
            WindowSize::Day
        })
    }
}

impl FromStr for WindowSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" => Ok(WindowSize::Day),
            "week" => Ok(WindowSize::Week),
            "month" => Ok(WindowSize::Month),
            other => Err(format!("unknown window size: {other}")),
        }
    }
}

impl fmt::Display for WindowSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// 4. TimeWindow
// ---------------------------------------------------------------------------

/// A calendar bucket and the revisions that fell into it.
#[derive(Clone, Debug)]
pub struct TimeWindow<'a> {
    pub label: String,
    pub authors: IndexSet<&'a str>,
    pub revisions: Vec<TimedRevision<'a>>,
}

impl<'a> TimeWindow<'a> {
    pub fn new(label: String) -> Self {
        Self {
            label,
            authors: IndexSet::new(),
            revisions: Vec::new(),
        }
    }

    pub fn push(&mut self, timed: TimedRevision<'a>) {
        self.authors.insert(timed.revision.author_key());
        self.revisions.push(timed);
    }

    pub fn edit_count(&self) -> usize {
        self.revisions.len()
    }

    pub fn author_count(&self) -> usize {
        self.authors.len()
    }
}

// ---------------------------------------------------------------------------
// 5. SeriesStats / Severity / Spike
// ---------------------------------------------------------------------------

/// Population summary of one per-window count series.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SeriesStats {
    #[serde(serialize_with = "round2")]
    pub mean: f64,
    #[serde(serialize_with = "round2")]
    pub stdev: f64,
    pub min: usize,
    pub max: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Moderate,
    High,
}

impl Severity {
    pub const HIGH_Z: f64 = 3.0;

    pub fn from_peak_z(peak_z: f64) -> Self {
        if peak_z >= Self::HIGH_Z {
            Severity::High
        } else {
            Severity::Moderate
        }
    }
}

/// A window flagged as anomalous by the spike detector.
#[derive(Clone, Debug, Serialize)]
pub struct Spike<'a> {
    pub window: String,
    pub edit_count: usize,
    pub author_count: usize,
    #[serde(serialize_with = "round2")]
    pub edit_z_score: f64,
    #[serde(serialize_with = "round2")]
    pub author_z_score: f64,
    pub severity: Severity,
    pub authors: Vec<&'a str>,
    pub sample_revisions: Vec<&'a Revision>,
}

impl Spike<'_> {
    pub fn peak_z(&self) -> f64 {
        self.edit_z_score.max(self.author_z_score)
    }
}

// ---------------------------------------------------------------------------
// 6. Significance
// ---------------------------------------------------------------------------

/// Human-readable breakdown of a revision's significance inputs.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SignificanceFactors<'a> {
    pub size_change_bytes: Option<i64>,
    pub normalized_size_impact: f64,
    pub author_experience_level: usize,
    pub has_discussion_keywords: bool,
    pub edit_comment: &'a str,
    pub timestamp: &'a str,
    pub author: Option<&'a str>,
}

/// The five weighted sub-scores behind a composite significance score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct SubScores {
    pub size_change: f64,
    pub revert_proximity: f64,
    pub author_experience: f64,
    pub discussion_keywords: f64,
    pub edit_war_density: f64,
}

/// A revision that passed the significance threshold.
#[derive(Clone, Debug, Serialize)]
pub struct RankedRevision<'a> {
    #[serde(flatten)]
    pub revision: &'a Revision,
    #[serde(serialize_with = "round3")]
    pub significance_score: f64,
    pub significance_factors: SignificanceFactors<'a>,
}

// ---------------------------------------------------------------------------
// Module registration helper
// ---------------------------------------------------------------------------

/// Register model constants on a Python module.
pub fn register_models(m: &Bound<'_, pyo3::types::PyModule>) -> PyResult<()> {
    m.add("UNKNOWN_AUTHOR", UNKNOWN_AUTHOR)?;
    m.add("WINDOW_SIZES", WINDOW_SIZES.to_vec())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn revision_accepts_source_field_names() {
        let rev: Revision = serde_json::from_value(json!({
            "revid": 42,
            "timestamp": "2024-01-15T14:30:00Z",
            "user": "Alice",
            "size": 1200,
            "sizediff": -30,
            "comment": "rv vandalism",
            "sha1": "abc",
        }))
        .unwrap();
        assert_eq!(rev.id, json!(42));
        assert_eq!(rev.author.as_deref(), Some("Alice"));
        assert_eq!(rev.size_delta, Some(-30));
        assert_eq!(rev.comment, "rv vandalism");
        assert_eq!(rev.extra.get("sha1"), Some(&json!("abc")));
    }

    #[test]
    fn revision_defaults_optional_fields() {
        let rev: Revision = serde_json::from_value(json!({
            "id": 1,
            "timestamp": "2024-01-15T14:30:00Z",
            "comment": null,
        }))
        .unwrap();
        assert_eq!(rev.author, None);
        assert_eq!(rev.size, 0);
        assert_eq!(rev.size_delta, None);
        assert_eq!(rev.comment, "");
        assert_eq!(rev.author_key(), UNKNOWN_AUTHOR);
    }

    #[test]
    fn revision_id_is_opaque_and_size_tolerates_null() {
        let rev: Revision = serde_json::from_value(json!({
            "revid": "abc-1",
            "timestamp": "2024-01-15T14:30:00Z",
            "size": null,
        }))
        .unwrap();
        assert_eq!(rev.id, json!("abc-1"));
        assert_eq!(rev.size, 0);

        let anonymous: Revision =
            serde_json::from_value(json!({ "timestamp": "2024-01-15T14:30:00Z" })).unwrap();
        assert_eq!(anonymous.id, serde_json::Value::Null);
    }

    #[test]
    fn revision_without_timestamp_is_rejected() {
        let parsed = serde_json::from_value::<Revision>(json!({ "id": 1, "size": 10 }));
        assert!(parsed.is_err());
    }

    #[test]
    fn window_size_parsing() {
        assert_eq!("week".parse::<WindowSize>(), Ok(WindowSize::Week));
        assert_eq!(" Month ".parse::<WindowSize>(), Ok(WindowSize::Month));
        assert!("hour".parse::<WindowSize>().is_err());
        assert_eq!(WindowSize::parse_lenient("hour"), WindowSize::Day);
    }

    #[test]
    fn severity_threshold_is_inclusive() {
        assert_eq!(Severity::from_peak_z(3.0), Severity::High);
        assert_eq!(Severity::from_peak_z(2.99), Severity::Moderate);
    }

    #[test]
    fn ranked_revision_flattens_record_and_rounds_score() {
        let rev = Revision::new(7, "2024-01-15T14:30:00Z", Some("Bob"), 500).with_comment("fix");
        let ranked = RankedRevision {
            revision: &rev,
            significance_score: 0.123456,
            significance_factors: SignificanceFactors {
                size_change_bytes: None,
                normalized_size_impact: 0.0,
                author_experience_level: 1,
                has_discussion_keywords: false,
                edit_comment: &rev.comment,
                timestamp: &rev.timestamp,
                author: rev.author.as_deref(),
            },
        };
        let value = serde_json::to_value(&ranked).unwrap();
        assert_eq!(value["id"], json!(7));
        assert_eq!(value["author"], json!("Bob"));
        assert_eq!(value["significance_score"], json!(0.123));
        assert_eq!(value["significance_factors"]["size_change_bytes"], json!(null));
    }
}
