//! Edit-activity spike analysis backend.

use pyo3::prelude::*;
use serde_json::{json, Map, Value};
use tracing::info;

use crate::analysis::filter::{filter_by_date_range, DateRange};
use crate::analysis::spikes::detect_spikes;
use crate::analysis::windows::aggregate_windows;
use crate::config::AnalysisDefaults;
use crate::errors::RevscopeResult;
use crate::models::WindowSize;
use crate::query::boundary::{analysis_period, payload_from_python, to_python, Envelope};
use crate::query::guards::{checked_z_threshold, optional_bound};
use crate::source::RevisionBatch;

/// Parameters for one activity analysis.
#[derive(Clone, Debug, PartialEq)]
pub struct ActivityParams {
    pub start: Option<String>,
    pub end: Option<String>,
    pub window_size: WindowSize,
    pub z_threshold: f64,
}

impl ActivityParams {
    pub fn from_defaults(defaults: &AnalysisDefaults) -> Self {
        Self {
            start: None,
            end: None,
            window_size: defaults.window_size,
            z_threshold: defaults.z_threshold,
        }
    }

    fn start(&self) -> Option<&str> {
        optional_bound(self.start.as_deref())
    }

    fn end(&self) -> Option<&str> {
        optional_bound(self.end.as_deref())
    }
}

impl Default for ActivityParams {
    fn default() -> Self {
        Self::from_defaults(&AnalysisDefaults::default())
    }
}

pub fn analyze_edit_activity_impl(
    batch: &RevisionBatch,
    params: &ActivityParams,
    context: &mut Map<String, Value>,
) -> RevscopeResult<Map<String, Value>> {
    let z_threshold = checked_z_threshold(params.z_threshold)?;
    let range = DateRange::parse(params.start(), params.end())?;
    let filtered = filter_by_date_range(&batch.revisions, &range);
    let windows = aggregate_windows(&filtered, params.window_size);

    context.insert("total_windows".to_string(), json!(windows.len()));
    let analysis = detect_spikes(&windows, z_threshold)?;
    context.remove("total_windows");

    info!(
        "Activity analysis: {} revisions in {} windows, {} spikes",
        filtered.len(),
        windows.len(),
        analysis.spikes.len()
    );

    let mut fields = Map::new();
    fields.insert(
        "sample_may_be_truncated".to_string(),
        json!(batch.may_be_truncated()),
    );
    fields.insert(
        "statistics".to_string(),
        json!({
            "total_windows": windows.len(),
            "total_revisions_analyzed": filtered.len(),
            "edit_statistics": analysis.edit_stats,
            "author_statistics": analysis.author_stats,
        }),
    );
    fields.insert("spikes_detected".to_string(), json!(analysis.spikes.len()));
    fields.insert("spikes".to_string(), serde_json::to_value(&analysis.spikes)?);
    Ok(fields)
}

/// Run an activity analysis over a source payload, returning a response
/// envelope. Never fails.
pub fn analyze_edit_activity_json(title: &str, payload: &Value, params: &ActivityParams) -> Value {
    Envelope::new(title)
        .with(
            "analysis_period",
            json!(analysis_period(params.start(), params.end())),
        )
        .with("window_size", json!(params.window_size.as_str()))
        .with("z_threshold", json!(params.z_threshold))
        .run("analyze_edit_activity", |context| {
            let batch = RevisionBatch::from_source_payload(payload)?;
            analyze_edit_activity_impl(&batch, params, context)
        })
}

/// Detect statistically anomalous editing windows in a document's history.
///
/// `source` is the revision source's payload for the document. Tunables left
/// as `None` use the configured defaults.
#[pyfunction]
#[pyo3(signature = (title, source, start_datetime=None, end_datetime=None, window_size=None, z_threshold=None))]
pub fn analyze_edit_activity(
    py: Python<'_>,
    title: &str,
    source: &Bound<'_, PyAny>,
    start_datetime: Option<String>,
    end_datetime: Option<String>,
    window_size: Option<&str>,
    z_threshold: Option<f64>,
) -> PyResult<PyObject> {
    let defaults = AnalysisDefaults::from_env();
    let params = ActivityParams {
        start: start_datetime,
        end: end_datetime,
        window_size: window_size
            .map(WindowSize::parse_lenient)
            .unwrap_or(defaults.window_size),
        z_threshold: z_threshold.unwrap_or(defaults.z_threshold),
    };
    let payload = payload_from_python(source);
    let result = analyze_edit_activity_json(title, &payload, &params);
    to_python(py, &result)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Newest-first source payload with `days[i]` edits on 2024-01-(i+1).
    fn payload_for(days: &[usize]) -> Value {
        let mut revisions = Vec::new();
        let mut id = 1000;
        for (day, &count) in days.iter().enumerate().rev() {
            for edit in 0..count {
                revisions.push(json!({
                    "revid": id,
                    "timestamp": format!("2024-01-{:02}T{:02}:00:00Z", day + 1, 23 - edit),
                    "user": format!("user{}", edit % 2),
                    "size": 5000 + id,
                    "comment": "edit",
                }));
                id -= 1;
            }
        }
        json!({"title": "Test Article", "exists": true, "revisions": revisions})
    }

    fn params(z: f64) -> ActivityParams {
        ActivityParams {
            z_threshold: z,
            ..ActivityParams::default()
        }
    }

    #[test]
    fn reports_statistics_and_spikes() {
        let payload = payload_for(&[1, 2, 1, 10, 1, 2, 1]);
        let result = analyze_edit_activity_json("Test Article", &payload, &params(1.5));

        assert_eq!(result["exists"], json!(true));
        assert_eq!(result["title"], json!("Test Article"));
        assert_eq!(result["window_size"], json!("day"));
        assert_eq!(result["z_threshold"], json!(1.5));
        assert_eq!(result["analysis_period"], json!("beginning to now"));
        assert_eq!(result["sample_may_be_truncated"], json!(false));

        let stats = &result["statistics"];
        assert_eq!(stats["total_windows"], json!(7));
        assert_eq!(stats["total_revisions_analyzed"], json!(18));
        assert_eq!(stats["edit_statistics"]["mean"], json!(2.57));
        assert_eq!(stats["edit_statistics"]["min"], json!(1));
        assert_eq!(stats["edit_statistics"]["max"], json!(10));

        assert_eq!(result["spikes_detected"], json!(1));
        let spike = &result["spikes"][0];
        assert_eq!(spike["window"], json!("2024-01-04"));
        assert_eq!(spike["edit_count"], json!(10));
        assert_eq!(spike["author_count"], json!(2));
        assert_eq!(spike["edit_z_score"], json!(2.24));
        assert_eq!(spike["severity"], json!("moderate"));
        assert_eq!(spike["sample_revisions"].as_array().unwrap().len(), 5);
        assert_eq!(spike["authors"], json!(["user0", "user1"]));
    }

    #[test]
    fn two_windows_is_insufficient_data() {
        let payload = payload_for(&[3, 8]);
        let result = analyze_edit_activity_json("Test Article", &payload, &params(2.0));
        assert_eq!(result["error_kind"], json!("insufficient_data"));
        assert!(result["error"]
            .as_str()
            .unwrap()
            .contains("Insufficient data for statistical analysis"));
        assert_eq!(result["total_windows"], json!(2));
        assert_eq!(result["exists"], json!(true));
    }

    #[test]
    fn missing_page_passes_through() {
        let payload = json!({"title": "Nope", "exists": false, "error": "Page does not exist"});
        let result = analyze_edit_activity_json("Nope", &payload, &params(2.0));
        assert_eq!(result["exists"], json!(false));
        assert_eq!(result["error"], json!("Page does not exist"));
        assert_eq!(result["error_kind"], json!("upstream_missing"));
    }

    #[test]
    fn date_range_restricts_windows() {
        let payload = payload_for(&[1, 2, 1, 10, 1, 2, 1]);
        let params = ActivityParams {
            start: Some("2024-01-05T00:00:00Z".to_string()),
            end: Some("".to_string()),
            ..params(1.5)
        };
        let result = analyze_edit_activity_json("Test Article", &payload, &params);
        assert_eq!(result["statistics"]["total_windows"], json!(3));
        assert_eq!(result["analysis_period"], json!("2024-01-05T00:00:00Z to now"));
    }

    #[test]
    fn weekly_windows_use_tagged_labels() {
        // 2024-01-01 is a Monday.
        let payload = payload_for(&[1; 21]);
        let params = ActivityParams {
            window_size: WindowSize::Week,
            ..params(2.0)
        };
        let result = analyze_edit_activity_json("Test Article", &payload, &params);
        assert_eq!(result["window_size"], json!("week"));
        assert_eq!(result["statistics"]["total_windows"], json!(3));
    }

    #[test]
    fn invalid_bound_is_reported() {
        let payload = payload_for(&[1, 2, 3]);
        let params = ActivityParams {
            start: Some("someday".to_string()),
            ..params(2.0)
        };
        let result = analyze_edit_activity_json("Test Article", &payload, &params);
        assert_eq!(result["error_kind"], json!("invalid_input"));
        assert_eq!(result["exists"], json!(false));
    }

    #[test]
    fn repeated_calls_are_identical() {
        let payload = payload_for(&[4, 1, 1, 9, 2, 1]);
        let first = analyze_edit_activity_json("Test Article", &payload, &params(1.0));
        let second = analyze_edit_activity_json("Test Article", &payload, &params(1.0));
        assert_eq!(first, second);
    }
}
