//! Significant-revision ranking backend.

use pyo3::prelude::*;
use serde_json::{json, Map, Value};
use tracing::info;

use crate::analysis::filter::{filter_by_date_range, DateRange};
use crate::analysis::ranking::rank_revisions;
use crate::config::AnalysisDefaults;
use crate::errors::RevscopeResult;
use crate::query::boundary::{analysis_period, payload_from_python, to_python, Envelope};
use crate::query::guards::{checked_significance, clamp_limit, optional_bound, MAX_RESULT_LIMIT};
use crate::source::RevisionBatch;

#[derive(Clone, Debug, PartialEq)]
pub struct SignificanceParams {
    pub start: Option<String>,
    pub end: Option<String>,
    pub limit: usize,
    pub min_significance: f64,
}

impl SignificanceParams {
    pub fn from_defaults(defaults: &AnalysisDefaults) -> Self {
        Self {
            start: None,
            end: None,
            limit: clamp_limit(defaults.result_limit, MAX_RESULT_LIMIT) as usize,
            min_significance: defaults.min_significance,
        }
    }

    fn start(&self) -> Option<&str> {
        optional_bound(self.start.as_deref())
    }

    fn end(&self) -> Option<&str> {
        optional_bound(self.end.as_deref())
    }
}

impl Default for SignificanceParams {
    fn default() -> Self {
        Self::from_defaults(&AnalysisDefaults::default())
    }
}

pub fn get_significant_revisions_impl(
    batch: &RevisionBatch,
    params: &SignificanceParams,
) -> RevscopeResult<Map<String, Value>> {
    let min_significance = checked_significance(params.min_significance)?;
    let range = DateRange::parse(params.start(), params.end())?;
    let filtered = filter_by_date_range(&batch.revisions, &range);
    let ranking = rank_revisions(&filtered, min_significance, params.limit)?;

    info!(
        "Significance ranking: {} of {} revisions at or above {min_significance}",
        ranking.passing_count, ranking.total_considered
    );

    let mut fields = Map::new();
    fields.insert(
        "sample_may_be_truncated".to_string(),
        json!(batch.may_be_truncated()),
    );
    fields.insert(
        "total_revisions_analyzed".to_string(),
        json!(ranking.total_considered),
    );
    fields.insert(
        "significant_revisions_found".to_string(),
        json!(ranking.passing_count),
    );
    fields.insert(
        "min_significance_threshold".to_string(),
        json!(min_significance),
    );
    fields.insert("top_revisions".to_string(), serde_json::to_value(&ranking.top)?);
    Ok(fields)
}

/// Rank a document's revisions by significance, returning a response
/// envelope. Never fails.
pub fn get_significant_revisions_json(
    title: &str,
    payload: &Value,
    params: &SignificanceParams,
) -> Value {
    Envelope::new(title)
        .with(
            "analysis_period",
            json!(analysis_period(params.start(), params.end())),
        )
        .run("get_significant_revisions", |_| {
            let batch = RevisionBatch::from_source_payload(payload)?;
            get_significant_revisions_impl(&batch, params)
        })
}

/// Identify the most significant revisions of a document.
///
/// `limit` is clamped to `[0, MAX_RESULT_LIMIT]` and `min_significance` to
/// `[0, 1]`; `None` uses the configured default.
#[pyfunction]
#[pyo3(signature = (title, source, start_datetime=None, end_datetime=None, limit=None, min_significance=None))]
pub fn get_significant_revisions(
    py: Python<'_>,
    title: &str,
    source: &Bound<'_, PyAny>,
    start_datetime: Option<String>,
    end_datetime: Option<String>,
    limit: Option<i64>,
    min_significance: Option<f64>,
) -> PyResult<PyObject> {
    let defaults = AnalysisDefaults::from_env();
    let params = SignificanceParams {
        start: start_datetime,
        end: end_datetime,
        limit: clamp_limit(limit.unwrap_or(defaults.result_limit), MAX_RESULT_LIMIT) as usize,
        min_significance: min_significance.unwrap_or(defaults.min_significance),
    };
    let payload = payload_from_python(source);
    let result = get_significant_revisions_json(title, &payload, &params);
    to_python(py, &result)
}
