//! Parallel activity analysis across independent documents.

use pyo3::prelude::*;
use rayon::prelude::*;
use serde_json::Value;
use tracing::debug;

use crate::config::AnalysisDefaults;
use crate::models::WindowSize;
use crate::query::activity::{analyze_edit_activity_json, ActivityParams};
use crate::query::boundary::{payload_from_python, to_python};
use crate::query::guards::{clamp_int, MAX_BATCH_WORKERS};

pub const DEFAULT_BATCH_WORKERS: i64 = 4;

/// Analyze each `(title, payload)` pair with shared parameters.
///
/// Results are returned in input order. Falls back to sequential analysis if
/// the worker pool cannot be built.
pub fn analyze_activity_batch(
    documents: &[(String, Value)],
    params: &ActivityParams,
    workers: usize,
) -> Vec<Value> {
    if documents.is_empty() {
        return vec![];
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build();

    debug!(
        "Batch activity analysis of {} documents on {workers} workers",
        documents.len()
    );

    match pool {
        Ok(pool) => pool.install(|| {
            documents
                .par_iter()
                .map(|(title, payload)| analyze_edit_activity_json(title, payload, params))
                .collect()
        }),
        Err(_) => documents
            .iter()
            .map(|(title, payload)| analyze_edit_activity_json(title, payload, params))
            .collect(),
    }
}

/// Run `analyze_edit_activity` over several documents in parallel.
///
/// `documents` is a sequence of `(title, source_payload)` pairs.
#[pyfunction]
#[pyo3(signature = (documents, start_datetime=None, end_datetime=None, window_size=None, z_threshold=None, workers=DEFAULT_BATCH_WORKERS))]
pub fn analyze_edit_activity_batch(
    py: Python<'_>,
    documents: Vec<(String, Bound<'_, PyAny>)>,
    start_datetime: Option<String>,
    end_datetime: Option<String>,
    window_size: Option<&str>,
    z_threshold: Option<f64>,
    workers: i64,
) -> PyResult<Vec<PyObject>> {
    let defaults = AnalysisDefaults::from_env();
    let params = ActivityParams {
        start: start_datetime,
        end: end_datetime,
        window_size: window_size
            .map(WindowSize::parse_lenient)
            .unwrap_or(defaults.window_size),
        z_threshold: z_threshold.unwrap_or(defaults.z_threshold),
    };
    let documents: Vec<(String, Value)> = documents
        .iter()
        .map(|(title, source)| (title.clone(), payload_from_python(source)))
        .collect();
    let workers = clamp_int(workers, 1, MAX_BATCH_WORKERS) as usize;

    let results = analyze_activity_batch(&documents, &params, workers);
    results.iter().map(|result| to_python(py, result)).collect()
}
