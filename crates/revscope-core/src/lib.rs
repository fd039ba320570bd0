//! Revscope core library: revision-history analytics for wiki-style documents.
//!
//! Given a document's revision history (newest first) this crate detects
//! anomalous bursts of editing activity and ranks individual revisions by a
//! weighted significance score. It is compiled as a Python extension module
//! (`_revscope_core`) via PyO3; the host process fetches revisions and hands
//! the source payload over unchanged.

pub mod analysis;
pub mod config;
pub mod errors;
pub mod models;
pub mod query;
pub mod source;

use pyo3::prelude::*;
use pyo3::wrap_pyfunction;

// ---------------------------------------------------------------------------
// Top-level Python module: _revscope_core
// ---------------------------------------------------------------------------

#[pymodule]
fn _revscope_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // -- Models and configuration -------------------------------------------
    models::register_models(m)?;
    m.add_function(wrap_pyfunction!(config::analysis_defaults, m)?)?;

    // -- Query: guards (constants + clamping functions) ----------------------
    m.add("REVISION_FETCH_LIMIT", query::guards::REVISION_FETCH_LIMIT)?;
    m.add("MAX_RESULT_LIMIT", query::guards::MAX_RESULT_LIMIT)?;
    m.add("MIN_ACTIVITY_WINDOWS", query::guards::MIN_ACTIVITY_WINDOWS)?;
    m.add(
        "MIN_SIGNIFICANCE_REVISIONS",
        query::guards::MIN_SIGNIFICANCE_REVISIONS,
    )?;
    m.add("MAX_SPIKE_SAMPLES", query::guards::MAX_SPIKE_SAMPLES)?;
    m.add("MAX_BATCH_WORKERS", query::guards::MAX_BATCH_WORKERS)?;

    m.add_function(wrap_pyfunction!(query::guards::clamp_int, m)?)?;
    m.add_function(wrap_pyfunction!(query::guards::clamp_limit, m)?)?;
    m.add_function(wrap_pyfunction!(query::guards::clamp_significance, m)?)?;

    // -- Analysis helpers ----------------------------------------------------
    m.add_function(wrap_pyfunction!(analysis::filter::parse_timestamp, m)?)?;
    m.add_function(wrap_pyfunction!(analysis::windows::window_label, m)?)?;
    m.add_function(wrap_pyfunction!(
        analysis::significance::size_change_impact,
        m
    )?)?;
    m.add_function(wrap_pyfunction!(
        analysis::significance::author_experience_score,
        m
    )?)?;
    m.add_function(wrap_pyfunction!(
        analysis::significance::discussion_keyword_score,
        m
    )?)?;

    // -- Query: main operations ---------------------------------------------
    m.add_function(wrap_pyfunction!(query::activity::analyze_edit_activity, m)?)?;
    m.add_function(wrap_pyfunction!(
        query::significant::get_significant_revisions,
        m
    )?)?;
    m.add_function(wrap_pyfunction!(
        query::batch::analyze_edit_activity_batch,
        m
    )?)?;

    // -- Query: response cache -----------------------------------------------
    m.add_class::<query::cache::AnalysisCache>()?;

    Ok(())
}
