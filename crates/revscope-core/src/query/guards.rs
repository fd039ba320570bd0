//! Shared guardrails for analysis parameters and sample bounds.

use pyo3::prelude::*;

use crate::errors::{RevscopeError, RevscopeResult};

/// Revisions the caller should request from the source per analysis.
pub const REVISION_FETCH_LIMIT: usize = 500;
pub const MAX_RESULT_LIMIT: i64 = 500;
/// Fewest windows the spike detector will compute statistics over.
pub const MIN_ACTIVITY_WINDOWS: usize = 3;
/// Fewest revisions significance ranking will score.
pub const MIN_SIGNIFICANCE_REVISIONS: usize = 2;
pub const MAX_SPIKE_SAMPLES: usize = 5;
pub const MAX_BATCH_WORKERS: i64 = 32;

#[pyfunction]
pub fn clamp_int(value: i64, minimum: i64, maximum: i64) -> i64 {
    value.max(minimum).min(maximum)
}

#[pyfunction]
pub fn clamp_limit(value: i64, maximum: i64) -> i64 {
    clamp_int(value, 0, maximum)
}

/// Clamp a significance threshold into `[0, 1]`, rejecting NaN and infinities.
#[pyfunction]
pub fn clamp_significance(value: f64) -> PyResult<f64> {
    Ok(checked_significance(value)?)
}

pub fn checked_significance(value: f64) -> RevscopeResult<f64> {
    if !value.is_finite() {
        return Err(RevscopeError::InvalidInput(format!(
            "min_significance must be a finite number, got {value}"
        )));
    }
    Ok(value.clamp(0.0, 1.0))
}

pub fn checked_z_threshold(value: f64) -> RevscopeResult<f64> {
    if !value.is_finite() {
        return Err(RevscopeError::InvalidInput(format!(
            "z_threshold must be a finite number, got {value}"
        )));
    }
    Ok(value)
}

/// Treat empty or whitespace-only bounds as absent.
pub fn optional_bound(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}
