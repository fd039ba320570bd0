//! Environment-driven analysis defaults.

use std::collections::HashMap;
use std::str::FromStr;

use pyo3::prelude::*;
use tracing::warn;

use crate::models::WindowSize;

pub const DEFAULT_Z_THRESHOLD: f64 = 2.0;
pub const DEFAULT_MIN_SIGNIFICANCE: f64 = 0.5;
pub const DEFAULT_RESULT_LIMIT: i64 = 50;
pub const DEFAULT_CACHE_MAX_ENTRIES: i64 = 128;
pub const DEFAULT_CACHE_TTL_SECONDS: f64 = 300.0;

/// Tunables resolved from `REVSCOPE_*` environment variables.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisDefaults {
    pub z_threshold: f64,
    pub min_significance: f64,
    pub result_limit: i64,
    pub window_size: WindowSize,
    pub cache_max_entries: i64,
    pub cache_ttl_seconds: f64,
}

impl Default for AnalysisDefaults {
    fn default() -> Self {
        Self {
            z_threshold: DEFAULT_Z_THRESHOLD,
            min_significance: DEFAULT_MIN_SIGNIFICANCE,
            result_limit: DEFAULT_RESULT_LIMIT,
            window_size: WindowSize::Day,
            cache_max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            cache_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
        }
    }
}

impl AnalysisDefaults {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve defaults from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = Self::default();
        Self {
            z_threshold: parse_or("REVSCOPE_Z_THRESHOLD", &lookup, base.z_threshold),
            min_significance: parse_or(
                "REVSCOPE_MIN_SIGNIFICANCE",
                &lookup,
                base.min_significance,
            ),
            result_limit: parse_or("REVSCOPE_RESULT_LIMIT", &lookup, base.result_limit),
            window_size: parse_or("REVSCOPE_WINDOW_SIZE", &lookup, base.window_size),
            cache_max_entries: parse_or(
                "REVSCOPE_CACHE_MAX_ENTRIES",
                &lookup,
                base.cache_max_entries,
            ),
            cache_ttl_seconds: parse_or(
                "REVSCOPE_CACHE_TTL_SECONDS",
                &lookup,
                base.cache_ttl_seconds,
            ),
        }
    }
}

fn parse_or<T, F>(key: &str, lookup: &F, fallback: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("Ignoring unparseable {key}={raw:?}; using default");
                fallback
            }
        },
        _ => fallback,
    }
}

/// Resolved analysis defaults, as seen by the calling process.
#[pyfunction]
pub fn analysis_defaults() -> HashMap<String, String> {
    let defaults = AnalysisDefaults::from_env();
    let mut result = HashMap::new();
    result.insert("z_threshold".to_string(), defaults.z_threshold.to_string());
    result.insert(
        "min_significance".to_string(),
        defaults.min_significance.to_string(),
    );
    result.insert("result_limit".to_string(), defaults.result_limit.to_string());
    result.insert(
        "window_size".to_string(),
        defaults.window_size.as_str().to_string(),
    );
    result.insert(
        "cache_max_entries".to_string(),
        defaults.cache_max_entries.to_string(),
    );
    result.insert(
        "cache_ttl_seconds".to_string(),
        defaults.cache_ttl_seconds.to_string(),
    );
    result
}
