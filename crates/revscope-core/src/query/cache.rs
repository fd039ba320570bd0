//! In-memory response caching for repeated identical analysis calls.
//!
//! The analytics stay cache-agnostic; callers wrap operations (or their
//! revision fetches) in a cache keyed by the canonicalized arguments.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use parking_lot::Mutex;
use pyo3::prelude::*;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::AnalysisDefaults;
use crate::query::boundary::from_python;

const MIN_TTL_SECONDS: f64 = 0.1;

/// Get/set store keyed by a canonical argument key.
pub trait ResponseCache<V> {
    fn get(&self, key: &str) -> Option<Arc<V>>;
    fn set(&self, key: String, value: V) -> Arc<V>;
}

struct CacheEntry<V> {
    value: Arc<V>,
    expires_at: Instant,
}

/// Bounded cache with per-entry expiry and least-recently-used eviction.
pub struct TtlCache<V> {
    max_entries: usize,
    ttl: Duration,
    entries: Mutex<IndexMap<String, CacheEntry<V>>>,
}

impl<V> TtlCache<V> {
    pub fn new(max_entries: i64, ttl_seconds: f64) -> Self {
        let ttl_seconds = if ttl_seconds.is_finite() {
            ttl_seconds.max(MIN_TTL_SECONDS)
        } else {
            MIN_TTL_SECONDS
        };
        Self {
            max_entries: max_entries.max(1) as usize,
            ttl: Duration::from_secs_f64(ttl_seconds),
            entries: Mutex::new(IndexMap::new()),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    fn evict_expired(entries: &mut IndexMap<String, CacheEntry<V>>, now: Instant) {
        entries.retain(|_, entry| entry.expires_at > now);
    }
}

impl<V> ResponseCache<V> for TtlCache<V> {
    fn get(&self, key: &str) -> Option<Arc<V>> {
        let mut entries = self.entries.lock();
        Self::evict_expired(&mut entries, Instant::now());
        // Move to end for LRU
        let (key, entry) = entries.shift_remove_entry(key)?;
        let value = Arc::clone(&entry.value);
        entries.insert(key, entry);
        Some(value)
    }

    fn set(&self, key: String, value: V) -> Arc<V> {
        let value = Arc::new(value);
        let now = Instant::now();
        let mut entries = self.entries.lock();
        Self::evict_expired(&mut entries, now);
        entries.shift_remove(&key);
        entries.insert(
            key,
            CacheEntry {
                value: Arc::clone(&value),
                expires_at: now + self.ttl,
            },
        );
        while entries.len() > self.max_entries {
            entries.shift_remove_index(0);
        }
        value
    }
}

/// Serialize with object keys sorted at every level.
fn canonical_json(value: &Value) -> String {
    fn sorted(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                Value::Object(
                    keys.into_iter()
                        .map(|k| (k.clone(), sorted(&map[k])))
                        .collect(),
                )
            }
            Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
            other => other.clone(),
        }
    }
    sorted(value).to_string()
}

/// `tool:version:sha256(canonical arguments)`.
pub fn cache_key(tool_name: &str, arguments: &Value, version_token: Option<&str>) -> String {
    let digest = Sha256::digest(canonical_json(arguments).as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("{tool_name}:{}:{hex}", version_token.unwrap_or("default"))
}

/// Python-facing cache of computed analysis responses.
#[pyclass]
pub struct AnalysisCache {
    inner: TtlCache<PyObject>,
}

#[pymethods]
impl AnalysisCache {
    #[new]
    #[pyo3(signature = (max_entries=None, ttl_seconds=None))]
    fn new(max_entries: Option<i64>, ttl_seconds: Option<f64>) -> Self {
        let defaults = AnalysisDefaults::from_env();
        Self {
            inner: TtlCache::new(
                max_entries.unwrap_or(defaults.cache_max_entries),
                ttl_seconds.unwrap_or(defaults.cache_ttl_seconds),
            ),
        }
    }

    /// Return the cached value for `(tool_name, payload)` or call `compute`
    /// and cache its result.
    #[pyo3(signature = (tool_name, payload, compute, version_token=None))]
    fn get_or_compute(
        &self,
        py: Python<'_>,
        tool_name: &str,
        payload: &Bound<'_, PyAny>,
        compute: &Bound<'_, PyAny>,
        version_token: Option<&str>,
    ) -> PyResult<(PyObject, String)> {
        let key = cache_key(tool_name, &from_python(payload)?, version_token);
        if let Some(value) = self.inner.get(&key) {
            debug!("Cache hit for {tool_name}");
            return Ok((value.clone_ref(py), "cache_hit".to_string()));
        }
        let result = compute.call0()?.unbind();
        let stored = self.inner.set(key, result);
        Ok((stored.clone_ref(py), "cache_miss".to_string()))
    }

    fn stats(&self) -> HashMap<String, f64> {
        let mut result = HashMap::new();
        result.insert("entries".to_string(), self.inner.len() as f64);
        result.insert("max_entries".to_string(), self.inner.max_entries() as f64);
        result.insert("ttl_seconds".to_string(), self.inner.ttl().as_secs_f64());
        result
    }

    fn clear(&self) {
        self.inner.clear();
    }
}
