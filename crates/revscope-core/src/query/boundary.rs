//! Result envelopes and Python conversion at the operation boundary.
//!
//! Operations exposed to the tool layer never raise: every failure, including
//! a panic inside the analysis, comes back as an envelope carrying
//! `exists`, `error` and `error_kind`.

use std::panic::{catch_unwind, AssertUnwindSafe};

use pyo3::prelude::*;
use serde_json::{json, Map, Value};
use tracing::{error, warn};

use crate::errors::{RevscopeError, RevscopeResult};

/// Human-readable period covered by an analysis.
pub fn analysis_period(start: Option<&str>, end: Option<&str>) -> String {
    format!(
        "{} to {}",
        start.unwrap_or("beginning"),
        end.unwrap_or("now")
    )
}

/// Builds the response for one operation call.
///
/// `context` holds fields reported whether the call succeeds or fails.
pub struct Envelope<'t> {
    title: &'t str,
    context: Map<String, Value>,
}

impl<'t> Envelope<'t> {
    pub fn new(title: &'t str) -> Self {
        Self {
            title,
            context: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.context.insert(key.to_string(), value);
        self
    }

    /// Run `op`, merging its fields (or the error) with the shared context.
    ///
    /// `op` may add to the context as it learns things worth reporting on
    /// failure.
    pub fn run<F>(mut self, operation: &str, op: F) -> Value
    where
        F: FnOnce(&mut Map<String, Value>) -> RevscopeResult<Map<String, Value>>,
    {
        let outcome = catch_unwind(AssertUnwindSafe(|| op(&mut self.context)));
        let result = match outcome {
            Ok(result) => result,
            Err(payload) => Err(RevscopeError::Internal(panic_message(payload.as_ref()))),
        };

        let mut body = Map::new();
        body.insert("title".to_string(), json!(self.title));
        match result {
            Ok(fields) => {
                body.insert("exists".to_string(), json!(true));
                body.extend(self.context);
                body.extend(fields);
            }
            Err(err) => {
                match &err {
                    RevscopeError::Internal(_) | RevscopeError::Json(_) => {
                        error!("Error in {operation} for {:?}: {err}", self.title)
                    }
                    _ => warn!("{operation} for {:?} declined: {err}", self.title),
                }
                body.insert("exists".to_string(), json!(err.document_exists()));
                body.extend(self.context);
                body.insert("error".to_string(), json!(err.to_string()));
                body.insert("error_kind".to_string(), json!(err.kind()));
            }
        }
        Value::Object(body)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "analysis panicked".to_string()
    }
}

/// Convert a Python JSON-compatible object into a `serde_json::Value`.
pub fn from_python(obj: &Bound<'_, PyAny>) -> PyResult<Value> {
    let json_module = obj.py().import("json")?;
    let dumped: String = json_module.call_method1("dumps", (obj,))?.extract()?;
    serde_json::from_str(&dumped)
        .map_err(|e| pyo3::exceptions::PyValueError::new_err(e.to_string()))
}

/// Convert a `serde_json::Value` into native Python objects.
pub fn to_python(py: Python<'_>, value: &Value) -> PyResult<PyObject> {
    let json_str = serde_json::to_string(value)
        .map_err(|e| pyo3::exceptions::PyRuntimeError::new_err(e.to_string()))?;
    let json_module = py.import("json")?;
    json_module
        .call_method1("loads", (json_str,))
        .map(|o| o.into())
}

/// Convert a source payload, falling back to `null` (reported downstream as
/// invalid input) when the object is not JSON-serializable.
pub fn payload_from_python(obj: &Bound<'_, PyAny>) -> Value {
    from_python(obj).unwrap_or_else(|e| {
        warn!("Source payload is not JSON-serializable: {e}");
        Value::Null
    })
}
