//! Error types for the revscope core library.

use pyo3::exceptions::{PyLookupError, PyRuntimeError, PyValueError};
use pyo3::PyErr;

/// Top-level error enum for the revscope core library.
#[derive(Debug, thiserror::Error)]
pub enum RevscopeError {
    /// The revision source reported that the document has no data at all.
    #[error("{0}")]
    UpstreamMissing(String),

    #[error("{0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RevscopeError {
    /// Stable machine-readable tag carried in error envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            RevscopeError::UpstreamMissing(_) => "upstream_missing",
            RevscopeError::InsufficientData(_) => "insufficient_data",
            RevscopeError::InvalidInput(_) => "invalid_input",
            RevscopeError::Internal(_) | RevscopeError::Json(_) => "internal",
        }
    }

    /// Whether the document itself is known to exist when this error occurs.
    pub fn document_exists(&self) -> bool {
        matches!(self, RevscopeError::InsufficientData(_))
    }
}

impl From<RevscopeError> for PyErr {
    fn from(err: RevscopeError) -> PyErr {
        match &err {
            RevscopeError::UpstreamMissing(_) => PyLookupError::new_err(err.to_string()),
            RevscopeError::InsufficientData(_) | RevscopeError::InvalidInput(_) => {
                PyValueError::new_err(err.to_string())
            }
            RevscopeError::Internal(_) => PyRuntimeError::new_err(err.to_string()),
            RevscopeError::Json(_) => PyValueError::new_err(err.to_string()),
        }
    }
}

pub type RevscopeResult<T> = Result<T, RevscopeError>;
