//! Normalization of revision-source payloads into typed revision batches.

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{RevscopeError, RevscopeResult};
use crate::models::Revision;
use crate::query::guards::REVISION_FETCH_LIMIT;

const DEFAULT_MISSING_MESSAGE: &str = "Page does not exist";

/// A document's revisions, newest first, as handed over by the source.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RevisionBatch {
    pub revisions: Vec<Revision>,
    /// Number of entries the source sent, including any that were skipped.
    pub raw_count: usize,
}

impl RevisionBatch {
    pub fn new(revisions: Vec<Revision>) -> Self {
        let raw_count = revisions.len();
        let mut batch = Self {
            revisions,
            raw_count,
        };
        batch.fill_size_deltas();
        batch
    }

    /// Build a batch from the source's payload.
    ///
    /// Accepts either `{exists, error, revisions: [...]}` or a bare array.
    pub fn from_source_payload(payload: &Value) -> RevscopeResult<Self> {
        let entries = match payload {
            Value::Array(entries) => entries,
            Value::Object(map) => {
                let missing = map.get("exists").and_then(Value::as_bool) == Some(false);
                let entries = map.get("revisions").and_then(Value::as_array);
                if missing || (entries.is_none() && map.contains_key("error")) {
                    let message = map
                        .get("error")
                        .and_then(Value::as_str)
                        .unwrap_or(DEFAULT_MISSING_MESSAGE);
                    return Err(RevscopeError::UpstreamMissing(message.to_string()));
                }
                match entries {
                    Some(entries) => entries,
                    None => {
                        return Err(RevscopeError::InvalidInput(
                            "source payload has no revisions list".to_string(),
                        ))
                    }
                }
            }
            other => {
                return Err(RevscopeError::InvalidInput(format!(
                    "expected revision payload object or array, got {}",
                    json_type(other)
                )))
            }
        };

        let mut revisions = Vec::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            match serde_json::from_value::<Revision>(entry.clone()) {
                Ok(revision) => revisions.push(revision),
                Err(e) => warn!("Skipping malformed revision at position {position}: {e}"),
            }
        }
        debug!(
            "Normalized {} of {} source revisions",
            revisions.len(),
            entries.len()
        );

        let mut batch = Self {
            revisions,
            raw_count: entries.len(),
        };
        batch.fill_size_deltas();
        Ok(batch)
    }

    /// Whether the source likely returned a capped sample rather than the
    /// full history for the requested range.
    pub fn may_be_truncated(&self) -> bool {
        self.raw_count >= REVISION_FETCH_LIMIT
    }

    /// Derive missing size deltas from the next-older revision's size.
    ///
    /// The oldest revision in the batch has no baseline and keeps `None`.
    fn fill_size_deltas(&mut self) {
        let sizes: Vec<i64> = self.revisions.iter().map(|r| r.size).collect();
        for (i, revision) in self.revisions.iter_mut().enumerate() {
            if revision.size_delta.is_none() {
                revision.size_delta = sizes
                    .get(i + 1)
                    .map(|&older| revision.size.saturating_sub(older));
            }
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
