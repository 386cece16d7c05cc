//! Snapshot serialization shared by the data file and the wire.
//!
//! A snapshot is always the whole collection, never a diff.

use std::path::Path;

use crate::error::SnapshotError;
use crate::model::Issue;

/// Encode the collection as human-readable JSON (2-space indent).
pub fn encode_pretty(issues: &[Issue]) -> Result<String, SnapshotError> {
    Ok(serde_json::to_string_pretty(issues)?)
}

/// Decode a collection previously produced by [`encode_pretty`].
pub fn decode(text: &str) -> Result<Vec<Issue>, SnapshotError> {
    Ok(serde_json::from_str(text)?)
}

/// Read and decode a persisted collection.
pub fn read_file(path: &Path) -> Result<Vec<Issue>, SnapshotError> {
    let text = std::fs::read_to_string(path)?;
    decode(&text)
}
