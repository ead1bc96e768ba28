//! Element fingerprints for change detection.
//!
//! A fingerprint is the hex SHA-256 of an element's canonical JSON form.
//! Map keys are ordered, so equal values always hash the same.

use sha2::{Digest, Sha256};

use crate::element::{ElemId, Value};
use crate::error::{Result, StateError};

/// Serializes a value to its canonical JSON form.
///
/// # Errors
///
/// Returns an error if the value cannot be represented as JSON.
pub fn canonical_json(value: &Value) -> Result<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| StateError::serialization(format!("Failed to serialize value: {e}")).into())
}

/// Computes the fingerprint of an element.
///
/// The id takes part in the hash so equal values of different elements differ.
#[must_use]
pub fn fingerprint(elem_id: &ElemId, json: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(elem_id.full_name().as_bytes());
    hasher.update([0]);
    hasher.update(json.to_string().as_bytes());
    hex::encode(hasher.finalize())
}
