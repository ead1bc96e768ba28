//! State types for tracking deployed elements.
//!
//! These types record what the workspace last deployed: the value of every
//! element as the target system accepted it, plus a short run history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::element::{Change, ElemId, read_element};
use crate::error::Result;

use super::fingerprint::{canonical_json, fingerprint};

/// Current version of the state format.
pub const STATE_VERSION: &str = "1.0";

/// Number of history entries kept.
pub const MAX_HISTORY: usize = 100;

/// The complete workspace state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkspaceState {
    /// State format version.
    pub version: String,
    /// Deployed elements by full element id.
    #[serde(default)]
    pub elements: BTreeMap<String, ElementState>,
    /// When the state was last updated.
    pub last_updated: DateTime<Utc>,
    /// Recent deploy runs, oldest first.
    #[serde(default)]
    pub history: Vec<DeployHistoryEntry>,
}

/// Recorded state of one deployed element.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementState {
    /// Element id.
    pub elem_id: ElemId,
    /// Canonical JSON value; references are kept as `{"$ref": ...}`.
    pub value: serde_json::Value,
    /// SHA-256 fingerprint of id and value.
    pub fingerprint: String,
    /// When the element was last deployed.
    pub updated_at: DateTime<Utc>,
}

/// A single entry in the run history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeployHistoryEntry {
    /// Run identifier.
    pub run_id: String,
    /// When the run finished.
    pub timestamp: DateTime<Utc>,
    /// Kind of run.
    pub operation: DeployOperation,
    /// Number of applied changes.
    pub applied: usize,
    /// Messages of reported errors.
    #[serde(default)]
    pub errors: Vec<String>,
    /// Deployment URLs reported by adapters.
    #[serde(default)]
    pub deployment_urls: Vec<String>,
}

/// Kinds of deploy runs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeployOperation {
    /// Changes were deployed.
    Deploy,
    /// Changes were only validated.
    CheckOnly,
}

impl WorkspaceState {
    /// Creates a new empty workspace state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: STATE_VERSION.to_string(),
            elements: BTreeMap::new(),
            last_updated: Utc::now(),
            history: Vec::new(),
        }
    }

    /// Gets the recorded state of an element.
    #[must_use]
    pub fn get_element(&self, elem_id: &ElemId) -> Option<&ElementState> {
        self.elements.get(&elem_id.full_name())
    }

    /// Records one applied change. Removals drop the element.
    ///
    /// # Errors
    ///
    /// Returns an error if the element value cannot be serialized.
    pub fn apply_change(&mut self, change: &Change) -> Result<()> {
        let element = read_element(change.data());
        let key = element.elem_id.full_name();

        if change.is_addition_or_modification() {
            let value = canonical_json(&element.value)?;
            let state = ElementState {
                fingerprint: fingerprint(&element.elem_id, &value),
                elem_id: element.elem_id.clone(),
                value,
                updated_at: Utc::now(),
            };
            self.elements.insert(key, state);
        } else {
            self.elements.remove(&key);
        }
        self.last_updated = Utc::now();
        Ok(())
    }

    /// Records applied changes in order, returning how many were recorded.
    ///
    /// # Errors
    ///
    /// Returns an error if an element value cannot be serialized.
    pub fn apply_changes(&mut self, changes: &[Change]) -> Result<usize> {
        for change in changes {
            self.apply_change(change)?;
        }
        Ok(changes.len())
    }

    /// Adds a history entry, dropping the oldest beyond [`MAX_HISTORY`].
    pub fn add_history(&mut self, entry: DeployHistoryEntry) {
        if self.history.len() >= MAX_HISTORY {
            let excess = self.history.len() + 1 - MAX_HISTORY;
            self.history.drain(..excess);
        }
        self.history.push(entry);
        self.last_updated = Utc::now();
    }

    /// Returns the number of recorded elements.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }
}

impl Default for WorkspaceState {
    fn default() -> Self {
        Self::new()
    }
}

impl DeployHistoryEntry {
    /// Creates a history entry for a finished run.
    #[must_use]
    pub fn new(run_id: impl Into<String>, operation: DeployOperation, applied: usize) -> Self {
        Self {
            run_id: run_id.into(),
            timestamp: Utc::now(),
            operation,
            applied,
            errors: Vec::new(),
            deployment_urls: Vec::new(),
        }
    }

    /// Returns true if the run reported no errors.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for DeployOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            Self::Deploy => "deploy",
            Self::CheckOnly => "check_only",
        };
        write!(f, "{op}")
    }
}
