//! Detection of changes that depend on invalid elements.
//!
//! Once some elements are known to be invalid, every changed element that
//! references one of them, directly or through other changed elements,
//! cannot be deployed either.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use tracing::debug;

use super::change::Change;
use super::elem_id::ElemId;
use super::value::read_element;

/// Severity of a change error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The change cannot be deployed.
    Error,
    /// The change can be deployed but deserves attention.
    Warning,
}

/// A problem found in a change before planning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeError {
    /// Element the error is about.
    pub elem_id: ElemId,
    /// Severity of the problem.
    pub severity: Severity,
    /// Short message.
    pub message: String,
    /// Longer explanation.
    pub detailed_message: String,
}

/// Returns an error for every change depending on an invalid element.
///
/// Changes whose own element is already in `invalid` are not reported again.
#[must_use]
pub fn dependent_invalid_change_errors(
    invalid: &HashSet<ElemId>,
    changes: &[Change],
) -> Vec<ChangeError> {
    let invalid_top_level: BTreeSet<ElemId> = invalid
        .iter()
        .map(|id| id.top_level_parent().0)
        .collect();

    let mut references: BTreeMap<ElemId, Vec<ElemId>> = BTreeMap::new();
    for change in changes {
        let element = read_element(change.data());
        references
            .entry(element.elem_id.top_level_parent().0)
            .or_default()
            .extend(element.referenced_ids());
    }

    // Propagate invalidity until a fixpoint; remember which invalid element
    // made each dependent invalid.
    let mut blamed: BTreeMap<ElemId, ElemId> = BTreeMap::new();
    let mut changed = true;
    while changed {
        changed = false;
        for (id, refs) in &references {
            if invalid_top_level.contains(id) || blamed.contains_key(id) {
                continue;
            }
            let culprit = refs
                .iter()
                .find(|r| invalid_top_level.contains(*r) || blamed.contains_key(*r));
            if let Some(culprit) = culprit {
                debug!("{id} depends on invalid element {culprit}");
                blamed.insert(id.clone(), culprit.clone());
                changed = true;
            }
        }
    }

    changes
        .iter()
        .filter_map(|change| {
            let elem_id = change.elem_id();
            let culprit = blamed.get(&elem_id.top_level_parent().0)?;
            Some(ChangeError {
                message: String::from("Element depends on an invalid element"),
                detailed_message: format!(
                    "Element {elem_id} cannot be deployed because it depends on {culprit}, which is invalid"
                ),
                elem_id,
                severity: Severity::Error,
            })
        })
        .collect()
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Error => "error",
            Self::Warning => "warning",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for ChangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.elem_id, self.severity, self.message)
    }
}
