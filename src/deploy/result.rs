//! Results of a deploy run.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::element::{Change, ElemId};

/// Why an element was reported in a deploy run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployErrorKind {
    /// The element's group failed to deploy.
    Failed,
    /// The element was not deployed because a group it depends on failed.
    Dependency,
    /// The element's group is part of a dependency cycle.
    CircularDependency,
}

/// A user-facing problem tied to one or more elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployError {
    /// Elements the problem is about.
    pub elem_ids: Vec<ElemId>,
    /// Human-readable message.
    pub message: String,
    /// Kind of problem.
    pub kind: DeployErrorKind,
}

/// Follow-up information for one deployed group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupProperties {
    /// Group identifier on the target system.
    pub id: String,
    /// Request identifier, if the target system issued one.
    #[serde(default)]
    pub request_id: Option<String>,
    /// Link to the deployment on the target system.
    #[serde(default)]
    pub url: Option<String>,
}

/// Additional properties reported by adapters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraProperties {
    /// URLs where the user can follow up on deployments.
    #[serde(default)]
    pub deployment_urls: Vec<String>,
    /// Per-group follow-up information.
    #[serde(default)]
    pub groups: Vec<GroupProperties>,
}

/// Final result of a deploy run.
#[derive(Debug, Default)]
pub struct DeployOutcome {
    /// Every failed, skipped and circular element.
    pub errors: Vec<DeployError>,
    /// Every change actually applied, including before a failure.
    pub applied_changes: Vec<Change>,
    /// Aggregated adapter properties.
    pub extra_properties: ExtraProperties,
}

impl DeployError {
    /// Creates an error for a failed group.
    #[must_use]
    pub fn failed(elem_ids: Vec<ElemId>, message: impl Into<String>) -> Self {
        Self {
            elem_ids,
            message: message.into(),
            kind: DeployErrorKind::Failed,
        }
    }

    /// Creates an error for a group skipped because of a failed dependency.
    #[must_use]
    pub fn dependency(elem_ids: Vec<ElemId>, message: impl Into<String>) -> Self {
        Self {
            elem_ids,
            message: message.into(),
            kind: DeployErrorKind::Dependency,
        }
    }

    /// Creates an error for a group on a dependency cycle.
    #[must_use]
    pub fn circular(elem_ids: Vec<ElemId>, message: impl Into<String>) -> Self {
        Self {
            elem_ids,
            message: message.into(),
            kind: DeployErrorKind::CircularDependency,
        }
    }
}

impl ExtraProperties {
    /// Appends another set of properties, preserving order.
    pub fn extend(&mut self, other: &Self) {
        self.deployment_urls.extend(other.deployment_urls.iter().cloned());
        self.groups.extend(other.groups.iter().cloned());
    }

    /// Returns true if nothing was reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deployment_urls.is_empty() && self.groups.is_empty()
    }
}

impl DeployOutcome {
    /// Returns true if no element failed or was skipped.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of skipped-due-to-dependency errors.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.errors
            .iter()
            .filter(|e| e.kind == DeployErrorKind::Dependency)
            .count()
    }
}

impl fmt::Display for DeployErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Failed => "failed",
            Self::Dependency => "dependency",
            Self::CircularDependency => "circular dependency",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for DeployError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.elem_ids.iter().map(ElemId::full_name).collect();
        write!(f, "[{}] {}: {}", self.kind, ids.join(", "), self.message)
    }
}

impl fmt::Display for DeployOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Deploy finished: {} changes applied, {} errors ({} skipped)",
            self.applied_changes.len(),
            self.errors.len(),
            self.skipped_count()
        )
    }
}
