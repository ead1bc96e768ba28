//! Plan items: groups of changes deployed together.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::element::{Change, ElemId, read_element};

/// Graph-local identifier of a plan item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanItemId(String);

/// A node in the deploy graph: an ordered group of changes for one adapter.
#[derive(Debug, Clone)]
pub struct PlanItem {
    id: PlanItemId,
    group_key: String,
    changes: Vec<Change>,
}

impl PlanItemId {
    /// Creates a new identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PlanItemId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for PlanItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PlanItem {
    /// Creates a plan item.
    #[must_use]
    pub fn new(
        id: impl Into<PlanItemId>,
        group_key: impl Into<String>,
        changes: Vec<Change>,
    ) -> Self {
        Self {
            id: id.into(),
            group_key: group_key.into(),
            changes,
        }
    }

    /// Returns the item identifier.
    #[must_use]
    pub const fn id(&self) -> &PlanItemId {
        &self.id
    }

    /// Returns the group key used for reporting.
    #[must_use]
    pub fn group_key(&self) -> &str {
        &self.group_key
    }

    /// Returns the changes of this group, in order.
    #[must_use]
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Returns the ids of every changed element.
    #[must_use]
    pub fn elem_ids(&self) -> Vec<ElemId> {
        self.changes.iter().map(Change::elem_id).collect()
    }

    /// Returns the adapter owning this group, taken from its first change.
    #[must_use]
    pub fn adapter_name(&self) -> Option<String> {
        self.changes
            .first()
            .map(|change| read_element(change.data()).elem_id.adapter().to_string())
    }
}

impl fmt::Display for PlanItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} changes)", self.group_key, self.changes.len())
    }
}
