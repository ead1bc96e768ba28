//! Element changes.
//!
//! A change describes one element transition. Changes hold their before and
//! after states by shared reference, so patching an after state in place is
//! visible to every reference pointing into it.

use std::fmt;
use std::sync::Arc;

use crate::error::ElemIdError;

use super::elem_id::ElemId;
use super::value::{SharedElement, read_element};

/// The kind of transition a change describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeAction {
    /// The element is added.
    Add,
    /// The element is modified.
    Modify,
    /// The element is removed.
    Remove,
}

/// An immutable description of one element transition.
#[derive(Debug, Clone)]
pub enum Change {
    /// A new element.
    Add {
        /// State after the change.
        after: SharedElement,
    },
    /// An existing element with new values.
    Modify {
        /// State before the change.
        before: SharedElement,
        /// State after the change.
        after: SharedElement,
    },
    /// A deleted element.
    Remove {
        /// State before the change.
        before: SharedElement,
    },
}

impl Change {
    /// Creates an addition.
    #[must_use]
    pub const fn add(after: SharedElement) -> Self {
        Self::Add { after }
    }

    /// Creates a removal.
    #[must_use]
    pub const fn remove(before: SharedElement) -> Self {
        Self::Remove { before }
    }

    /// Creates a modification.
    ///
    /// # Errors
    ///
    /// Returns an error if the before and after states have different ids.
    pub fn modify(before: SharedElement, after: SharedElement) -> Result<Self, ElemIdError> {
        let before_id = read_element(&before).elem_id.clone();
        let after_id = read_element(&after).elem_id.clone();
        if before_id != after_id {
            return Err(ElemIdError::Mismatch {
                before: before_id.full_name(),
                after: after_id.full_name(),
            });
        }
        Ok(Self::Modify { before, after })
    }

    /// Returns the change action.
    #[must_use]
    pub const fn action(&self) -> ChangeAction {
        match self {
            Self::Add { .. } => ChangeAction::Add,
            Self::Modify { .. } => ChangeAction::Modify,
            Self::Remove { .. } => ChangeAction::Remove,
        }
    }

    /// Returns the state before the change, if any.
    #[must_use]
    pub const fn before(&self) -> Option<&SharedElement> {
        match self {
            Self::Add { .. } => None,
            Self::Modify { before, .. } | Self::Remove { before } => Some(before),
        }
    }

    /// Returns the state after the change, if any.
    #[must_use]
    pub const fn after(&self) -> Option<&SharedElement> {
        match self {
            Self::Add { after } | Self::Modify { after, .. } => Some(after),
            Self::Remove { .. } => None,
        }
    }

    /// Returns the element this change is about: the after state, or the
    /// before state for removals.
    #[must_use]
    pub const fn data(&self) -> &SharedElement {
        match self {
            Self::Add { after } | Self::Modify { after, .. } => after,
            Self::Remove { before } => before,
        }
    }

    /// Returns the id of the changed element.
    #[must_use]
    pub fn elem_id(&self) -> ElemId {
        read_element(self.data()).elem_id.clone()
    }

    /// Returns true for additions and modifications.
    #[must_use]
    pub const fn is_addition_or_modification(&self) -> bool {
        matches!(self, Self::Add { .. } | Self::Modify { .. })
    }

    /// Returns true if both changes share the same element data.
    #[must_use]
    pub fn shares_data_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(self.data(), other.data())
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Add => "add",
            Self::Modify => "modify",
            Self::Remove => "remove",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action(), self.elem_id())
    }
}
