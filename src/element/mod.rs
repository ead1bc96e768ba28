//! Element model for the deploy engine.
//!
//! This module defines addressable configuration elements, their values and
//! references, the changes describing their transitions, and the structural
//! diff used to merge deploy results back into shared elements.

mod change;
mod diff;
mod elem_id;
mod validation;
mod value;

pub use change::{Change, ChangeAction};
pub use diff::{DetailedChange, apply_detailed_changes, detailed_compare, merge_element};
pub use elem_id::{ElemId, ID_SEPARATOR, IdType};
pub use validation::{ChangeError, Severity, dependent_invalid_change_errors};
pub use value::{Element, ReferenceExpression, SharedElement, Value, read_element, write_element};
