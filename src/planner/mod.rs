//! Planning module for deploy runs.
//!
//! A plan is an immutable DAG of plan items, each an ordered group of
//! changes dispatched to one adapter. Plans are built by the caller and
//! walked by the deploy orchestrator.

mod item;
mod plan;

pub use item::{PlanItem, PlanItemId};
pub use plan::{Plan, PlanBuilder};
