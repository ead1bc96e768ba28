//! Progress and post-deploy callbacks.
//!
//! Both callbacks may be invoked concurrently from independent plan items;
//! calls for a single item are serialized.

use async_trait::async_trait;
use std::fmt;
use tracing::{error, info, warn};

use crate::element::Change;
use crate::error::Result;
use crate::planner::PlanItem;

/// Lifecycle status of a plan item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemStatus {
    /// Dispatch is about to start.
    Started,
    /// The group deployed without errors.
    Finished,
    /// The group failed.
    Error,
    /// The group was skipped because a dependency failed.
    Cancelled,
}

/// Sink for item lifecycle transitions.
pub trait ProgressReporter: Send + Sync {
    /// Reports a transition; `details` carries the error message for
    /// [`ItemStatus::Error`] and the causing group key for [`ItemStatus::Cancelled`].
    fn report(&self, item: &PlanItem, status: ItemStatus, details: Option<&str>);
}

/// Hook invoked with the applied changes of every dispatched group.
#[async_trait]
pub trait PostDeployAction: Send + Sync {
    /// Called once per dispatched group, before it is reported finished.
    async fn on_applied(&self, applied: &[Change]) -> Result<()>;
}

/// Reports progress through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgressReporter;

/// A post-deploy hook that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPostDeployAction;

impl ProgressReporter for TracingProgressReporter {
    fn report(&self, item: &PlanItem, status: ItemStatus, details: Option<&str>) {
        let details = details.unwrap_or_default();
        match status {
            ItemStatus::Started | ItemStatus::Finished => {
                info!(group = item.group_key(), "{status} {item}");
            }
            ItemStatus::Error => error!(group = item.group_key(), "{status} {item}: {details}"),
            ItemStatus::Cancelled => {
                warn!(group = item.group_key(), "{status} {item}: depends on {details}");
            }
        }
    }
}

#[async_trait]
impl PostDeployAction for NoopPostDeployAction {
    async fn on_applied(&self, _applied: &[Change]) -> Result<()> {
        Ok(())
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Started => "started",
            Self::Finished => "finished",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}
