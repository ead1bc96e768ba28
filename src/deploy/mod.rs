//! Deploy orchestration.
//!
//! This module dispatches plan items to backend adapters:
//! - `adapter`: the adapter contract and registry
//! - `progress`: progress reporting and post-deploy hooks
//! - `result`: deploy errors and the aggregated outcome
//! - `orchestrator`: the concurrent deploy run itself

mod adapter;
mod orchestrator;
mod progress;
mod result;

pub use adapter::{Adapter, AdapterRegistry, ChangeGroup, DeployOptions, DeployResult};
pub use orchestrator::{DeployOrchestrator, deploy_actions};
pub use progress::{
    ItemStatus, NoopPostDeployAction, PostDeployAction, ProgressReporter, TracingProgressReporter,
};
pub use result::{DeployError, DeployErrorKind, DeployOutcome, ExtraProperties, GroupProperties};
