//! Run-level deploy driver.
//!
//! The deployer wraps one orchestrated deploy run in the workspace lock,
//! persists applied changes as groups finish and records the run in the
//! state history.

use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::DeploySettings;
use crate::deploy::{
    AdapterRegistry, DeployOrchestrator, DeployOutcome, NoopPostDeployAction, PostDeployAction,
    ProgressReporter,
};
use crate::error::Result;
use crate::planner::Plan;
use crate::state::{DeployHistoryEntry, DeployOperation, StatePersister, StateStore, WorkspaceState};

/// Drives deploy runs against a state store.
pub struct Deployer<'a, S: StateStore> {
    /// Run settings.
    settings: &'a DeploySettings,
    /// Adapters by namespace.
    adapters: &'a AdapterRegistry,
    /// Workspace state store.
    store: Arc<S>,
}

/// Result of a deploy run.
#[derive(Debug)]
pub struct DeployReport {
    /// Identifier of the run, as recorded in the history.
    pub run_id: String,
    /// Outcome of the orchestrated run.
    pub outcome: DeployOutcome,
    /// Workspace state after the run.
    pub state: WorkspaceState,
}

impl<'a, S: StateStore> Deployer<'a, S> {
    /// Creates a new deployer.
    #[must_use]
    pub const fn new(
        settings: &'a DeploySettings,
        adapters: &'a AdapterRegistry,
        store: Arc<S>,
    ) -> Self {
        Self {
            settings,
            adapters,
            store,
        }
    }

    /// Deploys `plan` while holding the workspace lock.
    ///
    /// Item failures do not fail the run; they are reported in the outcome.
    /// The lock is released even when the run itself fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be acquired or the state cannot
    /// be read or written.
    pub async fn deploy(
        &self,
        plan: &Plan,
        reporter: &dyn ProgressReporter,
    ) -> Result<DeployReport> {
        let holder = self.settings.state.lock_holder.as_deref().unwrap_or_default();
        let lock = self.store.acquire_lock(holder).await?;

        let result = self.run_locked(plan, reporter).await;

        match (self.store.release_lock(&lock.lock_id).await, result) {
            (Ok(()), result) => result,
            (Err(release_error), Ok(_)) => Err(release_error),
            (Err(release_error), Err(run_error)) => {
                error!("Failed to release state lock {}: {release_error}", lock.lock_id);
                Err(run_error)
            }
        }
    }

    async fn run_locked(
        &self,
        plan: &Plan,
        reporter: &dyn ProgressReporter,
    ) -> Result<DeployReport> {
        let run_id = Uuid::new_v4().to_string();
        let check_only = self.settings.deploy.check_only;
        info!(
            "Starting deploy run {run_id} ({} items, {} state)",
            plan.len(),
            self.store.backend_type()
        );

        let persister = StatePersister::load(Arc::clone(&self.store)).await?;
        let post_deploy: &dyn PostDeployAction = if check_only {
            &NoopPostDeployAction
        } else {
            &persister
        };

        let outcome = DeployOrchestrator::new(self.adapters)
            .with_check_only(check_only)
            .with_max_concurrent_groups(self.settings.deploy.max_concurrent_groups)
            .deploy_actions(plan, reporter, post_deploy)
            .await;

        let operation = if check_only {
            DeployOperation::CheckOnly
        } else {
            DeployOperation::Deploy
        };
        let mut entry =
            DeployHistoryEntry::new(run_id.clone(), operation, outcome.applied_changes.len());
        entry.errors = outcome.errors.iter().map(ToString::to_string).collect();
        entry.deployment_urls = outcome.extra_properties.deployment_urls.clone();
        persister.record_run(entry).await?;

        if outcome.is_success() {
            info!("Deploy run {run_id} succeeded");
        } else {
            warn!("Deploy run {run_id} finished with {} errors", outcome.errors.len());
        }

        Ok(DeployReport {
            run_id,
            outcome,
            state: persister.into_state(),
        })
    }

    /// Removes the workspace lock regardless of its holder.
    ///
    /// Returns the removed lock, if there was one.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be read or removed.
    pub async fn force_unlock(&self) -> Result<Option<String>> {
        let Some(lock) = self.store.get_lock_info().await? else {
            return Ok(None);
        };
        warn!("Force-releasing state lock {lock}");
        self.store.release_lock(&lock.lock_id).await?;
        Ok(Some(lock.lock_id))
    }
}
