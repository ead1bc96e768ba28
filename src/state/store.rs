//! Storage seam for workspace state.
//!
//! A deploy run reads the last recorded workspace state once, saves it after
//! every applied group and holds the workspace lock for its whole duration.
//! [`StateStore`] is what the deployer needs from a backend to do that.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;

use super::lock::LockInfo;
use super::types::WorkspaceState;

/// Where a workspace keeps its deployed-element record and its lock.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Reads the recorded workspace state, or `None` before the first deploy.
    async fn load(&self) -> Result<Option<WorkspaceState>>;

    /// Replaces the recorded workspace state.
    ///
    /// Called after each applied group, so a crash loses at most one group.
    async fn save(&self, state: &WorkspaceState) -> Result<()>;

    /// Whether a workspace state has been recorded.
    async fn exists(&self) -> Result<bool>;

    /// Takes the workspace lock for `holder`.
    ///
    /// Fails with `LockedByOther` while an unexpired lock is held. An empty
    /// `holder` is replaced by a generated host and process identifier.
    async fn acquire_lock(&self, holder: &str) -> Result<LockInfo>;

    /// Drops the workspace lock if `lock_id` still owns it.
    async fn release_lock(&self, lock_id: &str) -> Result<()>;

    /// Reads the current workspace lock, if any.
    async fn get_lock_info(&self) -> Result<Option<LockInfo>>;

    /// Short backend name used in log lines.
    fn backend_type(&self) -> &'static str;
}

#[async_trait]
impl<S: StateStore + ?Sized> StateStore for Arc<S> {
    async fn load(&self) -> Result<Option<WorkspaceState>> {
        (**self).load().await
    }

    async fn save(&self, state: &WorkspaceState) -> Result<()> {
        (**self).save(state).await
    }

    async fn exists(&self) -> Result<bool> {
        (**self).exists().await
    }

    async fn acquire_lock(&self, holder: &str) -> Result<LockInfo> {
        (**self).acquire_lock(holder).await
    }

    async fn release_lock(&self, lock_id: &str) -> Result<()> {
        (**self).release_lock(lock_id).await
    }

    async fn get_lock_info(&self) -> Result<Option<LockInfo>> {
        (**self).get_lock_info().await
    }

    fn backend_type(&self) -> &'static str {
        (**self).backend_type()
    }
}
