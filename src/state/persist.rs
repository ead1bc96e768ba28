//! Incremental persistence of applied changes.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::deploy::PostDeployAction;
use crate::element::Change;
use crate::error::Result;

use super::store::StateStore;
use super::types::{DeployHistoryEntry, WorkspaceState};

/// Post-deploy hook recording applied changes in the workspace state.
///
/// The state is saved after every group, so a crash mid-run loses at most
/// the group in flight. Calls from concurrent groups are serialized.
#[derive(Debug)]
pub struct StatePersister<S> {
    store: S,
    state: Mutex<WorkspaceState>,
}

impl<S: StateStore> StatePersister<S> {
    /// Creates a persister starting from `state`.
    #[must_use]
    pub fn new(store: S, state: WorkspaceState) -> Self {
        Self {
            store,
            state: Mutex::new(state),
        }
    }

    /// Creates a persister starting from the stored state, or an empty one.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored state cannot be read.
    pub async fn load(store: S) -> Result<Self> {
        let state = store.load().await?.unwrap_or_default();
        Ok(Self::new(store, state))
    }

    /// Returns the backing store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Returns a copy of the current state.
    pub async fn snapshot(&self) -> WorkspaceState {
        self.state.lock().await.clone()
    }

    /// Appends a history entry and saves the state.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be saved.
    pub async fn record_run(&self, entry: DeployHistoryEntry) -> Result<()> {
        let mut state = self.state.lock().await;
        state.add_history(entry);
        self.store.save(&state).await
    }

    /// Consumes the persister, returning the final state.
    pub fn into_state(self) -> WorkspaceState {
        self.state.into_inner()
    }
}

#[async_trait]
impl<S: StateStore> PostDeployAction for StatePersister<S> {
    async fn on_applied(&self, applied: &[Change]) -> Result<()> {
        if applied.is_empty() {
            return Ok(());
        }

        let mut state = self.state.lock().await;
        let recorded = state.apply_changes(applied)?;
        self.store.save(&state).await?;
        debug!("Persisted {recorded} applied changes");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ElemId, Element, Value};
    use crate::state::{DeployOperation, LocalStateStore};
    use serde_json::json;
    use tempfile::TempDir;

    fn add(name: &str) -> Change {
        Change::add(
            Element::new(
                ElemId::instance_id("salto", "Account", name),
                Value::from(json!({ "name": name })),
            )
            .shared(),
        )
    }

    #[tokio::test]
    async fn test_on_applied_saves_incrementally() {
        let temp = TempDir::new().expect("temp dir");
        let store = LocalStateStore::new(temp.path().join("state.json"));
        let persister = StatePersister::load(store.clone()).await.expect("load");

        persister.on_applied(&[add("a")]).await.expect("first group");
        let saved = store.load().await.expect("load").expect("saved");
        assert_eq!(saved.element_count(), 1);

        persister.on_applied(&[add("b"), add("c")]).await.expect("second group");
        persister.on_applied(&[]).await.expect("empty group");
        persister
            .record_run(DeployHistoryEntry::new("run-1", DeployOperation::Deploy, 3))
            .await
            .expect("history");

        let saved = store.load().await.expect("load").expect("saved");
        assert_eq!(saved.element_count(), 3);
        assert_eq!(saved.history.len(), 1);
        assert_eq!(persister.into_state(), saved);
    }

    #[tokio::test]
    async fn test_load_resumes_existing_state() {
        let temp = TempDir::new().expect("temp dir");
        let store = LocalStateStore::new(temp.path().join("state.json"));
        let mut existing = WorkspaceState::new();
        existing.apply_changes(&[add("old")]).expect("apply");
        store.save(&existing).await.expect("save");

        let persister = StatePersister::load(store).await.expect("load");
        persister.on_applied(&[add("new")]).await.expect("apply");

        assert_eq!(persister.snapshot().await.element_count(), 2);
    }
}
