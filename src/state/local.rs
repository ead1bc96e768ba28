//! File-based workspace state backend.
//!
//! State is a pretty-printed JSON file written atomically through a temporary
//! sibling. The lock lives next to it as `<state file>.lock`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{GantryError, Result, StateError};

use super::lock::{LockInfo, generate_holder_id};
use super::store::StateStore;
use super::types::WorkspaceState;

/// Attempts at creating the lock file before giving up.
const LOCK_ATTEMPTS: usize = 3;

/// Local file-based state store.
#[derive(Debug, Clone)]
pub struct LocalStateStore {
    /// Path to the state file.
    state_path: PathBuf,
    /// Path to the lock file.
    lock_path: PathBuf,
}

impl LocalStateStore {
    /// Creates a store for the given state file.
    #[must_use]
    pub fn new(state_path: impl Into<PathBuf>) -> Self {
        let state_path = state_path.into();
        let mut lock_name = state_path.file_name().unwrap_or_default().to_os_string();
        lock_name.push(".lock");
        let lock_path = state_path.with_file_name(lock_name);

        Self {
            state_path,
            lock_path,
        }
    }

    /// Returns the state file path.
    #[must_use]
    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    /// Returns the lock file path.
    #[must_use]
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    async fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<Option<T>> {
        if !fs::try_exists(path).await? {
            return Ok(None);
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| StateError::corrupted(format!("Failed to read {what} file: {e}")))?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StateError::corrupted(format!("Failed to parse {what} file: {e}")).into())
    }

    /// Creates the lock file only if none exists. Returns false if one does.
    async fn create_lock_file(&self, content: &str) -> Result<bool> {
        if let Some(dir) = self.lock_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| StateError::write(format!("Failed to create state directory: {e}")))?;
        }

        let created = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.lock_path)
            .await;
        let mut file = match created {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => {
                return Err(StateError::LockFailed {
                    message: format!("Failed to create lock file: {e}"),
                }
                .into());
            }
        };
        let written = match file.write_all(content.as_bytes()).await {
            Ok(()) => file.sync_all().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = fs::remove_file(&self.lock_path).await;
            return Err(StateError::LockFailed {
                message: format!("Failed to write lock file: {e}"),
            }
            .into());
        }
        Ok(true)
    }

    async fn write_json<T: Serialize + Sync>(path: &Path, value: &T, what: &str) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| StateError::write(format!("Failed to create state directory: {e}")))?;
        }

        let content = serde_json::to_string_pretty(value)
            .map_err(|e| StateError::serialization(format!("Failed to serialize {what}: {e}")))?;

        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| StateError::write(format!("Failed to create {what} file: {e}")))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| StateError::write(format!("Failed to write {what} file: {e}")))?;
        file.sync_all()
            .await
            .map_err(|e| StateError::write(format!("Failed to sync {what} file: {e}")))?;

        fs::rename(&temp_path, path)
            .await
            .map_err(|e| StateError::write(format!("Failed to rename {what} file: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for LocalStateStore {
    async fn load(&self) -> Result<Option<WorkspaceState>> {
        let state = Self::read_json::<WorkspaceState>(&self.state_path, "state").await?;
        match &state {
            Some(state) => info!(
                "Loaded state with {} elements from: {}",
                state.element_count(),
                self.state_path.display()
            ),
            None => debug!("State file does not exist: {}", self.state_path.display()),
        }
        Ok(state)
    }

    async fn save(&self, state: &WorkspaceState) -> Result<()> {
        Self::write_json(&self.state_path, state, "state").await?;
        debug!("Saved state to: {}", self.state_path.display());
        Ok(())
    }

    async fn exists(&self) -> Result<bool> {
        Ok(fs::try_exists(&self.state_path).await?)
    }

    async fn acquire_lock(&self, holder: &str) -> Result<LockInfo> {
        let holder = if holder.is_empty() {
            generate_holder_id()
        } else {
            holder.to_string()
        };
        let lock = LockInfo::new(&holder);
        let content = serde_json::to_string_pretty(&lock)
            .map_err(|e| StateError::serialization(format!("Failed to serialize lock: {e}")))?;

        for _ in 0..LOCK_ATTEMPTS {
            if self.create_lock_file(&content).await? {
                info!("Acquired state lock {} for {holder}", lock.lock_id);
                return Ok(lock);
            }

            let existing = match self.get_lock_info().await {
                Ok(Some(existing)) => existing,
                // Removed by its holder in the meantime.
                Ok(None) => continue,
                // Created but not yet written by another process.
                Err(GantryError::State(StateError::Corrupted { .. })) => {
                    return Err(StateError::LockedByOther {
                        holder: String::from("unknown"),
                        since: String::from("unknown"),
                    }
                    .into());
                }
                Err(e) => return Err(e),
            };
            if !existing.is_expired() {
                return Err(StateError::LockedByOther {
                    holder: existing.holder,
                    since: existing.acquired_at.to_rfc3339(),
                }
                .into());
            }

            warn!("Taking over expired lock: {existing}");
            match fs::remove_file(&self.lock_path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(StateError::LockFailed {
                        message: format!("Failed to delete expired lock file: {e}"),
                    }
                    .into());
                }
            }
        }

        Err(StateError::LockFailed {
            message: format!("Lock file kept changing after {LOCK_ATTEMPTS} attempts"),
        }
        .into())
    }

    async fn release_lock(&self, lock_id: &str) -> Result<()> {
        match self.get_lock_info().await? {
            Some(existing) if existing.lock_id == lock_id => {
                fs::remove_file(&self.lock_path).await.map_err(|e| StateError::LockFailed {
                    message: format!("Failed to delete lock file: {e}"),
                })?;
                info!("Released state lock: {lock_id}");
            }
            Some(existing) => debug!("Lock {lock_id} was replaced by {}", existing.lock_id),
            None => debug!("Lock {lock_id} already released"),
        }
        Ok(())
    }

    async fn get_lock_info(&self) -> Result<Option<LockInfo>> {
        Self::read_json(&self.lock_path, "lock").await
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}
