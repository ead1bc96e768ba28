//! State management module for deploy runs.
//!
//! This module provides persistent storage of the workspace state: the last
//! deployed value of every element, element fingerprints, run history and an
//! advisory lock against concurrent runs.

mod fingerprint;
mod local;
mod lock;
mod persist;
mod store;
mod types;

pub use fingerprint::{canonical_json, fingerprint};
pub use local::LocalStateStore;
pub use lock::{LOCK_EXPIRY_SECS, LockInfo, generate_holder_id};
pub use persist::StatePersister;
pub use store::StateStore;
pub use types::{
    DeployHistoryEntry, DeployOperation, ElementState, MAX_HISTORY, STATE_VERSION, WorkspaceState,
};
