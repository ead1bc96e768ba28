//! Backend adapter contract.
//!
//! One adapter serves one namespace of element ids. The deploy engine only
//! needs `deploy`, plus `validate` for check-only runs when the adapter
//! declares that capability.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::element::Change;
use crate::error::AdapterError;

use super::result::{DeployError, ExtraProperties};

/// A group of changes dispatched to an adapter in one call.
#[derive(Debug, Clone)]
pub struct ChangeGroup {
    /// Group key of the plan item.
    pub group_id: String,
    /// Changes of the group, in plan order.
    pub changes: Vec<Change>,
}

/// Options passed to [`Adapter::deploy`] and [`Adapter::validate`].
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// The group to deploy.
    pub change_group: ChangeGroup,
}

/// Adapter output for one group.
#[derive(Debug, Clone, Default)]
pub struct DeployResult {
    /// Changes the adapter committed, carrying authoritative after values.
    pub applied_changes: Vec<Change>,
    /// Problems reported by the adapter.
    pub errors: Vec<DeployError>,
    /// Follow-up information such as deployment URLs.
    pub extra_properties: ExtraProperties,
}

/// A backend implementing deploy for one target system.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Applies a group of changes to the target system.
    async fn deploy(&self, options: DeployOptions) -> Result<DeployResult, AdapterError>;

    /// Returns true if [`Adapter::validate`] is implemented.
    fn supports_validate(&self) -> bool {
        false
    }

    /// Dry-runs a group of changes without mutating remote state.
    async fn validate(&self, _options: DeployOptions) -> Result<DeployResult, AdapterError> {
        Err(AdapterError::Unsupported {
            operation: "validate",
        })
    }
}

/// Adapters by namespace.
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn Adapter>>,
}

impl AdapterRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter, returning the registry.
    #[must_use]
    pub fn with_adapter(mut self, name: impl Into<String>, adapter: Arc<dyn Adapter>) -> Self {
        self.register(name, adapter);
        self
    }

    /// Registers an adapter, replacing any previous one for the namespace.
    pub fn register(&mut self, name: impl Into<String>, adapter: Arc<dyn Adapter>) {
        self.adapters.insert(name.into(), adapter);
    }

    /// Returns the adapter for a namespace.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Adapter>> {
        self.adapters.get(name)
    }

    /// Returns the registered namespaces, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of registered adapters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Returns true if no adapter is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("adapters", &self.names())
            .finish()
    }
}
