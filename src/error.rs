//! Error types for the Gantry deploy engine.
//!
//! This module provides the error hierarchy for every stage of a deploy run:
//! configuration, state persistence, plan construction, adapter dispatch,
//! per-group deploy failures and the aggregate failure of a plan walk.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the Gantry deploy engine.
#[derive(Debug, Error)]
pub enum GantryError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// State management errors.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Plan construction errors.
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    /// Adapter errors.
    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    /// Element identifier errors.
    #[error("Element id error: {0}")]
    ElemId(#[from] ElemIdError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings file was not found.
    #[error("Settings file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The settings file could not be parsed.
    #[error("Failed to parse settings: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Settings validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// An environment override could not be interpreted.
    #[error("Invalid value for environment variable {name}: {value}")]
    InvalidEnvVar {
        /// Name of the variable.
        name: String,
        /// The rejected value.
        value: String,
    },
}

/// State management errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// State is corrupted.
    #[error("State is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// State lock acquisition failed.
    #[error("Failed to acquire state lock: {message}")]
    LockFailed {
        /// Description of the lock failure.
        message: String,
    },

    /// State lock is held by another process.
    #[error("State is locked by another process (lock holder: {holder}, since: {since})")]
    LockedByOther {
        /// Identifier of the lock holder.
        holder: String,
        /// When the lock was acquired.
        since: String,
    },

    /// Writing the state failed.
    #[error("Failed to write state: {message}")]
    WriteFailed {
        /// Description of the write failure.
        message: String,
    },

    /// Serialization error.
    #[error("State serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },
}

/// Errors raised while building a plan.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Two items share the same identifier.
    #[error("Duplicate plan item: {id}")]
    DuplicateItem {
        /// The duplicated identifier.
        id: String,
    },

    /// A plan item carries no changes.
    #[error("Plan item {id} has no changes")]
    EmptyGroup {
        /// Identifier of the empty item.
        id: String,
    },

    /// A plan item mixes changes of several adapters.
    #[error("Plan item {id} mixes adapters {first} and {other}")]
    MixedAdapters {
        /// Identifier of the item.
        id: String,
        /// Adapter of the first change.
        first: String,
        /// Adapter of the offending change.
        other: String,
    },

    /// A dependency references an unknown item.
    #[error("Unknown plan item: {id}")]
    UnknownItem {
        /// The unknown identifier.
        id: String,
    },
}

/// Errors returned by backend adapters.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The adapter does not implement the requested operation.
    #[error("Operation '{operation}' is not supported by this adapter")]
    Unsupported {
        /// Name of the unsupported operation.
        operation: &'static str,
    },

    /// The remote call failed before producing a result.
    #[error("Adapter request failed: {message}")]
    RequestFailed {
        /// Description of the failure.
        message: String,
    },
}

/// Errors raised when parsing element identifiers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ElemIdError {
    /// The identifier is missing required segments.
    #[error("Element id '{full_name}' must have at least an adapter and a type name")]
    TooShort {
        /// The rejected identifier.
        full_name: String,
    },

    /// A segment of the identifier is empty.
    #[error("Element id '{full_name}' contains an empty segment")]
    EmptySegment {
        /// The rejected identifier.
        full_name: String,
    },

    /// The id type segment is not known.
    #[error("Unknown id type '{id_type}' in element id '{full_name}'")]
    UnknownIdType {
        /// The rejected id type.
        id_type: String,
        /// The rejected identifier.
        full_name: String,
    },

    /// Two ids that must match do not.
    #[error("Element ids do not match: {before} != {after}")]
    Mismatch {
        /// Id of the before state.
        before: String,
        /// Id of the after state.
        after: String,
    },
}

/// Failure of a single plan item during a deploy run.
#[derive(Debug, Error)]
pub enum DeployActionError {
    /// No adapter is registered for the item's namespace.
    #[error("Missing adapter for {adapter}")]
    MissingAdapter {
        /// Adapter namespace of the item.
        adapter: String,
    },

    /// Check-only mode was requested but the adapter cannot validate.
    #[error("Check-only deployment is not supported in adapter {adapter}")]
    ValidateUnsupported {
        /// Adapter namespace of the item.
        adapter: String,
    },

    /// The adapter call itself failed.
    #[error("{0}")]
    Adapter(#[from] AdapterError),

    /// The adapter reported errors for the group.
    #[error("{message}")]
    GroupFailed {
        /// Group key of the failed item.
        group_key: String,
        /// Consolidated adapter error text.
        message: String,
    },

    /// The post-deploy hook failed.
    #[error("Post-deploy action failed: {0}")]
    PostDeploy(#[source] GantryError),

    /// The walker produced an id missing from the plan.
    #[error("Unknown plan item: {id}")]
    UnknownItem {
        /// The unknown item id.
        id: String,
    },
}

/// Outcome of a single node that did not complete successfully.
#[derive(Debug)]
pub enum NodeFailure<N, E> {
    /// The node's handler returned an error.
    Failed(E),
    /// The node never ran because a predecessor failed.
    Skipped {
        /// The failing ancestor that caused the skip.
        causing: N,
    },
}

/// Nodes that form one or more dependency cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircularDependencyError<N> {
    cycles: Vec<Vec<N>>,
}

/// Aggregate failure of a plan walk.
#[derive(Debug)]
pub struct WalkError<N, E> {
    node_errors: Vec<(N, NodeFailure<N, E>)>,
    circular: Option<CircularDependencyError<N>>,
}

/// Result type alias for Gantry operations.
pub type Result<T> = std::result::Result<T, GantryError>;

impl GantryError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Adapter(AdapterError::RequestFailed { .. })
                | Self::State(StateError::LockFailed { .. })
        )
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl StateError {
    /// Creates a corruption error with the given message.
    #[must_use]
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Creates a write error with the given message.
    #[must_use]
    pub fn write(message: impl Into<String>) -> Self {
        Self::WriteFailed {
            message: message.into(),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }
}

impl AdapterError {
    /// Creates a request failure.
    #[must_use]
    pub fn request(message: impl Into<String>) -> Self {
        Self::RequestFailed {
            message: message.into(),
        }
    }
}

impl DeployActionError {
    /// Returns true for capability errors that no retry can fix.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MissingAdapter { .. } | Self::ValidateUnsupported { .. }
        )
    }
}

impl<N, E> NodeFailure<N, E> {
    /// Returns true if the node was skipped rather than failed.
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

impl<N: fmt::Display, E: fmt::Display> fmt::Display for NodeFailure<N, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(error) => write!(f, "{error}"),
            Self::Skipped { causing } => write!(f, "Skipped due to an error in node {causing}"),
        }
    }
}

impl<N> CircularDependencyError<N> {
    /// Creates an error from the detected cycles.
    #[must_use]
    pub const fn new(cycles: Vec<Vec<N>>) -> Self {
        Self { cycles }
    }

    /// Returns every detected cycle.
    #[must_use]
    pub fn cycles(&self) -> &[Vec<N>] {
        &self.cycles
    }

    /// Returns every node participating in a cycle.
    pub fn node_ids(&self) -> impl Iterator<Item = &N> {
        self.cycles.iter().flatten()
    }
}

impl<N: fmt::Display> fmt::Display for CircularDependencyError<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Circular dependencies exist among these items: ")?;
        for (i, cycle) in self.cycles.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            let names: Vec<String> = cycle.iter().map(ToString::to_string).collect();
            write!(f, "{}", names.join(", "))?;
        }
        Ok(())
    }
}

impl<N: fmt::Debug + fmt::Display> std::error::Error for CircularDependencyError<N> {}

impl<N, E> WalkError<N, E> {
    /// Creates an aggregate error.
    #[must_use]
    pub const fn new(
        node_errors: Vec<(N, NodeFailure<N, E>)>,
        circular: Option<CircularDependencyError<N>>,
    ) -> Self {
        Self {
            node_errors,
            circular,
        }
    }

    /// Returns the per-node failures in graph order.
    #[must_use]
    pub fn node_errors(&self) -> &[(N, NodeFailure<N, E>)] {
        &self.node_errors
    }

    /// Consumes the error, returning its parts.
    #[must_use]
    pub fn into_parts(
        self,
    ) -> (
        Vec<(N, NodeFailure<N, E>)>,
        Option<CircularDependencyError<N>>,
    ) {
        (self.node_errors, self.circular)
    }

    /// Returns the circular dependency error, if any cycle was found.
    #[must_use]
    pub const fn circular_dependency(&self) -> Option<&CircularDependencyError<N>> {
        self.circular.as_ref()
    }
}

impl<N: PartialEq, E> WalkError<N, E> {
    /// Returns the failure recorded for a node.
    #[must_use]
    pub fn error_for(&self, id: &N) -> Option<&NodeFailure<N, E>> {
        self.node_errors
            .iter()
            .find(|(node, _)| node == id)
            .map(|(_, failure)| failure)
    }
}

impl<N: fmt::Display, E: fmt::Display> fmt::Display for WalkError<N, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Walk failed")?;
        for (id, failure) in &self.node_errors {
            write!(f, "\n  {id}: {failure}")?;
        }
        if let Some(circular) = &self.circular {
            write!(f, "\n  {circular}")?;
        }
        Ok(())
    }
}

impl<N: fmt::Debug + fmt::Display, E: fmt::Debug + fmt::Display> std::error::Error
    for WalkError<N, E>
{
}
