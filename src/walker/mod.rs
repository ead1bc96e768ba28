//! Generic dependency-graph walker.
//!
//! The walker knows nothing about deployments: it schedules an async
//! handler per node in topological order and aggregates per-node outcomes.

mod graph;
mod walk;

pub use graph::DependencyGraph;
pub use walk::{NodeState, walk};
