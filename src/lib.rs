// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![forbid(unsafe_code)]               // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![warn(dead_code)]                   // Unused code is reported
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![warn(unused_imports)]              // Unused imports are reported
#![warn(unused_variables)]            // Unused variables are reported
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Gantry Deploy
//!
//! The deploy engine of a configuration-as-code system: it executes a plan
//! of element changes against pluggable backend adapters, in dependency
//! order, while staying correct under partial failure.
//!
//! ## Overview
//!
//! - A [`planner::Plan`] is a DAG of plan items, each a group of changes for
//!   one adapter
//! - The [`walker`] runs every item as soon as all of its dependencies
//!   succeeded, concurrently with every other ready item
//! - A failed item causes its transitive dependents to be skipped; items on
//!   a dependency cycle never run
//! - Values an adapter applies (such as server-assigned ids) are merged back
//!   into the shared elements, so later items see them through references
//!
//! ## Modules
//!
//! - [`element`]: Element ids, values, references, changes and diffs
//! - [`walker`]: Dependency graph and concurrent walk engine
//! - [`planner`]: Plan items and plan construction
//! - [`deploy`]: Adapter contract and deploy orchestration
//! - [`state`]: Workspace state storage and incremental persistence
//! - [`deployer`]: Locked deploy runs with history
//! - [`config`]: Settings parsing and validation
//! - [`logging`]: `tracing` subscriber setup
//!
//! ## Example
//!
//! ```yaml
//! deploy:
//!   check_only: false
//!   max_concurrent_groups: 8
//! state:
//!   path: .gantry/state.json
//! logging:
//!   level: info
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod config;
pub mod deploy;
pub mod deployer;
pub mod element;
pub mod error;
pub mod logging;
pub mod planner;
pub mod state;
pub mod walker;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{DeploySettings, SettingsParser, SettingsValidator};
pub use deploy::{
    Adapter, AdapterRegistry, DeployOrchestrator, DeployOutcome, PostDeployAction,
    ProgressReporter, deploy_actions,
};
pub use deployer::{DeployReport, Deployer};
pub use element::{Change, ElemId, Element, SharedElement, Value};
pub use error::{GantryError, Result};
pub use logging::init_logging;
pub use planner::{Plan, PlanBuilder, PlanItem, PlanItemId};
pub use state::{LocalStateStore, StatePersister, StateStore, WorkspaceState};
