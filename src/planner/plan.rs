//! The deploy plan: a DAG of plan items.

use std::collections::HashMap;
use std::future::Future;
use tracing::debug;

use crate::element::read_element;
use crate::error::{CircularDependencyError, PlanError, WalkError};
use crate::walker::{DependencyGraph, walk};

use super::item::{PlanItem, PlanItemId};

/// An immutable DAG over plan items. Edges mean "depends on".
#[derive(Debug)]
pub struct Plan {
    items: Vec<PlanItem>,
    by_id: HashMap<PlanItemId, usize>,
    graph: DependencyGraph<PlanItemId>,
}

/// Builder validating plan items and their dependencies.
#[derive(Debug, Default)]
pub struct PlanBuilder {
    items: Vec<PlanItem>,
    by_id: HashMap<PlanItemId, usize>,
    graph: DependencyGraph<PlanItemId>,
}

impl PlanBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an item to the plan.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is already used, the item has no changes,
    /// or its changes belong to more than one adapter.
    pub fn add_item(&mut self, item: PlanItem) -> Result<&mut Self, PlanError> {
        let id = item.id().clone();
        if self.by_id.contains_key(&id) {
            return Err(PlanError::DuplicateItem { id: id.to_string() });
        }

        let Some(first) = item.adapter_name() else {
            return Err(PlanError::EmptyGroup { id: id.to_string() });
        };
        for change in item.changes() {
            let element = read_element(change.data());
            let adapter = element.elem_id.adapter();
            if adapter != first {
                return Err(PlanError::MixedAdapters {
                    id: id.to_string(),
                    first,
                    other: adapter.to_string(),
                });
            }
        }

        self.graph.add_node(id.clone());
        self.by_id.insert(id, self.items.len());
        self.items.push(item);
        Ok(self)
    }

    /// Records that `dependent` must deploy strictly after `dependency`.
    ///
    /// # Errors
    ///
    /// Returns an error if either item is unknown.
    pub fn add_dependency(
        &mut self,
        dependent: impl Into<PlanItemId>,
        dependency: impl Into<PlanItemId>,
    ) -> Result<&mut Self, PlanError> {
        let dependent = dependent.into();
        let dependency = dependency.into();
        for id in [&dependent, &dependency] {
            if !self.by_id.contains_key(id) {
                return Err(PlanError::UnknownItem { id: id.to_string() });
            }
        }
        self.graph.add_dependency(dependent, dependency);
        Ok(self)
    }

    /// Finishes the plan.
    #[must_use]
    pub fn build(self) -> Plan {
        debug!("Built plan with {} items", self.items.len());
        Plan {
            items: self.items,
            by_id: self.by_id,
            graph: self.graph,
        }
    }
}

impl Plan {
    /// Returns the number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the plan has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Looks up an item by id.
    #[must_use]
    pub fn item(&self, id: &PlanItemId) -> Option<&PlanItem> {
        self.by_id.get(id).map(|&idx| &self.items[idx])
    }

    /// Returns all items in insertion order.
    #[must_use]
    pub fn items(&self) -> &[PlanItem] {
        &self.items
    }

    /// Returns the dependency graph over item ids.
    #[must_use]
    pub const fn graph(&self) -> &DependencyGraph<PlanItemId> {
        &self.graph
    }

    /// Returns the items in a deterministic dependency order.
    ///
    /// # Errors
    ///
    /// Returns the circular dependency error if the plan has cycles.
    pub fn items_by_eval_order(
        &self,
    ) -> Result<Vec<&PlanItem>, CircularDependencyError<PlanItemId>> {
        self.graph
            .topological_order()
            .map(|order| {
                order
                    .into_iter()
                    .filter_map(|idx| self.item(self.graph.node_id(idx)))
                    .collect()
            })
            .map_err(|cycles| {
                CircularDependencyError::new(
                    cycles
                        .into_iter()
                        .map(|cycle| {
                            cycle
                                .into_iter()
                                .map(|idx| self.graph.node_id(idx).clone())
                                .collect()
                        })
                        .collect(),
                )
            })
    }

    /// Walks the plan concurrently in dependency order.
    ///
    /// # Errors
    ///
    /// Returns the aggregate failure of every node that did not succeed.
    pub async fn walk_async<E, F, Fut>(&self, handler: F) -> Result<(), WalkError<PlanItemId, E>>
    where
        F: Fn(PlanItemId) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        walk(&self.graph, handler).await
    }
}
