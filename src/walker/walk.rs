//! Concurrent topological walk over a dependency graph.
//!
//! Every node whose predecessors all succeeded is started immediately, so
//! independent nodes run overlapped on a single task. A failed node marks
//! its transitive dependents as skipped; nodes on a dependency cycle are
//! never started.

use futures::stream::{FuturesUnordered, StreamExt};
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use tracing::{debug, warn};

use crate::error::{CircularDependencyError, NodeFailure, WalkError};

use super::graph::DependencyGraph;

/// Execution state of a single node during a walk.
#[derive(Debug)]
pub enum NodeState<E> {
    /// Waiting for predecessors.
    Pending,
    /// Handler in flight.
    Running,
    /// Handler completed successfully.
    Succeeded,
    /// Handler returned an error.
    Failed(E),
    /// Not run because the node at the given index failed.
    Skipped(usize),
    /// Not run because the node is part of a dependency cycle.
    Circular,
}

/// Walks `graph` in dependency order, calling `handler` once per runnable node.
///
/// # Errors
///
/// Returns a [`WalkError`] describing every failed, skipped and circular
/// node if any node did not complete successfully.
pub async fn walk<N, E, F, Fut>(
    graph: &DependencyGraph<N>,
    handler: F,
) -> Result<(), WalkError<N, E>>
where
    N: Clone + Eq + Hash + fmt::Display,
    F: Fn(N) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    let mut states: Vec<NodeState<E>> = (0..graph.len()).map(|_| NodeState::Pending).collect();
    let mut waiting_on: Vec<usize> = (0..graph.len())
        .map(|idx| graph.predecessors(idx).len())
        .collect();

    let cycles = graph.find_cycles();
    for &idx in cycles.iter().flatten() {
        states[idx] = NodeState::Circular;
    }
    for &idx in cycles.iter().flatten() {
        skip_dependents(graph, &mut states, idx, idx);
    }
    if !cycles.is_empty() {
        warn!("Found {} dependency cycle(s), their nodes will not run", cycles.len());
    }

    let start = |idx: usize| {
        let node = handler(graph.node_id(idx).clone());
        async move { (idx, node.await) }
    };

    let mut in_flight = FuturesUnordered::new();
    for idx in 0..graph.len() {
        if waiting_on[idx] == 0 && matches!(states[idx], NodeState::Pending) {
            states[idx] = NodeState::Running;
            in_flight.push(start(idx));
        }
    }

    while let Some((idx, outcome)) = in_flight.next().await {
        match outcome {
            Ok(()) => {
                debug!("Node {} completed", graph.node_id(idx));
                states[idx] = NodeState::Succeeded;
                for &next in graph.successors(idx) {
                    waiting_on[next] = waiting_on[next].saturating_sub(1);
                    if waiting_on[next] == 0 && matches!(states[next], NodeState::Pending) {
                        states[next] = NodeState::Running;
                        in_flight.push(start(next));
                    }
                }
            }
            Err(error) => {
                debug!("Node {} failed", graph.node_id(idx));
                states[idx] = NodeState::Failed(error);
                skip_dependents(graph, &mut states, idx, idx);
            }
        }
    }

    collect_failures(graph, states, &cycles)
}

/// Marks every pending transitive dependent of `from` as skipped because of `causing`.
///
/// Nodes already skipped keep their first causing node.
fn skip_dependents<N, E>(
    graph: &DependencyGraph<N>,
    states: &mut [NodeState<E>],
    from: usize,
    causing: usize,
) {
    let mut stack = vec![from];
    while let Some(idx) = stack.pop() {
        for &next in graph.successors(idx) {
            if matches!(states[next], NodeState::Pending) {
                states[next] = NodeState::Skipped(causing);
                stack.push(next);
            }
        }
    }
}

fn collect_failures<N: Clone, E>(
    graph: &DependencyGraph<N>,
    states: Vec<NodeState<E>>,
    cycles: &[Vec<usize>],
) -> Result<(), WalkError<N, E>> {
    let node_errors: Vec<(N, NodeFailure<N, E>)> = states
        .into_iter()
        .enumerate()
        .filter_map(|(idx, state)| {
            let failure = match state {
                NodeState::Failed(error) => NodeFailure::Failed(error),
                NodeState::Skipped(causing) => NodeFailure::Skipped {
                    causing: graph.node_id(causing).clone(),
                },
                NodeState::Pending
                | NodeState::Running
                | NodeState::Succeeded
                | NodeState::Circular => return None,
            };
            Some((graph.node_id(idx).clone(), failure))
        })
        .collect();

    let circular = (!cycles.is_empty()).then(|| {
        CircularDependencyError::new(
            cycles
                .iter()
                .map(|cycle| cycle.iter().map(|&idx| graph.node_id(idx).clone()).collect())
                .collect(),
        )
    });

    if node_errors.is_empty() && circular.is_none() {
        Ok(())
    } else {
        Err(WalkError::new(node_errors, circular))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    fn graph(
        edges: &[(&'static str, &'static str)],
        nodes: &[&'static str],
    ) -> DependencyGraph<&'static str> {
        let mut graph = DependencyGraph::new();
        for node in nodes {
            graph.add_node(*node);
        }
        for (dependent, dependency) in edges {
            graph.add_dependency(*dependent, *dependency);
        }
        graph
    }

    #[tokio::test]
    async fn test_walk_respects_dependencies() {
        let g = graph(&[("b", "a"), ("c", "b"), ("d", "a")], &["a", "b", "c", "d"]);
        let visited = Mutex::new(Vec::new());

        let result: Result<(), WalkError<&str, String>> = walk(&g, |id| {
            let visited = &visited;
            async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                visited.lock().expect("lock").push(id);
                Ok(())
            }
        })
        .await;

        assert!(result.is_ok());
        let visited = visited.into_inner().expect("lock");
        let position = |n: &str| visited.iter().position(|v| *v == n).expect("visited");
        assert_eq!(visited.len(), 4);
        assert!(position("a") < position("b"));
        assert!(position("b") < position("c"));
        assert!(position("a") < position("d"));
    }

    #[tokio::test]
    async fn test_independent_nodes_overlap() {
        let g = graph(&[], &["slow", "fast"]);
        let finished = Mutex::new(Vec::new());

        let result: Result<(), WalkError<&str, String>> = walk(&g, |id| {
            let finished = &finished;
            async move {
                let delay = if id == "slow" { 30 } else { 1 };
                tokio::time::sleep(Duration::from_millis(delay)).await;
                finished.lock().expect("lock").push(id);
                Ok(())
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(finished.into_inner().expect("lock"), vec!["fast", "slow"]);
    }

    #[tokio::test]
    async fn test_failure_skips_transitive_dependents() {
        let g = graph(&[("b", "a"), ("c", "b"), ("e", "d")], &["a", "b", "c", "d", "e"]);
        let called = Mutex::new(Vec::new());

        let result = walk(&g, |id| {
            let called = &called;
            async move {
                called.lock().expect("lock").push(id);
                if id == "a" { Err(format!("{id} exploded")) } else { Ok(()) }
            }
        })
        .await;

        let error = result.expect_err("walk should fail");
        assert!(matches!(
            error.error_for(&"a"),
            Some(NodeFailure::Failed(msg)) if msg == "a exploded"
        ));
        assert!(matches!(error.error_for(&"b"), Some(NodeFailure::Skipped { causing: "a" })));
        assert!(matches!(error.error_for(&"c"), Some(NodeFailure::Skipped { causing: "a" })));
        assert!(error.error_for(&"d").is_none());
        assert!(error.circular_dependency().is_none());

        let mut called = called.into_inner().expect("lock");
        called.sort_unstable();
        assert_eq!(called, vec!["a", "d", "e"]);
    }

    #[tokio::test]
    async fn test_diamond_names_a_failing_ancestor() {
        let g = graph(&[("c", "a"), ("c", "b")], &["a", "b", "c"]);

        let result = walk(&g, |_id| async move { Err::<(), _>("boom".to_string()) }).await;

        let error = result.expect_err("walk should fail");
        let Some(NodeFailure::Skipped { causing }) = error.error_for(&"c") else {
            panic!("c should be skipped");
        };
        assert!(*causing == "a" || *causing == "b");
    }

    #[tokio::test]
    async fn test_cycle_is_isolated() {
        let g = graph(&[("a", "b"), ("b", "a"), ("x", "a")], &["a", "b", "d", "x"]);
        let called = Mutex::new(Vec::new());

        let result: Result<(), WalkError<&str, String>> = walk(&g, |id| {
            let called = &called;
            async move {
                called.lock().expect("lock").push(id);
                Ok(())
            }
        })
        .await;

        let error = result.expect_err("walk should fail");
        let circular = error.circular_dependency().expect("cycle reported");
        assert_eq!(circular.cycles(), &[vec!["a", "b"]]);
        assert!(matches!(error.error_for(&"x"), Some(NodeFailure::Skipped { causing: "a" })));
        assert!(error.error_for(&"a").is_none());
        assert_eq!(called.into_inner().expect("lock"), vec!["d"]);
    }

    #[tokio::test]
    async fn test_empty_graph_succeeds() {
        let g: DependencyGraph<&str> = DependencyGraph::new();
        let result: Result<(), WalkError<&str, String>> = walk(&g, |_| async { Ok(()) }).await;
        assert!(result.is_ok());
    }
}
