//! Index-based dependency graph.
//!
//! Nodes are stored once and addressed by index; edges are kept as ordered
//! predecessor and successor sets so that cycle detection, topological
//! ordering and skip propagation are pure algorithms over indices.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::hash::Hash;

/// A directed graph where an edge means "depends on".
#[derive(Debug, Clone)]
pub struct DependencyGraph<N> {
    ids: Vec<N>,
    index: HashMap<N, usize>,
    predecessors: Vec<BTreeSet<usize>>,
    successors: Vec<BTreeSet<usize>>,
}

impl<N: Clone + Eq + Hash> DependencyGraph<N> {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ids: Vec::new(),
            index: HashMap::new(),
            predecessors: Vec::new(),
            successors: Vec::new(),
        }
    }

    /// Adds a node, returning its index. Adding an existing node is a no-op.
    pub fn add_node(&mut self, id: N) -> usize {
        if let Some(&existing) = self.index.get(&id) {
            return existing;
        }
        let idx = self.ids.len();
        self.index.insert(id.clone(), idx);
        self.ids.push(id);
        self.predecessors.push(BTreeSet::new());
        self.successors.push(BTreeSet::new());
        idx
    }

    /// Records that `dependent` must run strictly after `dependency`.
    ///
    /// Missing nodes are added.
    pub fn add_dependency(&mut self, dependent: N, dependency: N) {
        let from = self.add_node(dependent);
        let to = self.add_node(dependency);
        self.predecessors[from].insert(to);
        self.successors[to].insert(from);
    }

    /// Returns the index of a node.
    #[must_use]
    pub fn index_of(&self, id: &N) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Returns true if the node exists.
    #[must_use]
    pub fn contains(&self, id: &N) -> bool {
        self.index.contains_key(id)
    }
}

impl<N> DependencyGraph<N> {
    /// Returns the number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Returns the id of the node at `idx`.
    #[must_use]
    pub fn node_id(&self, idx: usize) -> &N {
        &self.ids[idx]
    }

    /// Returns all node ids in insertion order.
    #[must_use]
    pub fn node_ids(&self) -> &[N] {
        &self.ids
    }

    /// Returns the nodes `idx` depends on.
    #[must_use]
    pub fn predecessors(&self, idx: usize) -> &BTreeSet<usize> {
        &self.predecessors[idx]
    }

    /// Returns the nodes depending on `idx`.
    #[must_use]
    pub fn successors(&self, idx: usize) -> &BTreeSet<usize> {
        &self.successors[idx]
    }

    /// Finds every dependency cycle.
    ///
    /// Each cycle is a strongly connected component with more than one node,
    /// or a single node depending on itself. Cycles and their members are
    /// returned in ascending index order.
    #[must_use]
    pub fn find_cycles(&self) -> Vec<Vec<usize>> {
        let mut finder = SccFinder::new(self.len());
        for idx in 0..self.len() {
            if finder.order[idx].is_none() {
                finder.visit(self, idx);
            }
        }

        let mut cycles: Vec<Vec<usize>> = finder
            .components
            .into_iter()
            .filter(|component| {
                component.len() > 1 || self.successors[component[0]].contains(&component[0])
            })
            .map(|mut component| {
                component.sort_unstable();
                component
            })
            .collect();
        cycles.sort_unstable();
        cycles
    }

    /// Returns a topological order of node indices, dependencies first.
    ///
    /// Ties are broken by insertion order.
    ///
    /// # Errors
    ///
    /// Returns the detected cycles if the graph is not acyclic.
    pub fn topological_order(&self) -> Result<Vec<usize>, Vec<Vec<usize>>> {
        let mut waiting: Vec<usize> = self.predecessors.iter().map(BTreeSet::len).collect();
        let mut ready: VecDeque<usize> = (0..self.len()).filter(|&i| waiting[i] == 0).collect();
        let mut order = Vec::with_capacity(self.len());

        while let Some(idx) = ready.pop_front() {
            order.push(idx);
            for &next in &self.successors[idx] {
                waiting[next] -= 1;
                if waiting[next] == 0 {
                    ready.push_back(next);
                }
            }
        }

        if order.len() == self.len() {
            Ok(order)
        } else {
            Err(self.find_cycles())
        }
    }
}

impl<N: Clone + Eq + Hash> Default for DependencyGraph<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Tarjan's strongly connected components over successor edges.
struct SccFinder {
    next_order: usize,
    order: Vec<Option<usize>>,
    low_link: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    components: Vec<Vec<usize>>,
}

impl SccFinder {
    fn new(size: usize) -> Self {
        Self {
            next_order: 0,
            order: vec![None; size],
            low_link: vec![0; size],
            on_stack: vec![false; size],
            stack: Vec::new(),
            components: Vec::new(),
        }
    }

    fn visit<N>(&mut self, graph: &DependencyGraph<N>, idx: usize) {
        self.order[idx] = Some(self.next_order);
        self.low_link[idx] = self.next_order;
        self.next_order += 1;
        self.stack.push(idx);
        self.on_stack[idx] = true;

        for &next in graph.successors(idx) {
            match self.order[next] {
                None => {
                    self.visit(graph, next);
                    self.low_link[idx] = self.low_link[idx].min(self.low_link[next]);
                }
                Some(next_order) if self.on_stack[next] => {
                    self.low_link[idx] = self.low_link[idx].min(next_order);
                }
                Some(_) => {}
            }
        }

        if Some(self.low_link[idx]) == self.order[idx] {
            let mut component = Vec::new();
            while let Some(member) = self.stack.pop() {
                self.on_stack[member] = false;
                component.push(member);
                if member == idx {
                    break;
                }
            }
            self.components.push(component);
        }
    }
}
