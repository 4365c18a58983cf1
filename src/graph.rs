//! Validated adjacency view over a registered node set.
//!
//! Nodes live in a flat arena indexed by registration order; edges point from
//! parent to child and are stored as indices, never as references to the
//! nodes themselves.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use crate::core::errors::GraphValidationError;

#[derive(Debug, Clone)]
pub struct DependencyGraph {
    dag: DiGraph<String, ()>,
    node_indices: HashMap<String, usize>,
    parents: Vec<Vec<usize>>,
    children: Vec<Vec<usize>>,
    layers: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Build and validate the graph from `(name, parents)` pairs given in
    /// registration order.
    ///
    /// Fails with `DuplicateNode` or `UnresolvedParent` while resolving names,
    /// and with `CycleDetected` if the resolved edges are not acyclic.
    pub fn build<'a, I, P>(nodes: I) -> Result<Self, GraphValidationError>
    where
        I: IntoIterator<Item = (&'a str, P)>,
        P: IntoIterator<Item = &'a String>,
    {
        let mut dag = DiGraph::<String, ()>::new();
        let mut node_indices = HashMap::new();
        let mut declared: Vec<(usize, Vec<&'a String>)> = Vec::new();

        for (name, parents) in nodes {
            if node_indices.contains_key(name) {
                return Err(GraphValidationError::duplicate(name));
            }
            let index = dag.add_node(name.to_string()).index();
            node_indices.insert(name.to_string(), index);
            declared.push((index, parents.into_iter().collect()));
        }

        let mut parents = vec![Vec::new(); dag.node_count()];
        let mut children = vec![Vec::new(); dag.node_count()];

        for (child, declared_parents) in &declared {
            for parent_name in declared_parents {
                let parent = *node_indices.get(parent_name.as_str()).ok_or_else(|| {
                    GraphValidationError::unresolved(
                        dag[NodeIndex::new(*child)].as_str(),
                        parent_name.as_str(),
                    )
                })?;
                if parents[*child].contains(&parent) {
                    continue;
                }
                dag.add_edge(NodeIndex::new(parent), NodeIndex::new(*child), ());
                parents[*child].push(parent);
                children[parent].push(*child);
            }
        }

        for list in parents.iter_mut().chain(children.iter_mut()) {
            list.sort_unstable();
        }

        let layers = kahn_layers(&parents, &children).ok_or_else(|| cycle_error(&dag))?;

        debug!(
            nodes = dag.node_count(),
            edges = dag.edge_count(),
            layers = layers.len(),
            "Dependency graph validated"
        );

        Ok(Self {
            dag,
            node_indices,
            parents,
            children,
            layers,
        })
    }

    pub fn len(&self) -> usize {
        self.dag.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.dag.node_count() == 0
    }

    pub fn edge_count(&self) -> usize {
        self.dag.edge_count()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.node_indices.get(name).copied()
    }

    pub fn name(&self, index: usize) -> &str {
        &self.dag[NodeIndex::new(index)]
    }

    pub fn parents(&self, index: usize) -> &[usize] {
        &self.parents[index]
    }

    pub fn children(&self, index: usize) -> &[usize] {
        &self.children[index]
    }

    pub fn parent_count(&self, index: usize) -> usize {
        self.parents[index].len()
    }

    /// Nodes without parents, in registration order.
    pub fn roots(&self) -> Vec<usize> {
        (0..self.len())
            .filter(|&index| self.parents[index].is_empty())
            .collect()
    }

    /// Every node after all of its parents; ties broken by registration order.
    pub fn topological_order(&self) -> Vec<&str> {
        self.layers
            .iter()
            .flatten()
            .map(|&index| self.name(index))
            .collect()
    }

    /// Nodes grouped by depth: layer `n` holds nodes whose longest path from
    /// a root has `n` edges.
    pub fn layers(&self) -> Vec<Vec<&str>> {
        self.layers
            .iter()
            .map(|layer| layer.iter().map(|&index| self.name(index)).collect())
            .collect()
    }

    /// Strict descendants of `index`, ascending.
    pub fn descendants(&self, index: usize) -> Vec<usize> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<usize> = self.children[index].clone();
        while let Some(next) = stack.pop() {
            if seen.insert(next) {
                stack.extend(self.children[next].iter().copied());
            }
        }
        seen.into_iter().collect()
    }
}

/// Kahn's algorithm, peeling zero in-degree nodes a layer at a time. Returns
/// `None` when some in-degree never reaches zero.
fn kahn_layers(parents: &[Vec<usize>], children: &[Vec<usize>]) -> Option<Vec<Vec<usize>>> {
    let mut in_degree: Vec<usize> = parents.iter().map(Vec::len).collect();
    let mut current: Vec<usize> = (0..in_degree.len())
        .filter(|&index| in_degree[index] == 0)
        .collect();
    let mut layers = Vec::new();
    let mut visited = 0;

    while !current.is_empty() {
        visited += current.len();
        let mut next = BTreeSet::new();
        for &index in &current {
            for &child in &children[index] {
                in_degree[child] -= 1;
                if in_degree[child] == 0 {
                    next.insert(child);
                }
            }
        }
        layers.push(current);
        current = next.into_iter().collect();
    }

    (visited == parents.len()).then_some(layers)
}

fn cycle_error(dag: &DiGraph<String, ()>) -> GraphValidationError {
    let cyclic = tarjan_scc(dag).into_iter().find(|component| {
        component.len() > 1 || dag.contains_edge(component[0], component[0])
    });
    match cyclic {
        Some(component) => {
            GraphValidationError::cycle(component.into_iter().map(|index| dag[index].clone()))
        }
        None => GraphValidationError::cycle(Vec::<String>::new()),
    }
}
