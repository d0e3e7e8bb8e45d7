//! UnitGraph - the dependency graph over registered units.
//!
//! Built once resolution has filled in every unit's resolved dependencies.
//! An edge `a -> b` means "a depends on b".

use std::collections::{BTreeSet, HashMap};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::core::{Registry, TargetName};

/// Directed dependency graph keyed by target name.
#[derive(Debug, Clone, Default)]
pub struct UnitGraph {
    graph: DiGraph<TargetName, ()>,
    nodes: HashMap<TargetName, NodeIndex>,
}

impl UnitGraph {
    /// Build the graph from every unit's resolved dependencies.
    pub fn build(registry: &Registry) -> Self {
        let mut graph = UnitGraph::default();

        for name in registry.names() {
            graph.add_unit(name.clone());
        }

        for unit in registry.units() {
            for dep in &unit.resolved_dependencies {
                graph.add_edge(&unit.target, dep);
            }
        }

        graph
    }

    fn add_unit(&mut self, name: TargetName) {
        if self.nodes.contains_key(&name) {
            return;
        }
        let node = self.graph.add_node(name.clone());
        self.nodes.insert(name, node);
    }

    fn add_edge(&mut self, from: &TargetName, to: &TargetName) {
        if let (Some(&from_node), Some(&to_node)) = (self.nodes.get(from), self.nodes.get(to)) {
            self.graph.update_edge(from_node, to_node, ());
        }
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Every edge as a `(dependent, dependency)` pair, sorted.
    pub fn edges(&self) -> BTreeSet<(TargetName, TargetName)> {
        self.graph
            .raw_edges()
            .iter()
            .map(|e| {
                (
                    self.graph[e.source()].clone(),
                    self.graph[e.target()].clone(),
                )
            })
            .collect()
    }

    /// Direct dependencies of a unit, sorted.
    pub fn dependencies(&self, name: &str) -> Vec<&TargetName> {
        self.neighbors(name, Direction::Outgoing)
    }

    /// Units that directly depend on the given unit, sorted.
    pub fn dependents(&self, name: &str) -> Vec<&TargetName> {
        self.neighbors(name, Direction::Incoming)
    }

    fn neighbors(&self, name: &str, direction: Direction) -> Vec<&TargetName> {
        let Some(&node) = self.nodes.get(name) else {
            return Vec::new();
        };
        let mut names: Vec<&TargetName> = self
            .graph
            .neighbors_directed(node, direction)
            .map(|n| &self.graph[n])
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Every unit that depends on the given unit, directly or not.
    /// The unit itself is excluded even when it sits on a cycle.
    pub fn transitive_dependents(&self, name: &str) -> BTreeSet<TargetName> {
        let mut visited = BTreeSet::new();
        let mut stack: Vec<&TargetName> = self.dependents(name);

        while let Some(current) = stack.pop() {
            if current.as_str() == name || !visited.insert(current.clone()) {
                continue;
            }
            stack.extend(self.dependents(current.as_str()));
        }

        visited
    }

    /// Groups of units that sit on a dependency cycle.
    ///
    /// Members of each group are sorted, and the groups are sorted by their
    /// first member.
    pub fn cycles(&self) -> Vec<Vec<TargetName>> {
        let mut cycles: Vec<Vec<TargetName>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1 || scc.iter().any(|&n| self.graph.contains_edge(n, n))
            })
            .map(|scc| {
                let mut members: Vec<TargetName> =
                    scc.into_iter().map(|n| self.graph[n].clone()).collect();
                members.sort();
                members
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// Units in dependency-first order.
    ///
    /// Kahn's algorithm with ties broken by name, so the order is the same
    /// for the same registry. Units on a cycle cannot be ordered; they are
    /// appended at the end in name order.
    pub fn topological_order(&self) -> Vec<TargetName> {
        let mut pending: HashMap<NodeIndex, usize> = HashMap::new();
        let mut ready: BTreeSet<(&TargetName, NodeIndex)> = BTreeSet::new();

        for node in self.graph.node_indices() {
            let deps = self
                .graph
                .neighbors_directed(node, Direction::Outgoing)
                .count();
            if deps == 0 {
                ready.insert((&self.graph[node], node));
            } else {
                pending.insert(node, deps);
            }
        }

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some((name, node)) = ready.pop_first() {
            order.push(name.clone());

            for dependent in self.graph.neighbors_directed(node, Direction::Incoming) {
                if let Some(count) = pending.get_mut(&dependent) {
                    *count -= 1;
                    if *count == 0 {
                        pending.remove(&dependent);
                        ready.insert((&self.graph[dependent], dependent));
                    }
                }
            }
        }

        if !pending.is_empty() {
            let mut rest: Vec<TargetName> =
                pending.keys().map(|&n| self.graph[n].clone()).collect();
            rest.sort();
            tracing::debug!("{} units could not be ordered", rest.len());
            order.extend(rest);
        }

        order
    }
}
