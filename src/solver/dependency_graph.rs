//! Family dependency graph of a solved phase.
//!
//! Nodes are family names; an edge `a -> b` means the chosen variant of `a`
//! requires `b`. The graph is used to reject cyclic solutions and to order
//! the resolved packages so dependencies precede their dependents.

use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

/// Color states for cycle detection using DFS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Node has not been visited.
    White,
    /// Node is on the current DFS path.
    Gray,
    /// Node and its descendants are done.
    Black,
}

/// Directed graph over family names.
#[derive(Debug, Default)]
pub struct FamilyGraph {
    graph: DiGraph<String, ()>,
    node_map: HashMap<String, NodeIndex>,
}

impl FamilyGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_node(&mut self, family: &str) -> NodeIndex {
        if let Some(&index) = self.node_map.get(family) {
            index
        } else {
            let index = self.graph.add_node(family.to_string());
            self.node_map.insert(family.to_string(), index);
            index
        }
    }

    /// Add a family with no dependencies yet.
    pub fn add_node(&mut self, family: &str) {
        self.ensure_node(family);
    }

    /// Record that `from` requires `to`.
    pub fn add_dependency(&mut self, from: &str, to: &str) {
        let from_idx = self.ensure_node(from);
        let to_idx = self.ensure_node(to);
        if !self.graph.contains_edge(from_idx, to_idx) {
            self.graph.add_edge(from_idx, to_idx, ());
        }
    }

    /// True if `family` is a node.
    #[must_use]
    pub fn contains(&self, family: &str) -> bool {
        self.node_map.contains_key(family)
    }

    /// Number of families in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Find one cycle, returned as the families along it starting from the
    /// first one reached. The closing family is not repeated.
    #[must_use]
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut colors: HashMap<NodeIndex, Color> =
            self.graph.node_indices().map(|node| (node, Color::White)).collect();
        let mut path: Vec<NodeIndex> = Vec::new();

        for node in self.graph.node_indices() {
            if colors.get(&node) == Some(&Color::White) {
                if let Some(cycle) = self.dfs_visit(node, &mut colors, &mut path) {
                    return Some(cycle.into_iter().map(|idx| self.graph[idx].clone()).collect());
                }
            }
        }
        None
    }

    fn dfs_visit(
        &self,
        node: NodeIndex,
        colors: &mut HashMap<NodeIndex, Color>,
        path: &mut Vec<NodeIndex>,
    ) -> Option<Vec<NodeIndex>> {
        colors.insert(node, Color::Gray);
        path.push(node);

        // petgraph yields neighbors newest-first
        let mut neighbors: Vec<NodeIndex> = self.graph.neighbors(node).collect();
        neighbors.reverse();

        for neighbor in neighbors {
            match colors.get(&neighbor) {
                Some(Color::Gray) => {
                    let start = path.iter().position(|n| *n == neighbor).unwrap_or(0);
                    return Some(path[start..].to_vec());
                }
                Some(Color::White) => {
                    if let Some(cycle) = self.dfs_visit(neighbor, colors, path) {
                        return Some(cycle);
                    }
                }
                _ => {}
            }
        }

        path.pop();
        colors.insert(node, Color::Black);
        None
    }

    /// Every family reachable from `family`, excluding itself.
    #[must_use]
    pub fn transitive_deps(&self, family: &str) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();

        if let Some(&start) = self.node_map.get(family) {
            queue.push_back(start);
            while let Some(current) = queue.pop_front() {
                for neighbor in self.graph.neighbors(current) {
                    if seen.insert(neighbor) {
                        queue.push_back(neighbor);
                    }
                }
            }
            seen.remove(&start);
        }

        seen.into_iter().map(|idx| self.graph[idx].clone()).collect()
    }

    /// Order the graph's families as close to `preferred` as possible while
    /// placing every dependency before its dependents.
    ///
    /// Families in `preferred` that are not in the graph are skipped.
    /// Families in the graph but not in `preferred` are considered after
    /// them, in node insertion order.
    #[must_use]
    pub fn dependency_order(&self, preferred: &[String]) -> Vec<String> {
        let deps: HashMap<&str, HashSet<String>> =
            self.graph.node_weights().map(|family| (family.as_str(), self.transitive_deps(family))).collect();

        let listed: BTreeSet<&str> = preferred.iter().map(String::as_str).collect();
        let mut pending: VecDeque<&str> = preferred
            .iter()
            .map(String::as_str)
            .chain(self.graph.node_weights().map(String::as_str).filter(|f| !listed.contains(f)))
            .collect();

        let mut ordered: Vec<String> = Vec::new();
        while let Some(&family) = pending.front() {
            let Some(family_deps) = deps.get(family) else {
                pending.pop_front();
                continue;
            };
            if ordered.iter().any(|f| f == family) {
                pending.pop_front();
                continue;
            }

            match pending.iter().skip(1).position(|f| family_deps.contains(*f)) {
                Some(offset) => {
                    if let Some(dep) = pending.remove(offset + 1) {
                        pending.push_front(dep);
                    }
                }
                None => {
                    pending.pop_front();
                    ordered.push(family.to_string());
                }
            }
        }
        ordered
    }
}
