//! Diagnostic graph of a phase.
//!
//! The graph shows requests, scopes and how they relate. A failed phase
//! additionally carries the edges that explain the failure: conflicts,
//! reductions and cycles. [`GraphBuilder`] assembles the graph on `petgraph`
//! and exports it as a plain, serializable [`ResolveGraph`].

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Write as _;

/// What a node stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// A request from the initial request list
    InitialRequest,
    /// A request made by a package or produced by extraction
    Request,
    /// A scope with candidates left
    Scope,
    /// A scope narrowed to one variant
    SolvedScope,
    /// A scope holding only a conflict request
    ConflictScope,
    /// A dependency that reduced several variants away
    Reduction,
}

/// What an edge stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Source requires, or resolves to, the target
    Requires,
    /// A scope's common dependency was extracted
    VariantChoice,
    /// A variant was reduced away by the target dependency
    Reduce,
    /// Source and target cannot both hold
    Conflict,
    /// Part of a dependency cycle
    Cycle,
}

/// A graph node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    /// Position in [`ResolveGraph::nodes`]
    pub id: usize,
    /// Request or scope text
    pub label: String,
    /// Node category
    pub kind: NodeKind,
}

/// A directed graph edge between two node ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    /// Source node id
    pub source: usize,
    /// Target node id
    pub target: usize,
    /// Edge category
    pub kind: EdgeKind,
    /// Optional annotation, such as the reduced variant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Exported diagnostic graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolveGraph {
    /// Nodes, indexed by id
    pub nodes: Vec<GraphNode>,
    /// Edges between node ids
    pub edges: Vec<GraphEdge>,
}

impl ResolveGraph {
    /// True if the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The first node with `label`.
    #[must_use]
    pub fn node(&self, label: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.label == label)
    }

    /// The edge between the nodes labelled `source` and `target`.
    #[must_use]
    pub fn edge(&self, source: &str, target: &str) -> Option<&GraphEdge> {
        let source = self.node(source)?.id;
        let target = self.node(target)?.id;
        self.edges.iter().find(|e| e.source == source && e.target == target)
    }

    /// Edges of one kind.
    pub fn edges_of_kind(&self, kind: EdgeKind) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(move |e| e.kind == kind)
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns the serializer's error.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Graphviz text, with conflict and cycle edges in red.
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph resolve {\n");
        for node in &self.nodes {
            let style = match node.kind {
                NodeKind::InitialRequest | NodeKind::Request | NodeKind::ConflictScope | NodeKind::Reduction => {
                    "filled,dashed"
                }
                NodeKind::Scope | NodeKind::SolvedScope => "filled",
            };
            let color = match node.kind {
                NodeKind::InitialRequest => "#FFFFAA",
                NodeKind::SolvedScope => "#AAFFAA",
                _ => "#F6F6F6",
            };
            let _ = writeln!(
                out,
                "    n{} [label=\"{}\", style=\"{style}\", fillcolor=\"{color}\"];",
                node.id,
                node.label.replace('"', "\\\"")
            );
        }
        for edge in &self.edges {
            let label = match (edge.kind, &edge.label) {
                (_, Some(label)) => format!(" label=\"{label}\""),
                (EdgeKind::Conflict, None) => " label=\"CONFLICT\"".to_string(),
                (EdgeKind::Cycle, None) => " label=\"CYCLE\"".to_string(),
                _ => String::new(),
            };
            let color = match edge.kind {
                EdgeKind::Conflict | EdgeKind::Cycle => " color=red fontcolor=red style=bold",
                _ => "",
            };
            let _ = writeln!(out, "    n{} -> n{} [{}{}];", edge.source, edge.target, label.trim_start(), color);
        }
        out.push_str("}\n");
        out
    }
}

#[derive(Debug, Clone)]
struct EdgeData {
    kind: EdgeKind,
    label: Option<String>,
}

/// Incrementally built diagnostic graph.
#[derive(Debug, Default)]
pub(crate) struct GraphBuilder {
    graph: DiGraph<(String, NodeKind), EdgeData>,
    failure_nodes: HashSet<NodeIndex>,
}

impl GraphBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_node(&mut self, label: impl Into<String>, kind: NodeKind) -> NodeIndex {
        self.graph.add_node((label.into(), kind))
    }

    pub(crate) fn set_kind(&mut self, node: NodeIndex, kind: NodeKind) {
        if let Some(weight) = self.graph.node_weight_mut(node) {
            weight.1 = kind;
        }
    }

    /// Add an edge, replacing any existing edge between the same nodes.
    pub(crate) fn add_edge(&mut self, source: NodeIndex, target: NodeIndex, kind: EdgeKind, label: Option<String>) {
        self.graph.update_edge(source, target, EdgeData {
            kind,
            label,
        });
    }

    pub(crate) fn has_out_edges(&self, node: NodeIndex) -> bool {
        self.graph.neighbors(node).next().is_some()
    }

    pub(crate) fn mark_failed(&mut self, node: NodeIndex) {
        self.failure_nodes.insert(node);
    }

    /// Export the graph. With `prune`, nodes from which no failure node is
    /// reachable are dropped; a graph without failure nodes is kept whole.
    pub(crate) fn finish(self, prune: bool) -> ResolveGraph {
        let keep: HashSet<NodeIndex> = if prune && !self.failure_nodes.is_empty() {
            self.graph
                .node_indices()
                .filter(|&start| {
                    let mut dfs = Dfs::new(&self.graph, start);
                    while let Some(node) = dfs.next(&self.graph) {
                        if self.failure_nodes.contains(&node) {
                            return true;
                        }
                    }
                    false
                })
                .collect()
        } else {
            self.graph.node_indices().collect()
        };

        let pruned = self.graph.filter_map(
            |index, weight| keep.contains(&index).then(|| weight.clone()),
            |_, edge| Some(edge.clone()),
        );

        ResolveGraph {
            nodes: pruned
                .node_indices()
                .map(|index| {
                    let (label, kind) = &pruned[index];
                    GraphNode {
                        id: index.index(),
                        label: label.clone(),
                        kind: *kind,
                    }
                })
                .collect(),
            edges: pruned
                .edge_indices()
                .filter_map(|edge| {
                    let (source, target) = pruned.edge_endpoints(edge)?;
                    let data = &pruned[edge];
                    Some(GraphEdge {
                        source: source.index(),
                        target: target.index(),
                        kind: data.kind,
                        label: data.label.clone(),
                    })
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(prune: bool) -> ResolveGraph {
        let mut builder = GraphBuilder::new();
        let request = builder.add_node("pyfoo", NodeKind::InitialRequest);
        let scope = builder.add_node("pyfoo-3.1.0[]", NodeKind::SolvedScope);
        let dep = builder.add_node("python-2.6", NodeKind::Request);
        let other = builder.add_node("python-2.7", NodeKind::InitialRequest);
        let unrelated = builder.add_node("nada", NodeKind::InitialRequest);
        let unrelated_scope = builder.add_node("nada[]", NodeKind::SolvedScope);

        builder.add_edge(request, scope, EdgeKind::Requires, None);
        builder.add_edge(scope, dep, EdgeKind::Requires, None);
        builder.add_edge(dep, other, EdgeKind::Requires, None);
        builder.add_edge(dep, other, EdgeKind::Conflict, None);
        builder.add_edge(unrelated, unrelated_scope, EdgeKind::Requires, None);
        assert!(builder.has_out_edges(dep));
        assert!(!builder.has_out_edges(other));

        builder.mark_failed(dep);
        builder.mark_failed(other);
        builder.finish(prune)
    }

    #[test]
    fn test_edges_are_replaced() {
        let graph = sample(false);
        assert_eq!(graph.nodes.len(), 6);
        assert_eq!(graph.edges.len(), 4);
        assert_eq!(graph.edge("python-2.6", "python-2.7").unwrap().kind, EdgeKind::Conflict);
        assert_eq!(graph.edges_of_kind(EdgeKind::Conflict).count(), 1);
    }

    #[test]
    fn test_prune_unrelated_nodes() {
        let graph = sample(true);
        assert_eq!(graph.nodes.len(), 4);
        assert!(graph.node("nada").is_none());
        assert!(graph.node("pyfoo").is_some());
        assert!(graph.edge("pyfoo", "pyfoo-3.1.0[]").is_some());
        for edge in &graph.edges {
            assert!(edge.source < graph.nodes.len());
            assert!(edge.target < graph.nodes.len());
        }
    }

    #[test]
    fn test_no_pruning_without_failures() {
        let mut builder = GraphBuilder::new();
        let a = builder.add_node("a", NodeKind::InitialRequest);
        let b = builder.add_node("a-1[]", NodeKind::Scope);
        builder.set_kind(b, NodeKind::SolvedScope);
        builder.add_edge(a, b, EdgeKind::Requires, None);
        let graph = builder.finish(true);
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.node("a-1[]").unwrap().kind, NodeKind::SolvedScope);
    }

    #[test]
    fn test_json_and_dot() {
        let graph = sample(true);
        let json = graph.to_json().unwrap();
        assert!(json.contains("\"kind\": \"conflict\""));
        assert!(json.contains("\"initial_request\""));

        let dot = graph.to_dot();
        assert!(dot.starts_with("digraph resolve {"));
        assert!(dot.contains("label=\"CONFLICT\""));
        assert!(dot.contains("fillcolor=\"#AAFFAA\""));
    }
}
