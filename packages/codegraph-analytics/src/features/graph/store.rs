//! Code graph store
//!
//! Single-writer-multi-reader lifecycle: a graph is created `Building`, is
//! structurally mutated by one actor, and is then frozen. After `freeze()` it
//! is deeply immutable and safe for unbounded concurrent reads; every query
//! engine in this crate requires a frozen graph.
//!
//! Secondary indexes (by name, by kind, by edge kind, by file) are maintained
//! in sync with every mutation, so freezing is a validation pass rather than
//! an index build.

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::node::Node;
use crate::shared::models::{
    Edge, EdgeKind, GraphError, Location, NodeId, Result, Symbol, SymbolKind, SymbolRef,
};

/// Default node capacity
pub const DEFAULT_MAX_NODES: usize = 1_000_000;
/// Default edge capacity
pub const DEFAULT_MAX_EDGES: usize = 10_000_000;

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraphState {
    Building,
    ReadOnly,
}

/// Node/edge caps applied at insertion time
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GraphLimits {
    pub max_nodes: usize,
    pub max_edges: usize,
}

impl Default for GraphLimits {
    fn default() -> Self {
        Self {
            max_nodes: DEFAULT_MAX_NODES,
            max_edges: DEFAULT_MAX_EDGES,
        }
    }
}

/// Aggregate counts derived from the secondary indexes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub nodes_by_kind: HashMap<String, usize>,
    pub edges_by_kind: HashMap<String, usize>,
    pub built_at_millis: Option<i64>,
}

/// Directed multigraph of program symbols
///
/// Edges live in one flat vector; node adjacency and the by-kind/by-file
/// indexes store indices into it. Removing a file compacts the vector and
/// re-links every index.
#[derive(Debug, Clone)]
pub struct CodeGraph {
    project_root: String,
    nodes: AHashMap<NodeId, Node>,
    edges: Vec<Edge>,
    nodes_by_name: AHashMap<String, Vec<NodeId>>,
    nodes_by_kind: AHashMap<SymbolKind, Vec<NodeId>>,
    /// Indexed by `EdgeKind::ordinal()`
    edges_by_kind: [Vec<usize>; EdgeKind::COUNT],
    /// Keyed by the edge location's file path (empty paths are not indexed)
    edges_by_file: AHashMap<String, Vec<usize>>,
    state: GraphState,
    limits: GraphLimits,
    built_at: Option<DateTime<Utc>>,
}

impl CodeGraph {
    /// Create an empty `Building` graph
    pub fn new(project_root: impl Into<String>, limits: GraphLimits) -> Self {
        Self {
            project_root: project_root.into(),
            nodes: AHashMap::new(),
            edges: Vec::new(),
            nodes_by_name: AHashMap::new(),
            nodes_by_kind: AHashMap::new(),
            edges_by_kind: Default::default(),
            edges_by_file: AHashMap::new(),
            state: GraphState::Building,
            limits,
            built_at: None,
        }
    }

    pub fn with_default_limits(project_root: impl Into<String>) -> Self {
        Self::new(project_root, GraphLimits::default())
    }

    // ------------------------------------------------------------------
    // Mutation (Building state only)
    // ------------------------------------------------------------------

    /// Add a symbol as a node
    ///
    /// The symbol is validated, wrapped in an `Arc`, and never mutated again.
    pub fn add_node(&mut self, symbol: Symbol) -> Result<()> {
        self.add_node_ref(Arc::new(symbol))
    }

    /// Add an already-shared symbol as a node
    pub fn add_node_ref(&mut self, symbol: SymbolRef) -> Result<()> {
        if self.state == GraphState::ReadOnly {
            return Err(GraphError::GraphFrozen);
        }
        symbol.validate().map_err(GraphError::InvalidNode)?;
        if self.nodes.contains_key(&symbol.id) {
            return Err(GraphError::DuplicateNode(symbol.id.clone()));
        }
        if self.nodes.len() >= self.limits.max_nodes {
            return Err(GraphError::CapacityExceeded {
                what: "nodes",
                limit: self.limits.max_nodes,
            });
        }

        let node = Node::new(symbol);
        self.nodes_by_name
            .entry(node.symbol.name.clone())
            .or_default()
            .push(node.id.clone());
        self.nodes_by_kind
            .entry(node.symbol.kind)
            .or_default()
            .push(node.id.clone());
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Add an edge between two existing nodes
    pub fn add_edge(
        &mut self,
        from_id: &str,
        to_id: &str,
        kind: EdgeKind,
        location: Location,
    ) -> Result<()> {
        if self.state == GraphState::ReadOnly {
            return Err(GraphError::GraphFrozen);
        }
        if !self.nodes.contains_key(from_id) {
            return Err(GraphError::NodeNotFound(from_id.to_string()));
        }
        if !self.nodes.contains_key(to_id) {
            return Err(GraphError::NodeNotFound(to_id.to_string()));
        }
        if self.edges.len() >= self.limits.max_edges {
            return Err(GraphError::CapacityExceeded {
                what: "edges",
                limit: self.limits.max_edges,
            });
        }

        let index = self.edges.len();
        let file_path = location.file_path.clone();
        self.edges.push(Edge::new(from_id, to_id, kind, location));

        if let Some(node) = self.nodes.get_mut(from_id) {
            node.outgoing.push(index);
        }
        if let Some(node) = self.nodes.get_mut(to_id) {
            node.incoming.push(index);
        }
        self.edges_by_kind[kind.ordinal()].push(index);
        if !file_path.is_empty() {
            self.edges_by_file.entry(file_path).or_default().push(index);
        }
        Ok(())
    }

    /// Remove every node whose symbol lives in `file_path`, with all touching
    /// edges. Legal only while `Building`. Returns the number of nodes removed.
    pub fn remove_file(&mut self, file_path: &str) -> Result<usize> {
        if self.state == GraphState::ReadOnly {
            return Err(GraphError::GraphFrozen);
        }

        let removed_ids: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.symbol.file_path == file_path)
            .map(|n| n.id.clone())
            .collect();
        if removed_ids.is_empty() {
            return Ok(0);
        }

        for id in &removed_ids {
            if let Some(node) = self.nodes.remove(id) {
                Self::unindex_node(&mut self.nodes_by_name, &node.symbol.name, id);
                Self::unindex_kind(&mut self.nodes_by_kind, node.symbol.kind, id);
            }
        }

        // Drop edges touching removed nodes, then rebuild every edge index:
        // edge indices shift under compaction.
        let surviving: Vec<Edge> = self
            .edges
            .drain(..)
            .filter(|e| {
                self.nodes.contains_key(&e.source_id) && self.nodes.contains_key(&e.target_id)
            })
            .collect();
        self.relink_edges(surviving);

        debug!(
            file = file_path,
            removed = removed_ids.len(),
            "removed file from graph"
        );
        Ok(removed_ids.len())
    }

    /// Transition to `ReadOnly`. Idempotent: repeated calls re-validate and
    /// keep the original build timestamp.
    pub fn freeze(&mut self) -> Result<()> {
        self.validate_indexes()?;
        if self.state == GraphState::Building {
            self.state = GraphState::ReadOnly;
            if self.built_at.is_none() {
                self.built_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    /// Independent `Building`-state copy
    ///
    /// Nodes and edges are deep-copied (symbols stay shared), secondary
    /// indexes are rebuilt against the copy, and the build timestamp is
    /// preserved so callers can still tell the original build time.
    pub fn clone_graph(&self) -> CodeGraph {
        let mut cloned = CodeGraph::new(self.project_root.clone(), self.limits);
        cloned.built_at = self.built_at;

        for node in self.nodes.values() {
            let copy = Node::new(Arc::clone(&node.symbol));
            cloned
                .nodes_by_name
                .entry(copy.symbol.name.clone())
                .or_default()
                .push(copy.id.clone());
            cloned
                .nodes_by_kind
                .entry(copy.symbol.kind)
                .or_default()
                .push(copy.id.clone());
            cloned.nodes.insert(copy.id.clone(), copy);
        }
        cloned.relink_edges(self.edges.clone());
        cloned
    }

    // ------------------------------------------------------------------
    // Read accessors
    // ------------------------------------------------------------------

    #[inline]
    pub fn state(&self) -> GraphState {
        self.state
    }

    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.state == GraphState::ReadOnly
    }

    #[inline]
    pub fn project_root(&self) -> &str {
        &self.project_root
    }

    #[inline]
    pub fn limits(&self) -> GraphLimits {
        self.limits
    }

    /// Build timestamp (millis since epoch), stamped at first freeze
    pub fn built_at_millis(&self) -> Option<i64> {
        self.built_at.map(|t| t.timestamp_millis())
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Node IDs in sorted order: the iteration basis for every deterministic
    /// algorithm in this crate
    pub fn sorted_node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    #[inline]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    #[inline]
    pub fn edge(&self, index: usize) -> Option<&Edge> {
        self.edges.get(index)
    }

    /// O(1) lookup + O(k) defensive copy
    pub fn nodes_by_name(&self, name: &str) -> Vec<&Node> {
        self.nodes_by_name
            .get(name)
            .map(|ids| ids.iter().filter_map(|id| self.nodes.get(id)).collect())
            .unwrap_or_default()
    }

    /// O(1) lookup + O(k) defensive copy
    pub fn nodes_by_kind(&self, kind: SymbolKind) -> Vec<&Node> {
        self.nodes_by_kind
            .get(&kind)
            .map(|ids| ids.iter().filter_map(|id| self.nodes.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn edges_by_kind(&self, kind: EdgeKind) -> Vec<&Edge> {
        self.edges_by_kind[kind.ordinal()]
            .iter()
            .filter_map(|&i| self.edges.get(i))
            .collect()
    }

    pub fn edges_by_file(&self, file_path: &str) -> Vec<&Edge> {
        self.edges_by_file
            .get(file_path)
            .map(|idxs| idxs.iter().filter_map(|&i| self.edges.get(i)).collect())
            .unwrap_or_default()
    }

    /// Outgoing neighbor node IDs (with edge multiplicity)
    pub fn outgoing_targets<'a>(&'a self, node: &'a Node) -> impl Iterator<Item = &'a str> {
        node.outgoing
            .iter()
            .filter_map(|&i| self.edges.get(i))
            .map(|e| e.target_id.as_str())
    }

    /// Incoming neighbor node IDs (with edge multiplicity)
    pub fn incoming_sources<'a>(&'a self, node: &'a Node) -> impl Iterator<Item = &'a str> {
        node.incoming
            .iter()
            .filter_map(|&i| self.edges.get(i))
            .map(|e| e.source_id.as_str())
    }

    /// Counts derived in O(|kinds| + |edge kinds|) from the indexes
    pub fn stats(&self) -> GraphStats {
        let nodes_by_kind = self
            .nodes_by_kind
            .iter()
            .map(|(kind, ids)| (kind.as_str().to_string(), ids.len()))
            .collect();
        let edges_by_kind = EdgeKind::ALL
            .iter()
            .filter(|k| !self.edges_by_kind[k.ordinal()].is_empty())
            .map(|k| (k.as_str().to_string(), self.edges_by_kind[k.ordinal()].len()))
            .collect();

        GraphStats {
            total_nodes: self.nodes.len(),
            total_edges: self.edges.len(),
            nodes_by_kind,
            edges_by_kind,
            built_at_millis: self.built_at_millis(),
        }
    }

    // ------------------------------------------------------------------
    // Internal maintenance
    // ------------------------------------------------------------------

    fn unindex_node(index: &mut AHashMap<String, Vec<NodeId>>, name: &str, id: &str) {
        if let Some(ids) = index.get_mut(name) {
            ids.retain(|existing| existing != id);
            if ids.is_empty() {
                index.remove(name);
            }
        }
    }

    fn unindex_kind(index: &mut AHashMap<SymbolKind, Vec<NodeId>>, kind: SymbolKind, id: &str) {
        if let Some(ids) = index.get_mut(&kind) {
            ids.retain(|existing| existing != id);
            if ids.is_empty() {
                index.remove(&kind);
            }
        }
    }

    /// Install `edges` as the full edge set, rebuilding adjacency and the
    /// by-kind/by-file indexes from scratch.
    fn relink_edges(&mut self, edges: Vec<Edge>) {
        self.edges = edges;
        self.edges_by_kind = Default::default();
        self.edges_by_file.clear();
        for node in self.nodes.values_mut() {
            node.outgoing.clear();
            node.incoming.clear();
        }

        for (index, edge) in self.edges.iter().enumerate() {
            if let Some(node) = self.nodes.get_mut(&edge.source_id) {
                node.outgoing.push(index);
            }
            if let Some(node) = self.nodes.get_mut(&edge.target_id) {
                node.incoming.push(index);
            }
            self.edges_by_kind[edge.kind.ordinal()].push(index);
            if !edge.location.file_path.is_empty() {
                self.edges_by_file
                    .entry(edge.location.file_path.clone())
                    .or_default()
                    .push(index);
            }
        }
    }

    /// Secondary-index invariants, checked at every freeze
    fn validate_indexes(&self) -> Result<()> {
        for edge in &self.edges {
            if !self.nodes.contains_key(&edge.source_id) {
                return Err(GraphError::validation(format!(
                    "edge source {} missing from node map",
                    edge.source_id
                )));
            }
            if !self.nodes.contains_key(&edge.target_id) {
                return Err(GraphError::validation(format!(
                    "edge target {} missing from node map",
                    edge.target_id
                )));
            }
        }

        let by_kind_total: usize = self.edges_by_kind.iter().map(Vec::len).sum();
        if by_kind_total != self.edges.len() {
            return Err(GraphError::validation(format!(
                "edges-by-kind total {} != edge count {}",
                by_kind_total,
                self.edges.len()
            )));
        }

        for (name, ids) in &self.nodes_by_name {
            for id in ids {
                match self.nodes.get(id) {
                    Some(node) if node.symbol.name == *name => {}
                    Some(_) => {
                        return Err(GraphError::validation(format!(
                            "node {} indexed under wrong name {}",
                            id, name
                        )))
                    }
                    None => {
                        return Err(GraphError::validation(format!(
                            "name index references missing node {}",
                            id
                        )))
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sym(id: &str, name: &str, kind: SymbolKind, file: &str) -> Symbol {
        Symbol::new(id, name, kind, file).with_package("pkg/demo")
    }

    fn small_graph() -> CodeGraph {
        let mut g = CodeGraph::with_default_limits("/repo");
        g.add_node(sym("a", "A", SymbolKind::Function, "x.go")).unwrap();
        g.add_node(sym("b", "B", SymbolKind::Function, "x.go")).unwrap();
        g.add_node(sym("c", "C", SymbolKind::Struct, "y.go")).unwrap();
        g.add_edge("a", "b", EdgeKind::Calls, Location::in_file("x.go"))
            .unwrap();
        g.add_edge("a", "c", EdgeKind::References, Location::in_file("x.go"))
            .unwrap();
        g.add_edge("b", "c", EdgeKind::Returns, Location::in_file("x.go"))
            .unwrap();
        g
    }

    #[test]
    fn test_add_node_duplicate() {
        let mut g = CodeGraph::with_default_limits("/repo");
        g.add_node(sym("a", "A", SymbolKind::Function, "x.go")).unwrap();
        let err = g
            .add_node(sym("a", "A", SymbolKind::Function, "x.go"))
            .unwrap_err();
        assert_eq!(err, GraphError::DuplicateNode("a".to_string()));
    }

    #[test]
    fn test_add_node_invalid() {
        let mut g = CodeGraph::with_default_limits("/repo");
        let err = g
            .add_node(sym("bad", "Bad", SymbolKind::Function, "../x.go"))
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidNode(_)));
    }

    #[test]
    fn test_node_capacity() {
        let limits = GraphLimits {
            max_nodes: 1,
            max_edges: 10,
        };
        let mut g = CodeGraph::new("/repo", limits);
        g.add_node(sym("a", "A", SymbolKind::Function, "x.go")).unwrap();
        let err = g
            .add_node(sym("b", "B", SymbolKind::Function, "x.go"))
            .unwrap_err();
        assert_eq!(
            err,
            GraphError::CapacityExceeded {
                what: "nodes",
                limit: 1
            }
        );
    }

    #[test]
    fn test_edge_requires_endpoints() {
        let mut g = CodeGraph::with_default_limits("/repo");
        g.add_node(sym("a", "A", SymbolKind::Function, "x.go")).unwrap();
        let err = g
            .add_edge("a", "missing", EdgeKind::Calls, Location::zero())
            .unwrap_err();
        assert_eq!(err, GraphError::NodeNotFound("missing".to_string()));
    }

    #[test]
    fn test_multigraph_edges_allowed() {
        let mut g = CodeGraph::with_default_limits("/repo");
        g.add_node(sym("a", "A", SymbolKind::Function, "x.go")).unwrap();
        g.add_node(sym("b", "B", SymbolKind::Function, "x.go")).unwrap();
        // Two call sites, same (source, target, kind)
        g.add_edge("a", "b", EdgeKind::Calls, Location::new("x.go", 1, 0, 1, 5))
            .unwrap();
        g.add_edge("a", "b", EdgeKind::Calls, Location::new("x.go", 9, 0, 9, 5))
            .unwrap();
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.get_node("a").unwrap().out_degree(), 2);
        assert_eq!(g.get_node("b").unwrap().in_degree(), 2);
    }

    #[test]
    fn test_freeze_blocks_mutation() {
        let mut g = small_graph();
        g.freeze().unwrap();
        assert!(g.is_frozen());
        assert_eq!(
            g.add_node(sym("d", "D", SymbolKind::Function, "z.go")),
            Err(GraphError::GraphFrozen)
        );
        assert_eq!(
            g.add_edge("a", "b", EdgeKind::Calls, Location::zero()),
            Err(GraphError::GraphFrozen)
        );
        assert_eq!(g.remove_file("x.go"), Err(GraphError::GraphFrozen));
    }

    #[test]
    fn test_freeze_idempotent_and_stamps_once() {
        let mut g = small_graph();
        g.freeze().unwrap();
        let first = g.built_at_millis();
        assert!(first.is_some());
        g.freeze().unwrap();
        assert_eq!(g.built_at_millis(), first);
    }

    #[test]
    fn test_secondary_indexes() {
        let g = small_graph();
        assert_eq!(g.nodes_by_name("A").len(), 1);
        assert_eq!(g.nodes_by_kind(SymbolKind::Function).len(), 2);
        assert_eq!(g.edges_by_kind(EdgeKind::Calls).len(), 1);
        assert_eq!(g.edges_by_file("x.go").len(), 3);
        assert!(g.edges_by_file("y.go").is_empty());
    }

    #[test]
    fn test_edges_by_kind_partition_is_total() {
        let g = small_graph();
        let total: usize = EdgeKind::ALL
            .iter()
            .map(|k| g.edges_by_kind(*k).len())
            .sum();
        assert_eq!(total, g.edge_count());
    }

    #[test]
    fn test_remove_file() {
        let mut g = small_graph();
        let removed = g.remove_file("x.go").unwrap();
        assert_eq!(removed, 2);
        assert_eq!(g.node_count(), 1);
        // All edges touched a removed endpoint
        assert_eq!(g.edge_count(), 0);
        assert!(g.nodes_by_name("A").is_empty());
        assert!(g.nodes_by_kind(SymbolKind::Function).is_empty());
        assert!(g.edges_by_file("x.go").is_empty());
        // Indexes stay valid after compaction
        let mut g = g;
        g.freeze().unwrap();
    }

    #[test]
    fn test_remove_file_unknown_path() {
        let mut g = small_graph();
        assert_eq!(g.remove_file("nope.go").unwrap(), 0);
        assert_eq!(g.node_count(), 3);
    }

    #[test]
    fn test_clone_graph_is_independent() {
        let mut g = small_graph();
        g.freeze().unwrap();
        let built_at = g.built_at_millis();

        let mut cloned = g.clone_graph();
        assert_eq!(cloned.state(), GraphState::Building);
        assert_eq!(cloned.built_at_millis(), built_at);
        assert_eq!(cloned.node_count(), g.node_count());
        assert_eq!(cloned.edge_count(), g.edge_count());

        // Mutating the clone leaves the original untouched
        cloned
            .add_node(sym("d", "D", SymbolKind::Function, "z.go"))
            .unwrap();
        cloned
            .add_edge("d", "a", EdgeKind::Calls, Location::in_file("z.go"))
            .unwrap();
        assert_eq!(g.node_count(), 3);
        assert_eq!(cloned.node_count(), 4);

        // Symbols are shared, not copied
        let orig = g.get_node("a").unwrap();
        let copy = cloned.get_node("a").unwrap();
        assert!(Arc::ptr_eq(&orig.symbol, &copy.symbol));

        cloned.freeze().unwrap();
        assert_eq!(cloned.stats().total_edges, 4);
    }

    #[test]
    fn test_stats() {
        let mut g = small_graph();
        g.freeze().unwrap();
        let stats = g.stats();
        assert_eq!(stats.total_nodes, 3);
        assert_eq!(stats.total_edges, 3);
        assert_eq!(stats.nodes_by_kind["function"], 2);
        assert_eq!(stats.nodes_by_kind["struct"], 1);
        assert_eq!(stats.edges_by_kind["calls"], 1);
        assert!(stats.built_at_millis.is_some());
    }

    #[test]
    fn test_sorted_node_ids() {
        let g = small_graph();
        assert_eq!(g.sorted_node_ids(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_empty_graph_accessors() {
        let g = CodeGraph::with_default_limits("/repo");
        assert!(g.nodes_by_name("x").is_empty());
        assert!(g.nodes_by_kind(SymbolKind::Function).is_empty());
        assert!(g.edges_by_kind(EdgeKind::Calls).is_empty());
        assert_eq!(g.stats().total_nodes, 0);
    }
}
