//! Impact analysis
//!
//! "What breaks if I change this?": transitive closure over incoming edges
//! (dependents) or outgoing edges (dependencies), with optional edge-kind
//! filtering and a depth cap. Output is sorted so results are reproducible.

use ahash::AHashSet;
use std::collections::VecDeque;

use crate::features::graph::CodeGraph;
use crate::shared::models::{EdgeKind, GraphError, NodeId, Result};

/// Traversal options
#[derive(Debug, Clone, Copy, Default)]
pub struct ImpactOptions {
    /// Restrict traversal to one edge kind
    pub edge_kind: Option<EdgeKind>,
    /// Maximum hops from the start node (None = unbounded)
    pub max_depth: Option<usize>,
}

#[derive(Clone, Copy)]
enum Direction {
    Dependents,
    Dependencies,
}

/// Everything that transitively depends on `node_id`
pub fn transitive_dependents(
    graph: &CodeGraph,
    node_id: &str,
    options: ImpactOptions,
) -> Result<Vec<NodeId>> {
    traverse(graph, node_id, options, Direction::Dependents)
}

/// Everything `node_id` transitively depends on
pub fn transitive_dependencies(
    graph: &CodeGraph,
    node_id: &str,
    options: ImpactOptions,
) -> Result<Vec<NodeId>> {
    traverse(graph, node_id, options, Direction::Dependencies)
}

fn traverse(
    graph: &CodeGraph,
    node_id: &str,
    options: ImpactOptions,
    direction: Direction,
) -> Result<Vec<NodeId>> {
    if !graph.is_frozen() {
        return Err(GraphError::GraphNotFrozen);
    }
    if node_id.is_empty() {
        return Err(GraphError::invalid_input("empty node id"));
    }
    if graph.get_node(node_id).is_none() {
        return Err(GraphError::NodeNotFound(node_id.to_string()));
    }

    let mut visited: AHashSet<NodeId> = AHashSet::new();
    let mut queue: VecDeque<(NodeId, usize)> = VecDeque::new();
    queue.push_back((node_id.to_string(), 0));

    while let Some((current, depth)) = queue.pop_front() {
        if let Some(max) = options.max_depth {
            if depth >= max {
                continue;
            }
        }
        let Some(node) = graph.get_node(&current) else {
            continue;
        };
        let edge_indices = match direction {
            Direction::Dependents => &node.incoming,
            Direction::Dependencies => &node.outgoing,
        };
        for &edge_index in edge_indices {
            let Some(edge) = graph.edge(edge_index) else {
                continue;
            };
            if let Some(kind) = options.edge_kind {
                if edge.kind != kind {
                    continue;
                }
            }
            let next = match direction {
                Direction::Dependents => &edge.source_id,
                Direction::Dependencies => &edge.target_id,
            };
            if next != node_id && visited.insert(next.clone()) {
                queue.push_back((next.clone(), depth + 1));
            }
        }
    }

    let mut result: Vec<NodeId> = visited.into_iter().collect();
    result.sort_unstable();
    Ok(result)
}
