//! Dominance frontier computation
//!
//! Classic idom-chain walk (Cooper/Harvey/Kennedy): for each node n and each
//! predecessor p, walk p up the immediate-dominator chain until idom(n),
//! adding n to DF(r) for every r passed. The caller supplies the idom map
//! (from whatever dominator-tree construction it ran) plus its entry node;
//! an empty map with a declared entry means the graph is not ready.
//!
//! The chain walk is capped at |idom|+1 hops as a safety net against cyclic
//! idom inputs.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

use crate::features::graph::CodeGraph;
use crate::shared::cancel::CancellationToken;
use crate::shared::models::{GraphError, NodeId};

/// Dominance frontiers plus derived merge-point data
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DominanceFrontierResult {
    /// DF(n) per node (nodes with empty frontiers are omitted)
    pub frontiers: BTreeMap<NodeId, BTreeSet<NodeId>>,
    /// Nodes appearing in ≥ 2 frontiers, sorted
    pub merge_points: Vec<NodeId>,
    /// Degree of convergence: how many frontiers each node appears in
    pub convergence: BTreeMap<NodeId, usize>,
}

/// Compute dominance frontiers from a precomputed idom map
///
/// Cancellation is polled every 500 nodes; the frontiers computed so far are
/// returned with the error.
pub fn dominance_frontier(
    graph: &CodeGraph,
    idom: &HashMap<NodeId, NodeId>,
    entry: &str,
    token: &CancellationToken,
) -> (DominanceFrontierResult, Option<GraphError>) {
    if !graph.is_frozen() {
        return (
            DominanceFrontierResult::default(),
            Some(GraphError::GraphNotFrozen),
        );
    }
    if idom.is_empty() && !entry.is_empty() {
        return (
            DominanceFrontierResult::default(),
            Some(GraphError::DominanceFrontierUnavailable(
                "empty immediate-dominator map".to_string(),
            )),
        );
    }

    let chain_cap = idom.len() + 1;
    let mut frontiers: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();

    for (processed, id) in graph.sorted_node_ids().into_iter().enumerate() {
        if processed % 500 == 0 && token.is_cancelled() {
            return (finish(frontiers), Some(GraphError::Cancelled));
        }

        let Some(node) = graph.get_node(&id) else {
            continue;
        };
        let Some(target_idom) = idom.get(&id) else {
            continue; // unreachable from the entry, no dominator info
        };

        // Deduplicated, sorted predecessors
        let predecessors: BTreeSet<&str> = graph
            .incoming_sources(node)
            .filter(|p| *p != id) // self-loops contribute nothing
            .collect();
        if predecessors.is_empty() {
            continue;
        }

        for pred in predecessors {
            if !idom.contains_key(pred) {
                continue;
            }
            let mut runner = pred.to_string();
            let mut hops = 0usize;
            while runner != *target_idom {
                hops += 1;
                if hops > chain_cap {
                    break; // cyclic idom input
                }
                frontiers.entry(runner.clone()).or_default().insert(id.clone());
                match idom.get(&runner) {
                    Some(next) if *next != runner => runner = next.clone(),
                    _ => break,
                }
            }
        }
    }

    let result = finish(frontiers);
    debug!(
        nodes_with_frontier = result.frontiers.len(),
        merge_points = result.merge_points.len(),
        "dominance frontier finished"
    );
    (result, None)
}

fn finish(frontiers: BTreeMap<NodeId, BTreeSet<NodeId>>) -> DominanceFrontierResult {
    let mut convergence: BTreeMap<NodeId, usize> = BTreeMap::new();
    for members in frontiers.values() {
        for node in members {
            *convergence.entry(node.clone()).or_default() += 1;
        }
    }
    let merge_points: Vec<NodeId> = convergence
        .iter()
        .filter(|(_, &count)| count >= 2)
        .map(|(node, _)| node.clone())
        .collect();

    DominanceFrontierResult {
        frontiers,
        merge_points,
        convergence,
    }
}
