//! PageRank importance scores
//!
//! Classic damped power iteration (Page & Brin, 1998) over the frozen graph:
//!
//! ```text
//! PR(v) = (1-d)/N + d * (dangling/N + Σ PR(u) / outdeg(u))
//!                                    u→v
//! ```
//!
//! Dangling nodes (no outgoing edges) redistribute their mass uniformly so
//! scores keep summing to 1. Nodes are laid out over the sorted-ID bijection,
//! which makes both iteration and tie-broken rankings deterministic.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::features::graph::CodeGraph;
use crate::shared::models::{GraphError, NodeId, Result};

/// Power-iteration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRankConfig {
    /// Damping factor (typically 0.85)
    pub damping: f64,
    pub max_iterations: usize,
    /// Convergence threshold on the max per-node delta
    pub tolerance: f64,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            max_iterations: 100,
            tolerance: 1e-6,
        }
    }
}

/// PageRank score per node ID
pub fn compute_pagerank(
    graph: &CodeGraph,
    config: &PageRankConfig,
) -> Result<AHashMap<NodeId, f64>> {
    if !graph.is_frozen() {
        return Err(GraphError::GraphNotFrozen);
    }
    let ids = graph.sorted_node_ids();
    let n = ids.len();
    if n == 0 {
        return Ok(AHashMap::new());
    }

    let index_of: AHashMap<&str, usize> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    // Incoming adjacency (with multiplicity) and out-degrees in one pass
    let mut incoming: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut out_degree: Vec<usize> = vec![0; n];
    for edge in graph.edges() {
        let (Some(&s), Some(&t)) = (
            index_of.get(edge.source_id.as_str()),
            index_of.get(edge.target_id.as_str()),
        ) else {
            continue;
        };
        incoming[t].push(s);
        out_degree[s] += 1;
    }

    let nf = n as f64;
    let base = (1.0 - config.damping) / nf;
    let mut scores: Vec<f64> = vec![1.0 / nf; n];

    for iteration in 0..config.max_iterations {
        let dangling: f64 = (0..n)
            .filter(|&i| out_degree[i] == 0)
            .map(|i| scores[i])
            .sum();

        let mut next: Vec<f64> = vec![0.0; n];
        let mut max_delta: f64 = 0.0;
        for v in 0..n {
            let incoming_sum: f64 = incoming[v]
                .iter()
                .map(|&u| scores[u] / out_degree[u] as f64)
                .sum();
            let score = base + config.damping * (dangling / nf + incoming_sum);
            max_delta = max_delta.max((score - scores[v]).abs());
            next[v] = score;
        }
        scores = next;

        if max_delta < config.tolerance {
            debug!(iterations = iteration + 1, "pagerank converged");
            break;
        }
    }

    Ok(ids
        .into_iter()
        .zip(scores)
        .collect())
}

/// Top-k nodes by PageRank, score descending then node ID ascending
pub fn importance_ranking(
    graph: &CodeGraph,
    top_k: usize,
    config: &PageRankConfig,
) -> Result<Vec<(NodeId, f64)>> {
    let scores = compute_pagerank(graph, config)?;
    let mut ranked: Vec<(NodeId, f64)> = scores.into_iter().collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    ranked.truncate(top_k);
    Ok(ranked)
}
