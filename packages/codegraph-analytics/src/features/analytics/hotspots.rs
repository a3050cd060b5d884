//! Hotspot detection
//!
//! Degree-based importance: score = 2·in + out. Incoming references weigh
//! double because being depended upon is the stronger coupling signal.
//! External placeholders are excluded; they aggregate unresolved references
//! and would otherwise dominate every ranking.

use serde::{Deserialize, Serialize};

use crate::features::graph::CodeGraph;
use crate::shared::models::{GraphError, Result};

/// One ranked hotspot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hotspot {
    pub node_id: String,
    pub name: String,
    pub file_path: String,
    pub score: usize,
    pub in_degree: usize,
    pub out_degree: usize,
}

/// Top-k nodes by score, ties broken by node ID ascending
pub fn find_hotspots(graph: &CodeGraph, top_k: usize) -> Result<Vec<Hotspot>> {
    if !graph.is_frozen() {
        return Err(GraphError::GraphNotFrozen);
    }

    let mut hotspots: Vec<Hotspot> = Vec::new();
    for id in graph.sorted_node_ids() {
        let Some(node) = graph.get_node(&id) else {
            continue;
        };
        if node.is_external() {
            continue;
        }
        let in_degree = node.in_degree();
        let out_degree = node.out_degree();
        hotspots.push(Hotspot {
            node_id: id,
            name: node.symbol.name.clone(),
            file_path: node.symbol.file_path.clone(),
            score: 2 * in_degree + out_degree,
            in_degree,
            out_degree,
        });
    }

    // Sorted-ID iteration makes the tie-break stable under sort_by
    hotspots.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.node_id.cmp(&b.node_id)));
    hotspots.truncate(top_k);
    Ok(hotspots)
}
