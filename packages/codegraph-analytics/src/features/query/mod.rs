//! Path and subtree query engines over HLD position layouts
//!
//! Engines pair a decomposition (single tree or forest) with a segment tree
//! laid out over DFS positions. Queries are `&self` and safe to run
//! concurrently; subtree updates require `&mut self` (single writer).

mod path;
mod subtree;
mod update;

pub use path::PathQueryEngine;
pub use subtree::SubtreeQueryEngine;
pub use update::{SubtreeUpdateEngine, UpdateStatsSnapshot};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::features::hld::{HeavyLightDecomposition, HldForest};
use crate::features::segment_tree::Aggregate;
use crate::shared::models::{GraphError, NodeId, Result};

/// Single tree or forest backing an engine
pub(crate) enum TreeLayout {
    Single(Arc<HeavyLightDecomposition>),
    Forest(Arc<HldForest>),
}

/// One located node: its tree, local index, and the tree's global offset
pub(crate) struct Located<'a> {
    pub tree: &'a HeavyLightDecomposition,
    pub tree_index: usize,
    pub local: usize,
    pub offset: usize,
}

impl TreeLayout {
    pub(crate) fn total_positions(&self) -> usize {
        match self {
            TreeLayout::Single(hld) => hld.node_count(),
            TreeLayout::Forest(forest) => forest.node_count(),
        }
    }

    pub(crate) fn locate(&self, node_id: &str) -> Result<Located<'_>> {
        if node_id.is_empty() {
            return Err(GraphError::invalid_input("empty node id"));
        }
        match self {
            TreeLayout::Single(hld) => {
                let local = hld
                    .index_of(node_id)
                    .ok_or_else(|| GraphError::NodeNotFound(node_id.to_string()))?;
                Ok(Located {
                    tree: hld,
                    tree_index: 0,
                    local,
                    offset: 0,
                })
            }
            TreeLayout::Forest(forest) => {
                let (tree_index, local, _) = forest
                    .locate(node_id)
                    .ok_or_else(|| GraphError::NodeNotFound(node_id.to_string()))?;
                Ok(Located {
                    tree: forest.tree(tree_index).expect("located tree exists"),
                    tree_index,
                    local,
                    offset: forest.offset(tree_index).expect("located offset exists"),
                })
            }
        }
    }

    /// Lay node values out over global DFS positions; absent nodes take the
    /// aggregate identity
    pub(crate) fn layout_values(
        &self,
        values: &HashMap<NodeId, i64>,
        aggregate: Aggregate,
    ) -> Vec<i64> {
        let mut laid_out = vec![aggregate.identity(); self.total_positions()];
        let mut place = |hld: &HeavyLightDecomposition, offset: usize| {
            for (local, id) in hld.ids().iter().enumerate() {
                if let Some(&value) = values.get(id) {
                    laid_out[offset + hld.position(local)] = value;
                }
            }
        };
        match self {
            TreeLayout::Single(hld) => place(hld, 0),
            TreeLayout::Forest(forest) => {
                for tree_index in 0..forest.tree_count() {
                    let hld = forest.tree(tree_index).expect("tree index in range");
                    let offset = forest.offset(tree_index).expect("offset in range");
                    place(hld, offset);
                }
            }
        }
        laid_out
    }
}

/// Lock-free query statistics (reads stay `&self`)
#[derive(Debug, Default)]
pub(crate) struct QueryStats {
    query_count: AtomicU64,
    total_latency_us: AtomicU64,
    last_latency_us: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

impl QueryStats {
    pub fn record(&self, latency: Duration) {
        let us = latency.as_micros() as u64;
        self.query_count.fetch_add(1, Ordering::Relaxed);
        self.total_latency_us.fetch_add(us, Ordering::Relaxed);
        self.last_latency_us.store(us, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> QueryStatsSnapshot {
        let query_count = self.query_count.load(Ordering::Relaxed);
        let total_us = self.total_latency_us.load(Ordering::Relaxed);
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);
        QueryStatsSnapshot {
            query_count,
            total_latency: Duration::from_micros(total_us),
            avg_latency: if query_count == 0 {
                Duration::ZERO
            } else {
                Duration::from_micros(total_us / query_count)
            },
            last_query_latency: Duration::from_micros(self.last_latency_us.load(Ordering::Relaxed)),
            cache_hit_ratio: if hits + misses == 0 {
                0.0
            } else {
                hits as f64 / (hits + misses) as f64
            },
        }
    }
}

/// Point-in-time view of an engine's statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryStatsSnapshot {
    pub query_count: u64,
    pub total_latency: Duration,
    pub avg_latency: Duration,
    pub last_query_latency: Duration,
    pub cache_hit_ratio: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_snapshot_math() {
        let stats = QueryStats::default();
        stats.record(Duration::from_micros(100));
        stats.record(Duration::from_micros(300));
        stats.record_cache_hit();
        stats.record_cache_miss();
        stats.record_cache_miss();

        let snap = stats.snapshot();
        assert_eq!(snap.query_count, 2);
        assert_eq!(snap.total_latency, Duration::from_micros(400));
        assert_eq!(snap.avg_latency, Duration::from_micros(200));
        assert_eq!(snap.last_query_latency, Duration::from_micros(300));
        assert!((snap.cache_hit_ratio - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_stats() {
        let snap = QueryStats::default().snapshot();
        assert_eq!(snap.query_count, 0);
        assert_eq!(snap.avg_latency, Duration::ZERO);
        assert_eq!(snap.cache_hit_ratio, 0.0);
    }
}
