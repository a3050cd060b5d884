//! Subtree updates
//!
//! Extends the subtree query engine with mutation: delta updates use one
//! lazy range update over the subtree interval, absolute sets fall back to
//! per-position point updates (idempotent under retry, and the only form the
//! GCD aggregate supports).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::subtree::SubtreeQueryEngine;
use crate::features::hld::{HeavyLightDecomposition, HldForest};
use crate::features::segment_tree::Aggregate;
use crate::shared::models::{NodeId, Result};

/// Point-in-time view of update statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateStatsSnapshot {
    pub update_count: u64,
    pub nodes_updated: u64,
    pub total_latency: Duration,
    pub avg_latency: Duration,
}

/// Subtree query engine plus point/range mutation
pub struct SubtreeUpdateEngine {
    engine: SubtreeQueryEngine,
    update_count: u64,
    nodes_updated: u64,
    total_latency: Duration,
}

impl SubtreeUpdateEngine {
    pub fn new(
        hld: Arc<HeavyLightDecomposition>,
        values: &HashMap<NodeId, i64>,
        aggregate: Aggregate,
    ) -> Self {
        Self::wrap(SubtreeQueryEngine::new(hld, values, aggregate))
    }

    pub fn from_forest(
        forest: Arc<HldForest>,
        values: &HashMap<NodeId, i64>,
        aggregate: Aggregate,
    ) -> Self {
        Self::wrap(SubtreeQueryEngine::from_forest(forest, values, aggregate))
    }

    fn wrap(engine: SubtreeQueryEngine) -> Self {
        Self {
            engine,
            update_count: 0,
            nodes_updated: 0,
            total_latency: Duration::ZERO,
        }
    }

    /// Read-side API (queries, ranges, DFS-ordered members)
    pub fn queries(&self) -> &SubtreeQueryEngine {
        &self.engine
    }

    /// Add `delta` to every node value in the subtree (SUM/MIN/MAX)
    pub fn subtree_update(&mut self, node_id: &str, delta: i64) -> Result<()> {
        let started = Instant::now();
        let (start, end) = self.engine.subtree_range(node_id)?;
        self.engine.tree_mut().range_update(start, end, delta)?;
        self.record(started, (end - start + 1) as u64);
        Ok(())
    }

    /// Replace every node value in the subtree with `value`
    pub fn subtree_set(&mut self, node_id: &str, value: i64) -> Result<()> {
        let started = Instant::now();
        let (start, end) = self.engine.subtree_range(node_id)?;
        for position in start..=end {
            self.engine.tree_mut().point_set(position, value)?;
        }
        self.record(started, (end - start + 1) as u64);
        Ok(())
    }

    /// Add 1 to every node value in the subtree
    pub fn subtree_increment(&mut self, node_id: &str) -> Result<()> {
        self.subtree_update(node_id, 1)
    }

    /// Subtract 1 from every node value in the subtree
    pub fn subtree_decrement(&mut self, node_id: &str) -> Result<()> {
        self.subtree_update(node_id, -1)
    }

    pub fn update_stats(&self) -> UpdateStatsSnapshot {
        UpdateStatsSnapshot {
            update_count: self.update_count,
            nodes_updated: self.nodes_updated,
            total_latency: self.total_latency,
            avg_latency: if self.update_count == 0 {
                Duration::ZERO
            } else {
                self.total_latency / self.update_count as u32
            },
        }
    }

    fn record(&mut self, started: Instant, nodes: u64) {
        self.update_count += 1;
        self.nodes_updated += nodes;
        self.total_latency += started.elapsed();
    }
}
