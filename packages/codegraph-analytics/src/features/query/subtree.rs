//! Subtree aggregate queries
//!
//! A subtree is a single contiguous position interval
//! [pos(v), pos(v) + subSize(v)), so every subtree aggregate is one
//! segment-tree range query. In forest mode the interval is shifted by the
//! owning tree's global offset.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use super::{QueryStats, QueryStatsSnapshot, TreeLayout};
use crate::features::hld::{HeavyLightDecomposition, HldForest};
use crate::features::segment_tree::{Aggregate, SegmentTree};
use crate::shared::models::{GraphError, NodeId, Result};
use crate::shared::trace::TraceStep;

/// Subtree aggregate engine over one decomposition (or forest)
pub struct SubtreeQueryEngine {
    layout: TreeLayout,
    tree: SegmentTree,
    aggregate: Aggregate,
    stats: QueryStats,
}

impl SubtreeQueryEngine {
    pub fn new(
        hld: Arc<HeavyLightDecomposition>,
        values: &HashMap<NodeId, i64>,
        aggregate: Aggregate,
    ) -> Self {
        let layout = TreeLayout::Single(hld);
        let laid_out = layout.layout_values(values, aggregate);
        Self {
            layout,
            tree: SegmentTree::new(&laid_out, aggregate),
            aggregate,
            stats: QueryStats::default(),
        }
    }

    pub fn from_forest(
        forest: Arc<HldForest>,
        values: &HashMap<NodeId, i64>,
        aggregate: Aggregate,
    ) -> Self {
        let layout = TreeLayout::Forest(forest);
        let laid_out = layout.layout_values(values, aggregate);
        Self {
            layout,
            tree: SegmentTree::new(&laid_out, aggregate),
            aggregate,
            stats: QueryStats::default(),
        }
    }

    #[inline]
    pub fn aggregate(&self) -> Aggregate {
        self.aggregate
    }

    /// Global inclusive position interval covered by the node's subtree
    pub fn subtree_range(&self, node_id: &str) -> Result<(usize, usize)> {
        let located = self.layout.locate(node_id)?;
        let start = located.offset + located.tree.position(located.local);
        let end = start + located.tree.sub_size(located.local) - 1;
        Ok((start, end))
    }

    /// Aggregate over the node's whole subtree (the node included)
    pub fn subtree_query(&self, node_id: &str) -> Result<i64> {
        let started = Instant::now();
        let (start, end) = self.subtree_range(node_id)?;
        let result = self.tree.range_query(start, end);
        self.stats.record(started.elapsed());
        result
    }

    pub fn subtree_sum(&self, node_id: &str) -> Result<i64> {
        self.require_aggregate(Aggregate::Sum)?;
        self.subtree_query(node_id)
    }

    pub fn subtree_min(&self, node_id: &str) -> Result<i64> {
        self.require_aggregate(Aggregate::Min)?;
        self.subtree_query(node_id)
    }

    pub fn subtree_max(&self, node_id: &str) -> Result<i64> {
        self.require_aggregate(Aggregate::Max)?;
        self.subtree_query(node_id)
    }

    pub fn subtree_gcd(&self, node_id: &str) -> Result<i64> {
        self.require_aggregate(Aggregate::Gcd)?;
        self.subtree_query(node_id)
    }

    /// Member node IDs in DFS (position) order
    pub fn subtree_nodes(&self, node_id: &str) -> Result<Vec<NodeId>> {
        let located = self.layout.locate(node_id)?;
        let hld: &HeavyLightDecomposition = located.tree;
        let start = hld.position(located.local);
        let end = start + hld.sub_size(located.local);
        Ok((start..end)
            .map(|pos| hld.id_at(hld.node_at_position(pos)).to_string())
            .collect())
    }

    pub fn subtree_query_with_trace(&self, node_id: &str) -> (Result<i64>, TraceStep) {
        let started = Instant::now();
        let result = self.subtree_query(node_id);
        let mut step = TraceStep::new("subtree_query", node_id)
            .with_duration(started.elapsed())
            .with_meta("aggregate", self.aggregate);
        match &result {
            Ok(value) => step = step.with_meta("result", value),
            Err(err) => step = step.with_error(err.to_string()),
        }
        (result, step)
    }

    pub fn stats(&self) -> QueryStatsSnapshot {
        self.stats.snapshot()
    }

    fn require_aggregate(&self, expected: Aggregate) -> Result<()> {
        if self.aggregate != expected {
            return Err(GraphError::AggregateMismatch(format!(
                "engine aggregate is {}, query needs {}",
                self.aggregate, expected
            )));
        }
        Ok(())
    }

    pub(crate) fn tree_mut(&mut self) -> &mut SegmentTree {
        &mut self.tree
    }
}
