//! Path aggregate queries
//!
//! `path_query(u, v)` climbs both endpoints chain-by-chain toward their LCA:
//! while the endpoints sit on different heavy chains, the deeper chain's
//! head-to-endpoint prefix is folded in and the endpoint jumps above its
//! head; once the chains coincide, one final range covers the remainder,
//! including the LCA exactly once. Each climb crosses O(log V) chains, so a
//! path aggregate costs O(log² V) segment-tree work.
//!
//! Optional caches (both off by default): LCA results keyed by the ordered
//! endpoint pair, and full query results keyed the same way. The backing
//! segment tree is never mutated by this engine, so cached results stay
//! valid for its lifetime.

use ahash::AHashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use super::{QueryStats, QueryStatsSnapshot, TreeLayout};
use crate::features::hld::{HeavyLightDecomposition, HldForest};
use crate::features::segment_tree::{Aggregate, SegmentTree};
use crate::shared::models::{GraphError, NodeId, Result};
use crate::shared::trace::TraceStep;

/// Path aggregate engine over one decomposition (or forest)
pub struct PathQueryEngine {
    layout: TreeLayout,
    tree: SegmentTree,
    aggregate: Aggregate,
    lca_cache: Option<Mutex<AHashMap<(NodeId, NodeId), NodeId>>>,
    result_cache: Option<Mutex<AHashMap<(NodeId, NodeId), i64>>>,
    stats: QueryStats,
}

impl PathQueryEngine {
    /// Engine over a single decomposition
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
            lca_cache: None,
            result_cache: None,
            stats: QueryStats::default(),
        }
    }

    /// Engine over a forest; cross-tree paths are rejected
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
            lca_cache: None,
            result_cache: None,
            stats: QueryStats::default(),
        }
    }

    /// Engine over a prebuilt segment tree
    ///
    /// The tree's aggregate must match the engine's and its length must
    /// equal the decomposition's position count; both are construction-time
    /// errors.
    pub fn from_segment_tree(
        hld: Arc<HeavyLightDecomposition>,
        tree: SegmentTree,
        aggregate: Aggregate,
    ) -> Result<Self> {
        if tree.aggregate() != aggregate {
            return Err(GraphError::AggregateMismatch(format!(
                "segment tree carries {}, engine needs {}",
                tree.aggregate(),
                aggregate
            )));
        }
        if tree.len() != hld.node_count() {
            return Err(GraphError::invalid_input(format!(
                "segment tree length {} does not cover {} positions",
                tree.len(),
                hld.node_count()
            )));
        }
        Ok(Self {
            layout: TreeLayout::Single(hld),
            tree,
            aggregate,
            lca_cache: None,
            result_cache: None,
            stats: QueryStats::default(),
        })
    }

    /// Enable the optional LCA and/or result caches
    pub fn with_caches(mut self, lca_cache: bool, result_cache: bool) -> Self {
        self.lca_cache = lca_cache.then(|| Mutex::new(AHashMap::new()));
        self.result_cache = result_cache.then(|| Mutex::new(AHashMap::new()));
        self
    }

    #[inline]
    pub fn aggregate(&self) -> Aggregate {
        self.aggregate
    }

    /// Aggregate over the unique u→v path (inclusive of both endpoints)
    pub fn path_query(&self, u: &str, v: &str) -> Result<i64> {
        let started = Instant::now();
        let key = ordered_key(u, v);

        if let Some(cache) = &self.result_cache {
            if let Some(&cached) = cache.lock().get(&key) {
                self.stats.record_cache_hit();
                self.stats.record(started.elapsed());
                return Ok(cached);
            }
            self.stats.record_cache_miss();
        }

        let (result, _) = self.climb(u, v, true)?;
        if let Some(cache) = &self.result_cache {
            cache.lock().insert(key, result);
        }
        self.stats.record(started.elapsed());
        Ok(result)
    }

    /// Lowest common ancestor of u and v
    pub fn lca(&self, u: &str, v: &str) -> Result<NodeId> {
        let key = ordered_key(u, v);
        if let Some(cache) = &self.lca_cache {
            if let Some(cached) = cache.lock().get(&key).cloned() {
                self.stats.record_cache_hit();
                return Ok(cached);
            }
            self.stats.record_cache_miss();
        }

        let (_, lca) = self.climb(u, v, false)?;
        if let Some(cache) = &self.lca_cache {
            cache.lock().insert(key, lca.clone());
        }
        Ok(lca)
    }

    pub fn path_sum(&self, u: &str, v: &str) -> Result<i64> {
        self.require_aggregate(Aggregate::Sum)?;
        self.path_query(u, v)
    }

    pub fn path_min(&self, u: &str, v: &str) -> Result<i64> {
        self.require_aggregate(Aggregate::Min)?;
        self.path_query(u, v)
    }

    pub fn path_max(&self, u: &str, v: &str) -> Result<i64> {
        self.require_aggregate(Aggregate::Max)?;
        self.path_query(u, v)
    }

    pub fn path_gcd(&self, u: &str, v: &str) -> Result<i64> {
        self.require_aggregate(Aggregate::Gcd)?;
        self.path_query(u, v)
    }

    /// Query plus a trace step for the caller's reasoning trace
    pub fn path_query_with_trace(&self, u: &str, v: &str) -> (Result<i64>, TraceStep) {
        let started = Instant::now();
        let result = self.path_query(u, v);
        let mut step = TraceStep::new("path_query", format!("{} -> {}", u, v))
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

    /// Chain climb; returns the aggregate (when `fold` is set) and the LCA
    fn climb(&self, u: &str, v: &str, fold: bool) -> Result<(i64, NodeId)> {
        let from = self.layout.locate(u)?;
        let to = self.layout.locate(v)?;
        if from.tree_index != to.tree_index {
            return Err(GraphError::CrossTreeQuery {
                from: u.to_string(),
                to: v.to_string(),
            });
        }

        let tree: &HeavyLightDecomposition = from.tree;
        let offset = from.offset;
        let mut a = from.local;
        let mut b = to.local;
        let mut acc = self.aggregate.identity();

        while tree.head(a) != tree.head(b) {
            if tree.depth(tree.head(a)) < tree.depth(tree.head(b)) {
                std::mem::swap(&mut a, &mut b);
            }
            let head = tree.head(a);
            if fold {
                let segment = self
                    .tree
                    .range_query(offset + tree.position(head), offset + tree.position(a))?;
                acc = self.aggregate.combine(acc, segment);
            }
            a = tree
                .parent(head)
                .ok_or_else(|| GraphError::validation("chain head above root"))?;
        }

        // Same chain: one final range covers the rest, LCA included once
        let (lo, hi) = if tree.position(a) <= tree.position(b) {
            (tree.position(a), tree.position(b))
        } else {
            (tree.position(b), tree.position(a))
        };
        if fold {
            let segment = self.tree.range_query(offset + lo, offset + hi)?;
            acc = self.aggregate.combine(acc, segment);
        }

        let lca_idx = if tree.depth(a) <= tree.depth(b) { a } else { b };
        Ok((acc, tree.id_at(lca_idx).to_string()))
    }
}

fn ordered_key(u: &str, v: &str) -> (NodeId, NodeId) {
    if u <= v {
        (u.to_string(), v.to_string())
    } else {
        (v.to_string(), u.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::graph::CodeGraph;
    use crate::features::hld::ForestOptions;
    use crate::shared::cancel::CancellationToken;
    use crate::shared::models::{EdgeKind, Location, Symbol, SymbolKind};
    use pretty_assertions::assert_eq;

    fn tree_graph(nodes: &[&str], edges: &[(&str, &str)]) -> CodeGraph {
        let mut g = CodeGraph::with_default_limits("/repo");
        for id in nodes {
            g.add_node(Symbol::new(*id, *id, SymbolKind::Function, "a.go"))
                .unwrap();
        }
        for (from, to) in edges {
            g.add_edge(from, to, EdgeKind::Calls, Location::in_file("a.go"))
                .unwrap();
        }
        g.freeze().unwrap();
        g
    }

    /// Canonical test tree with its value assignment
    fn scenario_engine(aggregate: Aggregate) -> PathQueryEngine {
        let g = tree_graph(
            &["1", "2", "3", "4", "5", "6", "7", "8", "9"],
            &[
                ("1", "2"),
                ("1", "3"),
                ("1", "4"),
                ("2", "5"),
                ("2", "6"),
                ("4", "7"),
                ("5", "8"),
                ("5", "9"),
            ],
        );
        let hld = Arc::new(HeavyLightDecomposition::new(&g, "1", &CancellationToken::new()).unwrap());
        let values: HashMap<String, i64> = [
            ("1", 5),
            ("2", 10),
            ("3", 2),
            ("4", 8),
            ("5", 3),
            ("6", 7),
            ("7", 4),
            ("8", 1),
            ("9", 6),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        PathQueryEngine::new(hld, &values, aggregate)
    }

    #[test]
    fn test_path_sum_across_chains() {
        let engine = scenario_engine(Aggregate::Sum);
        // 8→5→2→1→4→7 = 1+3+10+5+8+4
        assert_eq!(engine.path_sum("8", "7").unwrap(), 31);
    }

    #[test]
    fn test_path_to_root() {
        let engine = scenario_engine(Aggregate::Min);
        // 8→5→2→1 values {1,3,10,5}
        assert_eq!(engine.path_min("8", "1").unwrap(), 1);

        let engine = scenario_engine(Aggregate::Max);
        // 9→5→2→1 values {6,3,10,5}
        assert_eq!(engine.path_max("9", "1").unwrap(), 10);
    }

    #[test]
    fn test_single_node_path() {
        let engine = scenario_engine(Aggregate::Sum);
        assert_eq!(engine.path_sum("5", "5").unwrap(), 3);
    }

    #[test]
    fn test_lca() {
        let engine = scenario_engine(Aggregate::Sum);
        assert_eq!(engine.lca("8", "9").unwrap(), "5");
        assert_eq!(engine.lca("8", "7").unwrap(), "1");
        assert_eq!(engine.lca("8", "5").unwrap(), "5");
        assert_eq!(engine.lca("3", "3").unwrap(), "3");
    }

    #[test]
    fn test_aggregate_mismatch() {
        let engine = scenario_engine(Aggregate::Sum);
        assert!(matches!(
            engine.path_min("8", "7"),
            Err(GraphError::AggregateMismatch(_))
        ));
        assert!(matches!(
            engine.path_gcd("8", "7"),
            Err(GraphError::AggregateMismatch(_))
        ));
    }

    #[test]
    fn test_input_errors() {
        let engine = scenario_engine(Aggregate::Sum);
        assert!(matches!(
            engine.path_query("", "7"),
            Err(GraphError::InvalidInput(_))
        ));
        assert!(matches!(
            engine.path_query("8", "missing"),
            Err(GraphError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_gcd_chain() {
        // 12→18→24 chain, values = node labels
        let g = tree_graph(&["12", "18", "24"], &[("12", "18"), ("18", "24")]);
        let hld =
            Arc::new(HeavyLightDecomposition::new(&g, "12", &CancellationToken::new()).unwrap());
        let values: HashMap<String, i64> = [("12", 12), ("18", 18), ("24", 24)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let engine = PathQueryEngine::new(hld, &values, Aggregate::Gcd);
        assert_eq!(engine.path_gcd("12", "24").unwrap(), 6);
    }

    #[test]
    fn test_prebuilt_tree_aggregate_checked_at_construction() {
        let g = tree_graph(&["a", "b"], &[("a", "b")]);
        let hld =
            Arc::new(HeavyLightDecomposition::new(&g, "a", &CancellationToken::new()).unwrap());

        let wrong = crate::features::segment_tree::SegmentTree::new(&[1, 2], Aggregate::Min);
        assert!(matches!(
            PathQueryEngine::from_segment_tree(Arc::clone(&hld), wrong, Aggregate::Sum),
            Err(GraphError::AggregateMismatch(_))
        ));

        let short = crate::features::segment_tree::SegmentTree::new(&[1], Aggregate::Sum);
        assert!(matches!(
            PathQueryEngine::from_segment_tree(Arc::clone(&hld), short, Aggregate::Sum),
            Err(GraphError::InvalidInput(_))
        ));

        let right = crate::features::segment_tree::SegmentTree::new(&[1, 2], Aggregate::Sum);
        let engine = PathQueryEngine::from_segment_tree(hld, right, Aggregate::Sum).unwrap();
        assert_eq!(engine.path_sum("a", "b").unwrap(), 3);
    }

    #[test]
    fn test_forest_cross_tree_query() {
        let g = tree_graph(
            &["A", "B", "C", "X", "Y", "Z"],
            &[("A", "B"), ("B", "C"), ("X", "Y"), ("Y", "Z")],
        );
        let forest =
            Arc::new(HldForest::new(&g, ForestOptions::default(), &CancellationToken::new()).unwrap());
        let values: HashMap<String, i64> = [
            ("A", 10),
            ("B", 20),
            ("C", 30),
            ("X", 100),
            ("Y", 200),
            ("Z", 300),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        let engine = PathQueryEngine::from_forest(forest, &values, Aggregate::Sum);

        assert_eq!(engine.path_sum("A", "C").unwrap(), 60);
        assert_eq!(engine.path_sum("X", "Z").unwrap(), 600);
        assert!(matches!(
            engine.path_sum("A", "Z"),
            Err(GraphError::CrossTreeQuery { .. })
        ));
    }

    #[test]
    fn test_caches_and_stats() {
        let engine = scenario_engine(Aggregate::Sum).with_caches(true, true);
        assert_eq!(engine.path_query("8", "7").unwrap(), 31);
        // Second call hits the result cache (key is order-independent)
        assert_eq!(engine.path_query("7", "8").unwrap(), 31);

        let stats = engine.stats();
        assert_eq!(stats.query_count, 2);
        assert!(stats.cache_hit_ratio > 0.0);
    }

    #[test]
    fn test_trace_step() {
        let engine = scenario_engine(Aggregate::Sum);
        let (result, step) = engine.path_query_with_trace("8", "7");
        assert_eq!(result.unwrap(), 31);
        assert_eq!(step.action, "path_query");
        assert_eq!(step.metadata["aggregate"], "sum");
        assert_eq!(step.metadata["result"], "31");
    }
}
