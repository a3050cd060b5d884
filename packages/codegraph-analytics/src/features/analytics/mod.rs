//! Analytical queries over a frozen graph
//!
//! Each analysis lives in its own module; `GraphAnalytics` bundles them over
//! one graph reference and provides `*_with_trace` variants that return a
//! `TraceStep` for the caller's reasoning trace. All queries are pure
//! functions of the frozen graph, so retries are idempotent.

mod articulation;
mod coupling;
mod cycles;
mod dead_code;
mod dominance;
mod hotspots;
mod impact;
mod pagerank;

pub use articulation::{find_articulation_points, ArticulationResult};
pub use coupling::{package_coupling, PackageCoupling};
pub use cycles::{find_cycles, CircularDependency};
pub use dead_code::{find_dead_code, DeadCodeEntry};
pub use dominance::{dominance_frontier, DominanceFrontierResult};
pub use hotspots::{find_hotspots, Hotspot};
pub use impact::{transitive_dependencies, transitive_dependents, ImpactOptions};
pub use pagerank::{compute_pagerank, importance_ranking, PageRankConfig};

use ahash::AHashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::features::graph::CodeGraph;
use crate::shared::cancel::CancellationToken;
use crate::shared::models::{GraphError, NodeId, Result};
use crate::shared::observer::{noop_observer, Observer};
use crate::shared::trace::TraceStep;

/// Analytics bundle over one frozen graph
pub struct GraphAnalytics<'g> {
    graph: &'g CodeGraph,
    observer: Arc<dyn Observer>,
}

impl<'g> GraphAnalytics<'g> {
    pub fn new(graph: &'g CodeGraph) -> Self {
        Self {
            graph,
            observer: noop_observer(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    pub fn hotspots(&self, top_k: usize) -> Result<Vec<Hotspot>> {
        find_hotspots(self.graph, top_k)
    }

    pub fn hotspots_with_trace(&self, top_k: usize) -> (Result<Vec<Hotspot>>, TraceStep) {
        let started = Instant::now();
        let result = self.hotspots(top_k);
        let mut step = TraceStep::new("find_hotspots", "graph")
            .with_duration(started.elapsed())
            .with_meta("top_k", top_k)
            .with_meta("node_count", self.graph.node_count());
        match &result {
            Ok(hotspots) => {
                if let Some(top) = hotspots.first() {
                    step = step.with_meta("top_node", &top.node_id);
                }
                step = step.with_meta("returned", hotspots.len());
            }
            Err(err) => step = step.with_error(err.to_string()),
        }
        self.observer.observe("hotspots_queries", Vec::new(), 1.0);
        (result, step)
    }

    pub fn dead_code(&self) -> Result<Vec<DeadCodeEntry>> {
        find_dead_code(self.graph)
    }

    pub fn dead_code_with_trace(&self) -> (Result<Vec<DeadCodeEntry>>, TraceStep) {
        let started = Instant::now();
        let result = self.dead_code();
        let mut step = TraceStep::new("find_dead_code", "graph")
            .with_duration(started.elapsed())
            .with_meta("node_count", self.graph.node_count());
        match &result {
            Ok(dead) => step = step.with_meta("dead_count", dead.len()),
            Err(err) => step = step.with_error(err.to_string()),
        }
        (result, step)
    }

    pub fn cyclic_dependencies(
        &self,
        token: &CancellationToken,
    ) -> (Vec<CircularDependency>, Option<GraphError>) {
        find_cycles(self.graph, token)
    }

    pub fn cyclic_dependencies_with_trace(
        &self,
        token: &CancellationToken,
    ) -> (Vec<CircularDependency>, Option<GraphError>, TraceStep) {
        let started = Instant::now();
        let (cycles, error) = find_cycles(self.graph, token);
        let mut step = TraceStep::new("find_cycles", "graph")
            .with_duration(started.elapsed())
            .with_meta("cycle_count", cycles.len())
            .with_meta("node_count", self.graph.node_count());
        if let Some(largest) = cycles.first() {
            step = step.with_meta("largest_cycle", largest.length);
        }
        if let Some(err) = &error {
            step = step.with_error(err.to_string());
        }
        (cycles, error, step)
    }

    pub fn articulation_points(
        &self,
        token: &CancellationToken,
    ) -> (ArticulationResult, Option<GraphError>) {
        find_articulation_points(self.graph, token)
    }

    pub fn dominance_frontier(
        &self,
        idom: &HashMap<NodeId, NodeId>,
        entry: &str,
        token: &CancellationToken,
    ) -> (DominanceFrontierResult, Option<GraphError>) {
        dominance_frontier(self.graph, idom, entry, token)
    }

    pub fn package_coupling(&self) -> Result<Vec<PackageCoupling>> {
        package_coupling(self.graph)
    }

    pub fn package_coupling_with_trace(&self) -> (Result<Vec<PackageCoupling>>, TraceStep) {
        let started = Instant::now();
        let result = self.package_coupling();
        let mut step = TraceStep::new("package_coupling", "graph")
            .with_duration(started.elapsed());
        match &result {
            Ok(metrics) => {
                step = step.with_meta("packages_analyzed", metrics.len());
                let most_unstable = metrics
                    .iter()
                    .max_by(|a, b| {
                        a.instability
                            .partial_cmp(&b.instability)
                            .unwrap_or(std::cmp::Ordering::Equal)
                            // ties go to the smallest package name
                            .then_with(|| b.package.cmp(&a.package))
                    })
                    .map(|m| m.package.clone());
                if let Some(package) = most_unstable {
                    step = step.with_meta("most_unstable_pkg", package);
                }
            }
            Err(err) => step = step.with_error(err.to_string()),
        }
        (result, step)
    }

    pub fn pagerank(&self, config: &PageRankConfig) -> Result<AHashMap<NodeId, f64>> {
        compute_pagerank(self.graph, config)
    }

    pub fn importance_ranking(
        &self,
        top_k: usize,
        config: &PageRankConfig,
    ) -> Result<Vec<(NodeId, f64)>> {
        importance_ranking(self.graph, top_k, config)
    }

    pub fn transitive_dependents(
        &self,
        node_id: &str,
        options: ImpactOptions,
    ) -> Result<Vec<NodeId>> {
        transitive_dependents(self.graph, node_id, options)
    }

    pub fn transitive_dependencies(
        &self,
        node_id: &str,
        options: ImpactOptions,
    ) -> Result<Vec<NodeId>> {
        transitive_dependencies(self.graph, node_id, options)
    }
}
