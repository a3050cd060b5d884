//! Leiden community detection (sequential)
//!
//! Modularity-optimizing partition refinement (Traag et al., 2019), treating
//! the code graph as undirected:
//!
//! ```text
//! Q = Σ_c [ internal_c / m − γ · (sumDeg_c / 2m)² ]
//!
//! ΔQ(i → c) = (e_i→c − e_i→cur) / m
//!           − γ · k_i · (sumDeg_c − (sumDeg_cur − k_i)) / (2m²)
//! ```
//!
//! One iteration = local moves → refinement → modularity. Refinement splits
//! every community into its connected components within the induced
//! subgraph, which is Leiden's well-connectedness guarantee over plain
//! Louvain. Node order, candidate order, and renumbering are all derived
//! from the sorted node-ID bijection, so results are bit-for-bit
//! deterministic.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

use crate::features::graph::CodeGraph;
use crate::features::hierarchy::package_of;
use crate::shared::cancel::CancellationToken;
use crate::shared::models::{GraphError, NodeId, Result};

/// Leiden options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeidenOptions {
    pub max_iterations: usize,
    pub convergence_threshold: f64,
    /// Communities smaller than this are dropped from the output
    pub min_community_size: usize,
    /// Resolution γ: higher values favor smaller communities
    pub resolution: f64,
}

impl Default for LeidenOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            convergence_threshold: 1e-6,
            min_community_size: 1,
            resolution: 1.0,
        }
    }
}

/// One detected community
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Community {
    pub id: usize,
    /// Member node IDs, sorted
    pub node_ids: Vec<NodeId>,
    /// Most common member package (ties to the smallest name)
    pub dominant_package: String,
    pub internal_edges: usize,
    pub external_edges: usize,
    /// internal / (internal + external), 0 when isolated
    pub connectivity: f64,
}

/// Detection output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeidenResult {
    pub communities: Vec<Community>,
    pub modularity: f64,
    pub iterations: usize,
    pub converged: bool,
    pub node_count: usize,
    pub edge_count: usize,
}

/// Mutable algorithm state shared by the sequential and parallel variants
pub(crate) struct LeidenState {
    pub ids: Vec<NodeId>,
    /// Undirected degree |in| + |out| per node
    pub degree: Vec<f64>,
    /// Aggregated undirected adjacency: (neighbor, multiplicity)
    pub adj: Vec<Vec<(usize, f64)>>,
    /// Directed edges as index pairs (self-loops excluded)
    pub directed_edges: Vec<(usize, usize)>,
    /// Total edge count of the frozen graph
    pub m: f64,
    pub node_community: Vec<usize>,
    /// Degree sum per community, indexed by community ID (< n)
    pub community_degree: Vec<f64>,
}

impl LeidenState {
    /// Build state from a frozen graph (sequential precompute)
    pub(crate) fn from_graph(graph: &CodeGraph) -> Self {
        let ids = graph.sorted_node_ids();
        let n = ids.len();
        let index_of: AHashMap<&str, usize> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        let mut degree = vec![0.0; n];
        for (i, id) in ids.iter().enumerate() {
            if let Some(node) = graph.get_node(id) {
                degree[i] = (node.in_degree() + node.out_degree()) as f64;
            }
        }

        let mut directed_edges = Vec::with_capacity(graph.edge_count());
        let mut pair_weights: AHashMap<(usize, usize), f64> = AHashMap::new();
        for edge in graph.edges() {
            let (Some(&s), Some(&t)) = (
                index_of.get(edge.source_id.as_str()),
                index_of.get(edge.target_id.as_str()),
            ) else {
                continue;
            };
            if s == t {
                continue;
            }
            directed_edges.push((s, t));
            let key = if s < t { (s, t) } else { (t, s) };
            *pair_weights.entry(key).or_default() += 1.0;
        }

        let mut adj: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        let mut pairs: Vec<((usize, usize), f64)> = pair_weights.into_iter().collect();
        pairs.sort_by_key(|(pair, _)| *pair);
        for ((a, b), weight) in pairs {
            adj[a].push((b, weight));
            adj[b].push((a, weight));
        }
        for neighbors in &mut adj {
            neighbors.sort_by_key(|(idx, _)| *idx);
        }

        Self::assemble(ids, degree, adj, directed_edges, graph.edge_count() as f64)
    }

    /// Initial singleton partition over precomputed pieces
    pub(crate) fn assemble(
        ids: Vec<NodeId>,
        degree: Vec<f64>,
        adj: Vec<Vec<(usize, f64)>>,
        directed_edges: Vec<(usize, usize)>,
        m: f64,
    ) -> Self {
        let n = ids.len();
        let node_community: Vec<usize> = (0..n).collect();
        let community_degree = degree.clone();
        Self {
            ids,
            degree,
            adj,
            directed_edges,
            m,
            node_community,
            community_degree,
        }
    }

    /// One pass of local moves in sorted node order; true if any node moved
    pub(crate) fn local_moves(&mut self, resolution: f64) -> bool {
        if self.m == 0.0 {
            return false;
        }
        let m = self.m;
        let two_m_sq = 2.0 * m * m;
        let mut moved = false;

        for i in 0..self.ids.len() {
            let current = self.node_community[i];
            let k_i = self.degree[i];

            // Undirected incidences into each neighbor community, O(degree)
            let mut edges_to: BTreeMap<usize, f64> = BTreeMap::new();
            for &(neighbor, weight) in &self.adj[i] {
                *edges_to.entry(self.node_community[neighbor]).or_default() += weight;
            }
            let edges_to_current = edges_to.get(&current).copied().unwrap_or(0.0);
            let degree_current_without_i = self.community_degree[current] - k_i;

            let mut best: Option<(usize, f64)> = None;
            for (&candidate, &edges_to_candidate) in &edges_to {
                if candidate == current {
                    continue;
                }
                let delta_q = (edges_to_candidate - edges_to_current) / m
                    - resolution * k_i
                        * (self.community_degree[candidate] - degree_current_without_i)
                        / two_m_sq;
                if delta_q > 0.0 && best.map_or(true, |(_, best_q)| delta_q > best_q) {
                    best = Some((candidate, delta_q));
                }
            }

            if let Some((target, _)) = best {
                self.community_degree[current] -= k_i;
                self.community_degree[target] += k_i;
                self.node_community[i] = target;
                moved = true;
            }
        }
        moved
    }

    /// Current communities as (id → sorted members)
    pub(crate) fn communities(&self) -> BTreeMap<usize, Vec<usize>> {
        let mut map: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (node, &community) in self.node_community.iter().enumerate() {
            map.entry(community).or_default().push(node);
        }
        map
    }

    /// Connected components of a community's induced subgraph (BFS over the
    /// precomputed neighbor lists restricted to same-community members)
    pub(crate) fn split_components(&self, members: &[usize]) -> Vec<Vec<usize>> {
        let member_set: BTreeSet<usize> = members.iter().copied().collect();
        let mut unvisited = member_set.clone();
        let mut components = Vec::new();

        while let Some(&seed) = unvisited.iter().next() {
            unvisited.remove(&seed);
            let mut component = vec![seed];
            let mut queue = VecDeque::from([seed]);
            while let Some(current) = queue.pop_front() {
                for &(neighbor, _) in &self.adj[current] {
                    if member_set.contains(&neighbor) && unvisited.remove(&neighbor) {
                        component.push(neighbor);
                        queue.push_back(neighbor);
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }
        components
    }

    /// Install refined component groups as the new partition
    ///
    /// `groups` must cover every node exactly once; IDs are renumbered
    /// sequentially in the given order and degree sums rebuilt.
    pub(crate) fn install_partition(&mut self, groups: Vec<Vec<usize>>) {
        self.community_degree = vec![0.0; self.ids.len()];
        for (community, members) in groups.iter().enumerate() {
            for &node in members {
                self.node_community[node] = community;
                self.community_degree[community] += self.degree[node];
            }
        }
    }

    /// Sequential refinement: split every multi-node community into its
    /// induced connected components
    pub(crate) fn refine(&mut self) {
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for (_, members) in self.communities() {
            if members.len() <= 1 {
                groups.push(members);
            } else {
                groups.extend(self.split_components(&members));
            }
        }
        self.install_partition(groups);
    }

    /// Internal (directed) edge count per community
    pub(crate) fn internal_edge_counts(&self) -> AHashMap<usize, f64> {
        let mut internal: AHashMap<usize, f64> = AHashMap::new();
        for &(s, t) in &self.directed_edges {
            let community = self.node_community[s];
            if community == self.node_community[t] {
                *internal.entry(community).or_default() += 1.0;
            }
        }
        internal
    }

    /// Q = Σ_c [ internal_c / m − γ (sumDeg_c / 2m)² ]
    pub(crate) fn modularity(&self, resolution: f64) -> f64 {
        if self.m == 0.0 {
            return 0.0;
        }
        let internal = self.internal_edge_counts();
        self.modularity_from_internal(&internal, resolution)
    }

    pub(crate) fn modularity_from_internal(
        &self,
        internal: &AHashMap<usize, f64>,
        resolution: f64,
    ) -> f64 {
        let m = self.m;
        let two_m = 2.0 * m;
        self.communities()
            .into_iter()
            .map(|(community, _)| {
                let internal_c = internal.get(&community).copied().unwrap_or(0.0);
                let degree_sum = self.community_degree[community];
                internal_c / m - resolution * (degree_sum / two_m).powi(2)
            })
            .sum()
    }

    /// Assemble the public result from the current partition
    pub(crate) fn build_result(
        &self,
        graph: &CodeGraph,
        options: &LeidenOptions,
        modularity: f64,
        iterations: usize,
        converged: bool,
    ) -> LeidenResult {
        // Per-community directed internal/external counts
        let mut internal: AHashMap<usize, usize> = AHashMap::new();
        let mut external: AHashMap<usize, usize> = AHashMap::new();
        for &(s, t) in &self.directed_edges {
            let cs = self.node_community[s];
            let ct = self.node_community[t];
            if cs == ct {
                *internal.entry(cs).or_default() += 1;
            } else {
                *external.entry(cs).or_default() += 1;
                *external.entry(ct).or_default() += 1;
            }
        }

        let mut communities = Vec::new();
        let kept = self
            .communities()
            .into_iter()
            .filter(|(_, members)| members.len() >= options.min_community_size);
        for (next_id, (community, members)) in kept.enumerate() {
            let node_ids: Vec<NodeId> = members.iter().map(|&i| self.ids[i].clone()).collect();

            let mut package_votes: BTreeMap<String, usize> = BTreeMap::new();
            for id in &node_ids {
                *package_votes.entry(node_package(graph, id)).or_default() += 1;
            }
            let dominant_package = package_votes
                .iter()
                .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
                .map(|(package, _)| package.clone())
                .unwrap_or_default();

            let internal_edges = internal.get(&community).copied().unwrap_or(0);
            let external_edges = external.get(&community).copied().unwrap_or(0);
            let connectivity = if internal_edges + external_edges == 0 {
                0.0
            } else {
                internal_edges as f64 / (internal_edges + external_edges) as f64
            };
            communities.push(Community {
                id: next_id,
                node_ids,
                dominant_package,
                internal_edges,
                external_edges,
                connectivity,
            });
        }

        LeidenResult {
            communities,
            modularity,
            iterations,
            converged,
            node_count: self.ids.len(),
            edge_count: self.directed_edges.len(),
        }
    }
}

/// Package of a node: the symbol's package when available, else parsed from
/// the node-ID format (last `/` before the first `:`)
pub(crate) fn node_package(graph: &CodeGraph, node_id: &str) -> String {
    if let Some(node) = graph.get_node(node_id) {
        let package = package_of(&node.symbol);
        if !package.is_empty() {
            return package;
        }
    }
    package_from_node_id(node_id)
}

/// `src/pkg/file.go:12:Name` → `src/pkg`
pub(crate) fn package_from_node_id(node_id: &str) -> String {
    let before_colon = node_id.split(':').next().unwrap_or(node_id);
    match before_colon.rsplit_once('/') {
        Some((dir, _)) => dir.to_string(),
        None => String::new(),
    }
}

/// Run sequential Leiden community detection
///
/// Cancellation is checked at iteration boundaries and returns an error.
pub fn detect_communities(
    graph: &CodeGraph,
    options: &LeidenOptions,
    token: &CancellationToken,
) -> Result<LeidenResult> {
    if !graph.is_frozen() {
        return Err(GraphError::GraphNotFrozen);
    }
    let state = LeidenState::from_graph(graph);
    run(state, graph, options, token)
}

/// Shared iteration loop over a prepared state
pub(crate) fn run(
    mut state: LeidenState,
    graph: &CodeGraph,
    options: &LeidenOptions,
    token: &CancellationToken,
) -> Result<LeidenResult> {
    let mut iterations = 0usize;
    let mut converged = false;
    let mut previous_q = f64::NEG_INFINITY;
    let mut q = state.modularity(options.resolution);

    while iterations < options.max_iterations {
        token.check()?;
        iterations += 1;

        let improved = state.local_moves(options.resolution);
        state.refine();
        q = state.modularity(options.resolution);

        if !improved {
            converged = true;
            break;
        }
        if iterations > 1 && q - previous_q < options.convergence_threshold {
            converged = true;
            break;
        }
        previous_q = q;
    }

    debug!(
        iterations,
        converged,
        modularity = q,
        "leiden finished"
    );
    Ok(state.build_result(graph, options, q, iterations, converged))
}

/// Communities whose members span at least two packages
pub fn cross_package_communities<'a>(
    result: &'a LeidenResult,
    graph: &CodeGraph,
) -> Vec<&'a Community> {
    result
        .communities
        .iter()
        .filter(|community| {
            let packages: BTreeSet<String> = community
                .node_ids
                .iter()
                .map(|id| node_package(graph, id))
                .collect();
            packages.len() >= 2
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{EdgeKind, Location, Symbol, SymbolKind};
    use pretty_assertions::assert_eq;

    pub(crate) fn clique_pair_graph() -> CodeGraph {
        // Two 4-cliques joined by nothing: the classic two-community input
        let mut g = CodeGraph::with_default_limits("/repo");
        let groups = [("a", "pkg/a"), ("b", "pkg/b")];
        for (prefix, pkg) in groups {
            for i in 0..4 {
                let id = format!("{}{}", prefix, i);
                g.add_node(
                    Symbol::new(&id, &id, SymbolKind::Function, format!("{}/f.go", pkg))
                        .with_package(pkg),
                )
                .unwrap();
            }
            for i in 0..4 {
                for j in (i + 1)..4 {
                    g.add_edge(
                        &format!("{}{}", prefix, i),
                        &format!("{}{}", prefix, j),
                        EdgeKind::Calls,
                        Location::zero(),
                    )
                    .unwrap();
                }
            }
        }
        g.freeze().unwrap();
        g
    }

    #[test]
    fn test_requires_frozen() {
        let g = CodeGraph::with_default_limits("/repo");
        assert!(matches!(
            detect_communities(&g, &LeidenOptions::default(), &CancellationToken::new()),
            Err(GraphError::GraphNotFrozen)
        ));
    }

    #[test]
    fn test_empty_graph() {
        let mut g = CodeGraph::with_default_limits("/repo");
        g.freeze().unwrap();
        let result =
            detect_communities(&g, &LeidenOptions::default(), &CancellationToken::new()).unwrap();
        assert!(result.communities.is_empty());
        assert_eq!(result.modularity, 0.0);
        assert!(result.converged);
    }

    #[test]
    fn test_two_cliques_two_communities() {
        let g = clique_pair_graph();
        let result =
            detect_communities(&g, &LeidenOptions::default(), &CancellationToken::new()).unwrap();

        assert_eq!(result.communities.len(), 2);
        assert!(result.converged);
        assert!(result.modularity > 0.3, "Q = {}", result.modularity);

        let members_a: Vec<&str> = result.communities[0]
            .node_ids
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(members_a, vec!["a0", "a1", "a2", "a3"]);
        assert_eq!(result.communities[0].dominant_package, "pkg/a");
        assert_eq!(result.communities[0].internal_edges, 6);
        assert_eq!(result.communities[0].external_edges, 0);
        assert_eq!(result.communities[0].connectivity, 1.0);
    }

    #[test]
    fn test_modularity_within_bounds() {
        let g = clique_pair_graph();
        let result =
            detect_communities(&g, &LeidenOptions::default(), &CancellationToken::new()).unwrap();
        assert!(result.modularity >= -0.5 && result.modularity <= 1.0);
        assert!(result.iterations <= LeidenOptions::default().max_iterations);
    }

    #[test]
    fn test_communities_are_connected() {
        let g = clique_pair_graph();
        let result =
            detect_communities(&g, &LeidenOptions::default(), &CancellationToken::new()).unwrap();
        // Refinement guarantees no disconnected community survives
        let state = LeidenState::from_graph(&g);
        for community in &result.communities {
            let members: Vec<usize> = community
                .node_ids
                .iter()
                .map(|id| state.ids.iter().position(|x| x == id).unwrap())
                .collect();
            assert_eq!(state.split_components(&members).len(), 1);
        }
    }

    #[test]
    fn test_min_community_size_filters_output() {
        let mut g = CodeGraph::with_default_limits("/repo");
        for id in ["a", "b", "lonely"] {
            g.add_node(Symbol::new(id, id, SymbolKind::Function, "x/f.go").with_package("x"))
                .unwrap();
        }
        g.add_edge("a", "b", EdgeKind::Calls, Location::zero()).unwrap();
        g.freeze().unwrap();

        let options = LeidenOptions {
            min_community_size: 2,
            ..Default::default()
        };
        let result = detect_communities(&g, &options, &CancellationToken::new()).unwrap();
        assert_eq!(result.communities.len(), 1);
        assert_eq!(result.communities[0].node_ids, vec!["a", "b"]);
    }

    #[test]
    fn test_cancellation_errors() {
        let g = clique_pair_graph();
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(
            detect_communities(&g, &LeidenOptions::default(), &token),
            Err(GraphError::Cancelled)
        );
    }

    #[test]
    fn test_determinism() {
        let g = clique_pair_graph();
        let run = || {
            detect_communities(&g, &LeidenOptions::default(), &CancellationToken::new()).unwrap()
        };
        let first = run();
        let second = run();
        assert_eq!(first, second);
    }

    #[test]
    fn test_package_from_node_id() {
        assert_eq!(package_from_node_id("src/pkg/file.go:12:Name"), "src/pkg");
        assert_eq!(package_from_node_id("file.go:1:X"), "");
        assert_eq!(package_from_node_id("external:fmt:Println"), "");
    }

    #[test]
    fn test_cross_package_helper() {
        let mut g = CodeGraph::with_default_limits("/repo");
        for (id, pkg) in [("a", "x"), ("b", "y")] {
            g.add_node(
                Symbol::new(id, id, SymbolKind::Function, format!("{}/f.go", pkg))
                    .with_package(pkg),
            )
            .unwrap();
        }
        // Dense pair merges into one cross-package community
        g.add_edge("a", "b", EdgeKind::Calls, Location::zero()).unwrap();
        g.add_edge("b", "a", EdgeKind::Calls, Location::zero()).unwrap();
        g.freeze().unwrap();

        let result =
            detect_communities(&g, &LeidenOptions::default(), &CancellationToken::new()).unwrap();
        assert_eq!(result.communities.len(), 1);
        let spanning = cross_package_communities(&result, &g);
        assert_eq!(spanning.len(), 1);
    }
}
