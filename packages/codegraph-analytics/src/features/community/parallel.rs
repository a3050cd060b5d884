//! Parallel Leiden variant
//!
//! Same algorithm as the sequential engine; the degree/neighbor precompute,
//! refinement's per-community component finding, and the modularity
//! reduction fan out over a fixed-size rayon pool. Local moves stay
//! sequential: their result depends on visit order, and determinism requires
//! the sorted-ID order.
//!
//! Workers communicate only through pre-partitioned output slots; the single
//! shared mutable state is the merge lock around the precompute buffers.
//! Graphs under 1000 nodes fall back to the sequential engine (fan-out
//! overhead dominates below that).

use ahash::AHashMap;
use parking_lot::Mutex;
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::debug;

use super::leiden::{self, LeidenOptions, LeidenResult, LeidenState};
use crate::features::graph::CodeGraph;
use crate::shared::cancel::CancellationToken;
use crate::shared::models::{GraphError, Result};

/// Node count below which the sequential engine is used directly
const PARALLEL_THRESHOLD: usize = 1000;
/// Hard cap on the worker pool
const MAX_WORKERS: usize = 8;

/// Worker count: min(⌈n/100⌉ + 1, available parallelism, 8)
fn worker_count(n: usize) -> usize {
    let by_size = n.div_ceil(100) + 1;
    by_size.min(num_cpus::get()).min(MAX_WORKERS).max(1)
}

/// Run Leiden with parallel precompute/refinement/modularity
pub fn detect_communities_parallel(
    graph: &CodeGraph,
    options: &LeidenOptions,
    token: &CancellationToken,
) -> Result<LeidenResult> {
    if !graph.is_frozen() {
        return Err(GraphError::GraphNotFrozen);
    }
    let n = graph.node_count();
    if n < PARALLEL_THRESHOLD {
        return leiden::detect_communities(graph, options, token);
    }

    let workers = worker_count(n);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| GraphError::invalid_input(format!("worker pool: {}", e)))?;
    debug!(nodes = n, workers, "parallel leiden starting");

    let mut state = precompute_parallel(graph, &pool, workers);
    run_parallel(&mut state, graph, options, token, &pool)
}

/// Chunked degree/neighbor precompute, merged under a lock
fn precompute_parallel(
    graph: &CodeGraph,
    pool: &rayon::ThreadPool,
    workers: usize,
) -> LeidenState {
    let ids = graph.sorted_node_ids();
    let n = ids.len();
    let index_of: AHashMap<&str, usize> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    let chunk_size = n.div_ceil(workers).max(1);
    let merged: Mutex<(Vec<f64>, Vec<Vec<(usize, f64)>>)> =
        Mutex::new((vec![0.0; n], vec![Vec::new(); n]));

    pool.install(|| {
        ids.par_chunks(chunk_size)
            .enumerate()
            .for_each(|(chunk_index, chunk)| {
                let mut local: Vec<(usize, f64, Vec<(usize, f64)>)> =
                    Vec::with_capacity(chunk.len());
                for (offset, id) in chunk.iter().enumerate() {
                    let i = chunk_index * chunk_size + offset;
                    let Some(node) = graph.get_node(id) else {
                        continue;
                    };
                    let degree = (node.in_degree() + node.out_degree()) as f64;

                    // Each node derives its own adjacency row from its
                    // incident edges; no cross-slot writes
                    let mut weights: BTreeMap<usize, f64> = BTreeMap::new();
                    for target in graph.outgoing_targets(node) {
                        if let Some(&t) = index_of.get(target) {
                            if t != i {
                                *weights.entry(t).or_default() += 1.0;
                            }
                        }
                    }
                    for source in graph.incoming_sources(node) {
                        if let Some(&s) = index_of.get(source) {
                            if s != i {
                                *weights.entry(s).or_default() += 1.0;
                            }
                        }
                    }
                    local.push((i, degree, weights.into_iter().collect()));
                }

                let mut guard = merged.lock();
                for (i, degree, row) in local {
                    guard.0[i] = degree;
                    guard.1[i] = row;
                }
            });
    });

    let (degree, adj) = merged.into_inner();

    let mut directed_edges = Vec::with_capacity(graph.edge_count());
    for edge in graph.edges() {
        let (Some(&s), Some(&t)) = (
            index_of.get(edge.source_id.as_str()),
            index_of.get(edge.target_id.as_str()),
        ) else {
            continue;
        };
        if s != t {
            directed_edges.push((s, t));
        }
    }

    LeidenState::assemble(ids, degree, adj, directed_edges, graph.edge_count() as f64)
}

/// Refinement with per-community component finding fanned out
fn parallel_refine(state: &mut LeidenState, pool: &rayon::ThreadPool) {
    let communities = state.communities();

    let multi: Vec<(usize, Vec<usize>)> = communities
        .iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|(&community, members)| (community, members.clone()))
        .collect();

    let split: std::collections::HashMap<usize, Vec<Vec<usize>>, ahash::RandomState> = pool.install(|| {
        multi
            .par_iter()
            .map(|(community, members)| (*community, state.split_components(members)))
            .collect()
    });

    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (community, members) in communities {
        match split.get(&community) {
            Some(components) => groups.extend(components.iter().cloned()),
            None => groups.push(members),
        }
    }
    state.install_partition(groups);
}

/// Modularity with the internal-edge reduction fanned out over edge chunks
fn parallel_modularity(state: &LeidenState, resolution: f64, pool: &rayon::ThreadPool) -> f64 {
    if state.m == 0.0 {
        return 0.0;
    }
    let chunk_size = state.directed_edges.len().div_ceil(MAX_WORKERS).max(1);
    let internal: Mutex<AHashMap<usize, f64>> = Mutex::new(AHashMap::new());

    pool.install(|| {
        state
            .directed_edges
            .par_chunks(chunk_size)
            .for_each(|chunk| {
                let mut local: AHashMap<usize, f64> = AHashMap::new();
                for &(s, t) in chunk {
                    let community = state.node_community[s];
                    if community == state.node_community[t] {
                        *local.entry(community).or_default() += 1.0;
                    }
                }
                let mut guard = internal.lock();
                for (community, count) in local {
                    *guard.entry(community).or_default() += count;
                }
            });
    });

    let internal = internal.into_inner();
    state.modularity_from_internal(&internal, resolution)
}

/// The sequential iteration loop with parallel refine/modularity plugged in
fn run_parallel(
    state: &mut LeidenState,
    graph: &CodeGraph,
    options: &LeidenOptions,
    token: &CancellationToken,
    pool: &rayon::ThreadPool,
) -> Result<LeidenResult> {
    let mut iterations = 0usize;
    let mut converged = false;
    let mut previous_q = f64::NEG_INFINITY;
    let mut q = parallel_modularity(state, options.resolution, pool);

    while iterations < options.max_iterations {
        token.check()?;
        iterations += 1;

        let improved = state.local_moves(options.resolution);
        parallel_refine(state, pool);
        q = parallel_modularity(state, options.resolution, pool);

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

    debug!(iterations, converged, modularity = q, "parallel leiden finished");
    Ok(state.build_result(graph, options, q, iterations, converged))
}
