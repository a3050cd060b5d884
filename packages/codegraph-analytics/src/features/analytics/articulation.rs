//! Articulation points and bridges
//!
//! The directed graph is viewed as undirected: each node's neighbor set is
//! the deduplicated union of outgoing targets and incoming sources, minus
//! itself. The DFS is iterative with the same four-phase frame state machine
//! as cycle detection; multi-start covers disconnected graphs and counts
//! components.
//!
//! Root rule: a DFS root is an articulation point iff it has ≥ 2 tree
//! children. Non-root v: articulation iff some tree child c has
//! low(c) ≥ disc(v); bridge (v, c) iff low(c) > disc(v).

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::features::graph::CodeGraph;
use crate::shared::cancel::CancellationToken;
use crate::shared::models::{GraphError, NodeId};

/// Connectivity-critical nodes and edges
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticulationResult {
    /// Sorted articulation-point node IDs
    pub articulation_points: Vec<NodeId>,
    /// Sorted bridge endpoints (undirected, DFS-tree orientation)
    pub bridges: Vec<(NodeId, NodeId)>,
    /// Number of weakly connected components
    pub components: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Init,
    ProcessEdges,
    PostChild,
    Finalize,
}

struct Frame {
    node: usize,
    parent: Option<usize>,
    phase: Phase,
    cursor: usize,
    child: Option<usize>,
    tree_children: usize,
}

impl Frame {
    fn start(node: usize, parent: Option<usize>) -> Self {
        Self {
            node,
            parent,
            phase: Phase::Init,
            cursor: 0,
            child: None,
            tree_children: 0,
        }
    }
}

enum Step {
    Stay,
    Push(usize),
    Pop,
}

/// Find articulation points and bridges
///
/// On cancellation, whatever was discovered so far is returned with the
/// cancellation error.
pub fn find_articulation_points(
    graph: &CodeGraph,
    token: &CancellationToken,
) -> (ArticulationResult, Option<GraphError>) {
    if !graph.is_frozen() {
        return (ArticulationResult::default(), Some(GraphError::GraphNotFrozen));
    }

    let ids = graph.sorted_node_ids();
    let index_of: AHashMap<&str, usize> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    // Undirected deduplicated adjacency, self-edges skipped, sorted for
    // deterministic DFS order
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); ids.len()];
    for (i, id) in ids.iter().enumerate() {
        let Some(node) = graph.get_node(id) else {
            continue;
        };
        let mut neighbors: BTreeSet<usize> = BTreeSet::new();
        for target in graph.outgoing_targets(node) {
            if let Some(&t) = index_of.get(target) {
                if t != i {
                    neighbors.insert(t);
                }
            }
        }
        for source in graph.incoming_sources(node) {
            if let Some(&s) = index_of.get(source) {
                if s != i {
                    neighbors.insert(s);
                }
            }
        }
        adjacency[i] = neighbors.into_iter().collect();
    }

    let n = ids.len();
    let mut disc: Vec<usize> = vec![usize::MAX; n];
    let mut low: Vec<usize> = vec![usize::MAX; n];
    let mut visited: Vec<bool> = vec![false; n];
    let mut articulation: BTreeSet<usize> = BTreeSet::new();
    let mut bridges: BTreeSet<(usize, usize)> = BTreeSet::new();
    let mut counter = 0usize;
    let mut dispatches = 0usize;
    let mut components = 0usize;

    let partial = |articulation: &BTreeSet<usize>,
                   bridges: &BTreeSet<(usize, usize)>,
                   components: usize| ArticulationResult {
        articulation_points: articulation.iter().map(|&i| ids[i].clone()).collect(),
        bridges: bridges
            .iter()
            .map(|&(a, b)| (ids[a].clone(), ids[b].clone()))
            .collect(),
        components,
    };

    for start in 0..n {
        if visited[start] {
            continue;
        }
        if token.is_cancelled() {
            return (
                partial(&articulation, &bridges, components),
                Some(GraphError::Cancelled),
            );
        }
        components += 1;

        let mut frames: Vec<Frame> = vec![Frame::start(start, None)];
        while !frames.is_empty() {
            dispatches += 1;
            if dispatches % 1000 == 0 && token.is_cancelled() {
                return (
                    partial(&articulation, &bridges, components),
                    Some(GraphError::Cancelled),
                );
            }

            let step = {
                let frame = frames.last_mut().expect("stack is non-empty");
                let v = frame.node;
                match frame.phase {
                    Phase::Init => {
                        visited[v] = true;
                        disc[v] = counter;
                        low[v] = counter;
                        counter += 1;
                        frame.phase = Phase::ProcessEdges;
                        Step::Stay
                    }
                    Phase::ProcessEdges => {
                        if frame.cursor < adjacency[v].len() {
                            let w = adjacency[v][frame.cursor];
                            frame.cursor += 1;
                            if Some(w) == frame.parent {
                                Step::Stay
                            } else if !visited[w] {
                                frame.tree_children += 1;
                                frame.phase = Phase::PostChild;
                                frame.child = Some(w);
                                Step::Push(w)
                            } else {
                                low[v] = low[v].min(disc[w]);
                                Step::Stay
                            }
                        } else {
                            frame.phase = Phase::Finalize;
                            Step::Stay
                        }
                    }
                    Phase::PostChild => {
                        let c = frame.child.take().expect("post-child has a child");
                        low[v] = low[v].min(low[c]);
                        if frame.parent.is_some() && low[c] >= disc[v] {
                            articulation.insert(v);
                        }
                        if low[c] > disc[v] {
                            bridges.insert((v, c));
                        }
                        frame.phase = Phase::ProcessEdges;
                        Step::Stay
                    }
                    Phase::Finalize => {
                        if frame.parent.is_none() && frame.tree_children >= 2 {
                            articulation.insert(v);
                        }
                        Step::Pop
                    }
                }
            };

            match step {
                Step::Stay => {}
                Step::Push(w) => {
                    let parent = frames.last().map(|f| f.node);
                    frames.push(Frame::start(w, parent));
                }
                Step::Pop => {
                    frames.pop();
                }
            }
        }
    }

    let result = partial(&articulation, &bridges, components);
    debug!(
        articulation_points = result.articulation_points.len(),
        bridges = result.bridges.len(),
        components = result.components,
        "articulation analysis finished"
    );
    (result, None)
}
