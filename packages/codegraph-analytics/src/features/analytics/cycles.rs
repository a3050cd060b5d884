//! Cyclic dependency detection (Tarjan SCC)
//!
//! Implemented with an explicit call-frame stack and a four-phase per-frame
//! state machine so deep graphs cannot exhaust the native stack. Components
//! of size 1 are not cycles and are dropped; self-loops therefore never
//! surface here.
//!
//! Starts are multi-rooted over the sorted node-ID list, so disconnected
//! regions are covered and output is deterministic.

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::features::graph::CodeGraph;
use crate::features::hierarchy::package_of;
use crate::shared::cancel::CancellationToken;
use crate::shared::models::{GraphError, NodeId};

/// One strongly connected component of size ≥ 2
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircularDependency {
    /// Members in discovery order
    pub node_ids: Vec<NodeId>,
    /// Distinct packages touched, sorted
    pub packages: Vec<String>,
    pub length: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Init,
    ProcessEdges,
    PostChild,
    Finalize,
}

struct Frame {
    node: NodeId,
    phase: Phase,
    cursor: usize,
    child: Option<NodeId>,
}

impl Frame {
    fn start(node: NodeId) -> Self {
        Self {
            node,
            phase: Phase::Init,
            cursor: 0,
            child: None,
        }
    }
}

/// Stack transition decided while the top frame is borrowed
enum Step {
    Stay,
    Push(NodeId),
    Pop,
}

/// Find all dependency cycles
///
/// On cancellation the cycles found so far are returned together with the
/// cancellation error.
pub fn find_cycles(
    graph: &CodeGraph,
    token: &CancellationToken,
) -> (Vec<CircularDependency>, Option<GraphError>) {
    if !graph.is_frozen() {
        return (Vec::new(), Some(GraphError::GraphNotFrozen));
    }

    let mut index: AHashMap<NodeId, usize> = AHashMap::new();
    let mut lowlink: AHashMap<NodeId, usize> = AHashMap::new();
    let mut on_stack: AHashSet<NodeId> = AHashSet::new();
    let mut scc_stack: Vec<NodeId> = Vec::new();
    let mut counter = 0usize;
    let mut dispatches = 0usize;
    let mut cycles: Vec<CircularDependency> = Vec::new();

    for start in graph.sorted_node_ids() {
        if index.contains_key(&start) {
            continue;
        }
        if token.is_cancelled() {
            finalize_report(&mut cycles);
            return (cycles, Some(GraphError::Cancelled));
        }

        let mut frames: Vec<Frame> = vec![Frame::start(start)];

        while !frames.is_empty() {
            dispatches += 1;
            if dispatches % 1000 == 0 && token.is_cancelled() {
                finalize_report(&mut cycles);
                return (cycles, Some(GraphError::Cancelled));
            }

            let step = {
                let frame = frames.last_mut().expect("stack is non-empty");
                match frame.phase {
                    Phase::Init => {
                        index.insert(frame.node.clone(), counter);
                        lowlink.insert(frame.node.clone(), counter);
                        counter += 1;
                        scc_stack.push(frame.node.clone());
                        on_stack.insert(frame.node.clone());
                        frame.phase = Phase::ProcessEdges;
                        Step::Stay
                    }
                    Phase::ProcessEdges => {
                        let node = graph
                            .get_node(&frame.node)
                            .expect("frame node exists in frozen graph");
                        if frame.cursor < node.outgoing.len() {
                            let edge_index = node.outgoing[frame.cursor];
                            frame.cursor += 1;
                            match graph.edge(edge_index) {
                                None => Step::Stay,
                                Some(edge) => {
                                    let target = edge.target_id.clone();
                                    if !index.contains_key(&target) {
                                        frame.phase = Phase::PostChild;
                                        frame.child = Some(target.clone());
                                        Step::Push(target)
                                    } else {
                                        if on_stack.contains(&target) {
                                            let target_index = index[&target];
                                            let low = lowlink
                                                .get_mut(&frame.node)
                                                .expect("lowlink exists");
                                            *low = (*low).min(target_index);
                                        }
                                        Step::Stay
                                    }
                                }
                            }
                        } else {
                            frame.phase = Phase::Finalize;
                            Step::Stay
                        }
                    }
                    Phase::PostChild => {
                        let child = frame.child.take().expect("post-child has a child");
                        let child_low = lowlink[&child];
                        let low = lowlink.get_mut(&frame.node).expect("lowlink exists");
                        *low = (*low).min(child_low);
                        frame.phase = Phase::ProcessEdges;
                        Step::Stay
                    }
                    Phase::Finalize => {
                        if lowlink[&frame.node] == index[&frame.node] {
                            let mut members: Vec<NodeId> = Vec::new();
                            while let Some(top) = scc_stack.pop() {
                                on_stack.remove(&top);
                                let done = top == frame.node;
                                members.push(top);
                                if done {
                                    break;
                                }
                            }
                            if members.len() >= 2 {
                                members.reverse(); // discovery order
                                let packages: BTreeSet<String> = members
                                    .iter()
                                    .filter_map(|id| graph.get_node(id))
                                    .map(|n| package_of(&n.symbol))
                                    .collect();
                                cycles.push(CircularDependency {
                                    length: members.len(),
                                    node_ids: members,
                                    packages: packages.into_iter().collect(),
                                });
                            }
                        }
                        Step::Pop
                    }
                }
            };

            match step {
                Step::Stay => {}
                Step::Push(target) => frames.push(Frame::start(target)),
                Step::Pop => {
                    frames.pop();
                }
            }
        }
    }

    finalize_report(&mut cycles);
    debug!(cycles = cycles.len(), "cycle detection finished");
    (cycles, None)
}

/// Longest cycles first; equal lengths ordered by first member ID
fn finalize_report(cycles: &mut [CircularDependency]) {
    cycles.sort_by(|a, b| {
        b.length
            .cmp(&a.length)
            .then_with(|| a.node_ids.cmp(&b.node_ids))
    });
}
