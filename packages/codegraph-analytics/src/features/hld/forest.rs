//! HLD forest
//!
//! One heavy-light decomposition per weakly-connected component, with a
//! global position offset per tree so that positions form one contiguous
//! range [0, totalNodes) across the forest. Components are ordered by their
//! smallest member ID; each component's root is the smallest zero-in-degree
//! member (a component with no such node is not a rooted tree).

use ahash::AHashMap;
use std::collections::{BTreeSet, VecDeque};
use tracing::debug;

use super::decomposition::HeavyLightDecomposition;
use crate::features::graph::CodeGraph;
use crate::shared::cancel::CancellationToken;
use crate::shared::models::{GraphError, NodeId, Result};

/// Forest construction options
#[derive(Debug, Clone, Copy, Default)]
pub struct ForestOptions {
    /// Skip components that are not valid rooted trees instead of failing
    /// the whole construction
    pub skip_invalid_components: bool,
}

/// Ordered collection of per-component decompositions
#[derive(Debug)]
pub struct HldForest {
    trees: Vec<HeavyLightDecomposition>,
    /// Global position offset per tree; offsets are cumulative node counts
    offsets: Vec<usize>,
    /// Node ID → (tree index, local node index)
    locator: AHashMap<NodeId, (usize, usize)>,
    total_nodes: usize,
}

impl HldForest {
    pub fn new(
        graph: &CodeGraph,
        options: ForestOptions,
        token: &CancellationToken,
    ) -> Result<Self> {
        if !graph.is_frozen() {
            return Err(GraphError::GraphNotFrozen);
        }

        let components = weakly_connected_components(graph);
        let mut trees = Vec::new();
        let mut offsets = Vec::new();
        let mut locator: AHashMap<NodeId, (usize, usize)> = AHashMap::new();
        let mut total_nodes = 0usize;
        let mut skipped = 0usize;

        for members in components {
            token.check()?;
            let built = component_root(graph, &members).and_then(|root| {
                HeavyLightDecomposition::for_members(graph, &root, &members, token)
            });
            let tree = match built {
                Ok(tree) => tree,
                Err(GraphError::Cancelled) => return Err(GraphError::Cancelled),
                Err(err) => {
                    if options.skip_invalid_components {
                        skipped += 1;
                        continue;
                    }
                    return Err(err);
                }
            };

            let tree_index = trees.len();
            for (local, id) in tree.ids().iter().enumerate() {
                locator.insert(id.clone(), (tree_index, local));
            }
            offsets.push(total_nodes);
            total_nodes += tree.node_count();
            trees.push(tree);
        }

        debug!(
            trees = trees.len(),
            total_nodes, skipped, "forest construction finished"
        );
        Ok(Self {
            trees,
            offsets,
            locator,
            total_nodes,
        })
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.total_nodes
    }

    #[inline]
    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    #[inline]
    pub fn tree(&self, index: usize) -> Option<&HeavyLightDecomposition> {
        self.trees.get(index)
    }

    #[inline]
    pub fn offset(&self, tree_index: usize) -> Option<usize> {
        self.offsets.get(tree_index).copied()
    }

    /// (tree index, local node index, global position)
    pub fn locate(&self, node_id: &str) -> Option<(usize, usize, usize)> {
        let &(tree_index, local) = self.locator.get(node_id)?;
        let global = self.offsets[tree_index] + self.trees[tree_index].position(local);
        Some((tree_index, local, global))
    }
}

/// Weakly connected components over the undirected view, each as a sorted
/// member set; components ordered by smallest member ID
fn weakly_connected_components(graph: &CodeGraph) -> Vec<BTreeSet<NodeId>> {
    let mut assigned: BTreeSet<NodeId> = BTreeSet::new();
    let mut components = Vec::new();

    for id in graph.sorted_node_ids() {
        if assigned.contains(&id) {
            continue;
        }
        let mut members: BTreeSet<NodeId> = BTreeSet::new();
        let mut queue = VecDeque::from([id.clone()]);
        members.insert(id.clone());
        assigned.insert(id);

        while let Some(current) = queue.pop_front() {
            let Some(node) = graph.get_node(&current) else {
                continue;
            };
            let neighbors = graph
                .outgoing_targets(node)
                .chain(graph.incoming_sources(node));
            for neighbor in neighbors {
                if !assigned.contains(neighbor) {
                    assigned.insert(neighbor.to_string());
                    members.insert(neighbor.to_string());
                    queue.push_back(neighbor.to_string());
                }
            }
        }
        components.push(members);
    }
    components
}

/// Deterministic root: smallest member with zero in-degree from inside the
/// component
fn component_root(graph: &CodeGraph, members: &BTreeSet<NodeId>) -> Result<NodeId> {
    for id in members {
        let Some(node) = graph.get_node(id) else {
            continue;
        };
        let has_internal_parent = graph
            .incoming_sources(node)
            .any(|source| source != id && members.contains(source));
        if !has_internal_parent {
            return Ok(id.clone());
        }
    }
    Err(GraphError::invalid_tree(format!(
        "component containing {} has no root (cycle)",
        members
            .iter()
            .next()
            .map(String::as_str)
            .unwrap_or_default()
    )))
}
