//! Graph store: nodes, edges, secondary indexes, lifecycle

mod node;
mod store;

pub use node::Node;
pub use store::{
    CodeGraph, GraphLimits, GraphState, GraphStats, DEFAULT_MAX_EDGES, DEFAULT_MAX_NODES,
};
