//! Error types for the codegraph-analytics crate
//!
//! One closed taxonomy shared across the graph store, the builder, and every
//! query engine. Construction-time validation failures abort construction;
//! per-element failures during a build are collected into the build result
//! instead (see `features::builder`); analytical queries return
//! `(partial result, error)` on cancellation.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, GraphError>;

/// Unified error type
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    /// Nil/empty input or a path-traversal file path
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Symbol rejected by its validator
    #[error("invalid node: {0}")]
    InvalidNode(String),

    #[error("duplicate node: {0}")]
    DuplicateNode(String),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// Structural mutation attempted after freeze
    #[error("graph is frozen")]
    GraphFrozen,

    /// Read-side construction (hierarchy, analytics) over a building graph
    #[error("graph is not frozen")]
    GraphNotFrozen,

    #[error("capacity exceeded: {what} limit {limit}")]
    CapacityExceeded { what: &'static str, limit: usize },

    /// Subgraph handed to HLD is not a rooted tree
    #[error("invalid tree: {0}")]
    InvalidTree(String),

    /// Post-construction invariant check failed
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// Segment tree aggregate does not match the consuming engine
    #[error("aggregate mismatch: {0}")]
    AggregateMismatch(String),

    /// Path query endpoints live in different trees of a forest
    #[error("cross-tree query: {from} and {to} are in different trees")]
    CrossTreeQuery { from: String, to: String },

    #[error("operation cancelled")]
    Cancelled,

    /// Dominance frontier requested before an idom map exists
    #[error("dominance frontier unavailable: {0}")]
    DominanceFrontierUnavailable(String),

    /// Non-fatal: a method signature could not be parsed
    #[error("method parse failure: {0}")]
    MethodParseFailure(String),
}

impl GraphError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_node(message: impl Into<String>) -> Self {
        Self::InvalidNode(message.into())
    }

    pub fn invalid_tree(message: impl Into<String>) -> Self {
        Self::InvalidTree(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed(message.into())
    }

    /// Short stable tag for trace steps and observer labels
    pub fn kind(&self) -> &'static str {
        match self {
            GraphError::InvalidInput(_) => "invalid_input",
            GraphError::InvalidNode(_) => "invalid_node",
            GraphError::DuplicateNode(_) => "duplicate_node",
            GraphError::NodeNotFound(_) => "node_not_found",
            GraphError::GraphFrozen => "graph_frozen",
            GraphError::GraphNotFrozen => "graph_not_frozen",
            GraphError::CapacityExceeded { .. } => "capacity_exceeded",
            GraphError::InvalidTree(_) => "invalid_tree",
            GraphError::ValidationFailed(_) => "validation_failed",
            GraphError::AggregateMismatch(_) => "aggregate_mismatch",
            GraphError::CrossTreeQuery { .. } => "cross_tree_query",
            GraphError::Cancelled => "cancelled",
            GraphError::DominanceFrontierUnavailable(_) => "dominance_frontier_unavailable",
            GraphError::MethodParseFailure(_) => "method_parse_failure",
        }
    }
}
