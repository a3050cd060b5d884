//! Edge model
//!
//! Edges are the relationships of the code graph. The graph is a directed
//! multigraph: several edges with the same (source, target, kind) triple are
//! legal and represent distinct call sites or references, which is why every
//! edge carries the `Location` it was observed at.

use serde::{Deserialize, Serialize};

use super::location::Location;

/// Relationship kind between two symbols
///
/// Ordinals are stable: `EdgeKind::COUNT`-sized arrays are indexed by
/// `ordinal()`, so variants must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    Unknown,
    /// Function/method invocation
    Calls,
    /// File/package imports another package
    Imports,
    /// Container defines a nested symbol
    Defines,
    /// Type implements an interface (explicit or structural)
    Implements,
    /// Struct/class embeds or extends another type
    Embeds,
    /// Generic reference to a symbol
    References,
    /// Function/method returns a type
    Returns,
    /// Method is received on a type
    Receives,
    /// Reserved: parameter-type relationships are declared but never emitted
    Parameters,
}

impl EdgeKind {
    /// Number of variants; sizes the edges-by-kind index
    pub const COUNT: usize = 10;

    pub const ALL: [EdgeKind; EdgeKind::COUNT] = [
        EdgeKind::Unknown,
        EdgeKind::Calls,
        EdgeKind::Imports,
        EdgeKind::Defines,
        EdgeKind::Implements,
        EdgeKind::Embeds,
        EdgeKind::References,
        EdgeKind::Returns,
        EdgeKind::Receives,
        EdgeKind::Parameters,
    ];

    /// Stable ordinal used as an array index
    #[inline]
    pub fn ordinal(self) -> usize {
        match self {
            EdgeKind::Unknown => 0,
            EdgeKind::Calls => 1,
            EdgeKind::Imports => 2,
            EdgeKind::Defines => 3,
            EdgeKind::Implements => 4,
            EdgeKind::Embeds => 5,
            EdgeKind::References => 6,
            EdgeKind::Returns => 7,
            EdgeKind::Receives => 8,
            EdgeKind::Parameters => 9,
        }
    }

    pub fn from_ordinal(ordinal: usize) -> Option<Self> {
        Self::ALL.get(ordinal).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Unknown => "unknown",
            EdgeKind::Calls => "calls",
            EdgeKind::Imports => "imports",
            EdgeKind::Defines => "defines",
            EdgeKind::Implements => "implements",
            EdgeKind::Embeds => "embeds",
            EdgeKind::References => "references",
            EdgeKind::Returns => "returns",
            EdgeKind::Receives => "receives",
            EdgeKind::Parameters => "parameters",
        }
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Directed edge between two nodes
///
/// Endpoints are node IDs, never references: the owning graph resolves them
/// through its primary index (see the ownership notes in DESIGN.md).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source_id: String,
    pub target_id: String,
    pub kind: EdgeKind,
    pub location: Location,
}

impl Edge {
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        kind: EdgeKind,
        location: Location,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            kind,
            location,
        }
    }

    /// Self-edge (same source and target)
    #[inline]
    pub fn is_self_edge(&self) -> bool {
        self.source_id == self.target_id
    }
}
