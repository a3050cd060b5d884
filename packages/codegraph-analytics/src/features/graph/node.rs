//! Graph node
//!
//! A node does not own its `Symbol` (symbols are shared, immutable `Arc`s)
//! and does not own its edges: adjacency lists hold indices into the owning
//! graph's flat edge vector. This keeps the node/edge reference cycle out of
//! the ownership graph entirely.

use serde::{Deserialize, Serialize};

use crate::shared::models::{NodeId, SymbolKind, SymbolRef};

/// Node of the code graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Node ID (= symbol ID, verbatim)
    pub id: NodeId,
    pub symbol: SymbolRef,
    /// Indices of outgoing edges in the graph's edge vector
    pub outgoing: Vec<usize>,
    /// Indices of incoming edges in the graph's edge vector
    pub incoming: Vec<usize>,
}

impl Node {
    pub fn new(symbol: SymbolRef) -> Self {
        Self {
            id: symbol.id.clone(),
            symbol,
            outgoing: Vec::new(),
            incoming: Vec::new(),
        }
    }

    #[inline]
    pub fn out_degree(&self) -> usize {
        self.outgoing.len()
    }

    #[inline]
    pub fn in_degree(&self) -> usize {
        self.incoming.len()
    }

    #[inline]
    pub fn kind(&self) -> SymbolKind {
        self.symbol.kind
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.symbol.name
    }

    #[inline]
    pub fn file_path(&self) -> &str {
        &self.symbol.file_path
    }

    /// Placeholder nodes stand in for unresolved externals
    #[inline]
    pub fn is_external(&self) -> bool {
        self.symbol.kind == SymbolKind::External
    }
}
