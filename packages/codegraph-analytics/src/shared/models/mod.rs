//! Shared models

mod edge;
mod error;
mod location;
mod symbol;

pub use edge::{Edge, EdgeKind};
pub use error::{GraphError, Result};
pub use location::Location;
pub use symbol::{
    CallSite, Import, MethodSignature, ParseResult, Symbol, SymbolKind, SymbolMetadata, SymbolRef,
};

/// Node identifier type alias (node IDs are symbol IDs, verbatim)
pub type NodeId = String;
