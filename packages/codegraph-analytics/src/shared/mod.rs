//! Shared models and cross-cutting utilities

pub mod cancel;
pub mod models;
pub mod observer;
pub mod trace;

pub use cancel::CancellationToken;
pub use models::{
    CallSite, Edge, EdgeKind, GraphError, Import, Location, MethodSignature, NodeId, ParseResult,
    Result, Symbol, SymbolKind, SymbolMetadata, SymbolRef,
};
pub use observer::{attrs, noop_observer, Attributes, NoopObserver, Observer, ObserverSpan};
pub use trace::TraceStep;
