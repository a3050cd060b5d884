/*
 * Codegraph Analytics - in-memory code-graph analytics engine
 *
 * Feature-first architecture:
 * - shared/    : entity models, errors, cancellation, observability
 * - features/  : vertical slices (graph -> builder -> hierarchy ->
 *                analytics / community / hld / segment_tree / query)
 *
 * Lifecycle: per-file parse results enter the builder, which assembles and
 * freezes one graph; the hierarchical wrapper and every query engine are
 * constructed over the frozen graph and answer queries concurrently.
 */

/// Shared models and utilities
pub mod shared;

/// Feature modules
pub mod features;

// ═══════════════════════════════════════════════════════════════════════════
// Re-exports for the public API
// ═══════════════════════════════════════════════════════════════════════════

pub use shared::{
    attrs, noop_observer, Attributes, CallSite, CancellationToken, Edge, EdgeKind, GraphError,
    Import, Location, MethodSignature, NodeId, NoopObserver, Observer, ObserverSpan, ParseResult,
    Result, Symbol, SymbolKind, SymbolMetadata, SymbolRef, TraceStep,
};

pub use features::graph::{CodeGraph, GraphLimits, GraphState, GraphStats, Node};

pub use features::builder::{
    BuildOptions, BuildPhase, BuildResult, BuildStats, EdgeError, FileError, GraphBuilder,
    ProgressFn,
};

pub use features::hierarchy::{package_of, GraphLevel, HierarchicalGraph, PackageInfo};

pub use features::analytics::{
    compute_pagerank, dominance_frontier, find_articulation_points, find_cycles, find_dead_code,
    find_hotspots, importance_ranking, package_coupling, transitive_dependencies,
    transitive_dependents, ArticulationResult, CircularDependency, DeadCodeEntry,
    DominanceFrontierResult, GraphAnalytics, Hotspot, ImpactOptions, PackageCoupling,
    PageRankConfig,
};

pub use features::community::{
    cross_package_communities, detect_communities, detect_communities_parallel, Community,
    LeidenOptions, LeidenResult,
};

pub use features::hld::{ForestOptions, HeavyLightDecomposition, HldForest};

pub use features::segment_tree::{gcd, Aggregate, SegmentTree};

pub use features::query::{
    PathQueryEngine, QueryStatsSnapshot, SubtreeQueryEngine, SubtreeUpdateEngine,
    UpdateStatsSnapshot,
};
