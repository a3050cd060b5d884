//! Builder configuration and result records

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::features::graph::{CodeGraph, DEFAULT_MAX_EDGES, DEFAULT_MAX_NODES};

/// Build pipeline phase, reported through the progress callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildPhase {
    Collecting,
    ExtractingEdges,
    Finalizing,
}

impl BuildPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildPhase::Collecting => "collecting",
            BuildPhase::ExtractingEdges => "extracting_edges",
            BuildPhase::Finalizing => "finalizing",
        }
    }
}

/// Progress callback: (phase, files_total, files_processed, nodes_created,
/// edges_created)
pub type ProgressFn = Arc<dyn Fn(BuildPhase, usize, usize, usize, usize) + Send + Sync>;

/// Build options
///
/// `max_memory_mb` is a soft ceiling: when the estimated footprint crosses
/// it, the build stops early and the result is marked incomplete, without an
/// error.
#[derive(Clone)]
pub struct BuildOptions {
    pub project_root: String,
    pub max_memory_mb: usize,
    /// Worker count for the parallel edge-extraction fan-out
    pub worker_count: usize,
    pub max_nodes: usize,
    pub max_edges: usize,
    pub progress: Option<ProgressFn>,
}

impl BuildOptions {
    pub fn new(project_root: impl Into<String>) -> Self {
        Self {
            project_root: project_root.into(),
            ..Default::default()
        }
    }

    pub fn with_memory_limit_mb(mut self, mb: usize) -> Self {
        self.max_memory_mb = mb;
        self
    }

    pub fn with_worker_count(mut self, workers: usize) -> Self {
        self.worker_count = workers.max(1);
        self
    }

    pub fn with_capacity(mut self, max_nodes: usize, max_edges: usize) -> Self {
        self.max_nodes = max_nodes;
        self.max_edges = max_edges;
        self
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            project_root: String::new(),
            max_memory_mb: 0, // 0 = unlimited
            worker_count: num_cpus::get().max(1),
            max_nodes: DEFAULT_MAX_NODES,
            max_edges: DEFAULT_MAX_EDGES,
            progress: None,
        }
    }
}

impl std::fmt::Debug for BuildOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildOptions")
            .field("project_root", &self.project_root)
            .field("max_memory_mb", &self.max_memory_mb)
            .field("worker_count", &self.worker_count)
            .field("max_nodes", &self.max_nodes)
            .field("max_edges", &self.max_edges)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Per-file failure collected during the build (does not abort)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileError {
    pub file_path: String,
    pub error: String,
}

/// Per-edge failure collected during extraction (does not abort)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeError {
    pub source_id: String,
    pub target: String,
    pub error: String,
}

/// Counters stamped onto every build result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStats {
    pub duration_millis: u64,
    pub duration_micros: u64,
    pub files_processed: usize,
    pub files_failed: usize,
    pub nodes_created: usize,
    pub edges_created: usize,
    pub ambiguous_resolves: usize,
    pub placeholder_nodes: usize,
    pub call_edges_resolved: usize,
    pub call_edges_unresolved: usize,
    pub interface_edges: usize,
}

/// Output of one `GraphBuilder::build` invocation
///
/// The graph is always frozen, even on an incomplete build; `incomplete` is
/// set only for the memory soft-cap and cancellation.
#[derive(Debug)]
pub struct BuildResult {
    pub graph: CodeGraph,
    pub stats: BuildStats,
    pub file_errors: Vec<FileError>,
    pub edge_errors: Vec<EdgeError>,
    pub incomplete: bool,
}
