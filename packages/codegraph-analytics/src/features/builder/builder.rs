//! Graph builder
//!
//! Assembles a frozen `CodeGraph` from per-file parse results in ordered
//! phases: collect → per-file edge extraction → cross-file method
//! association → implicit interface detection → freeze. The builder itself
//! holds no cross-call state; everything lives inside one `build` invocation,
//! so a builder is re-entrant across independent calls.
//!
//! Per-element failures never abort: invalid parse results become
//! `FileError`s, extraction problems become `EdgeError`s. Only the memory
//! soft-cap and cancellation end a build early, and both mark the result
//! incomplete rather than erroring.

use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::edges::{
    extract_file_edges, FileContext, FileEdges, PendingEdge, PlaceholderRegistry, SymbolTable,
};
use super::interfaces::{associate_methods, detect_implicit_interfaces};
use super::options::{BuildOptions, BuildPhase, BuildResult, BuildStats, EdgeError, FileError};
use crate::features::graph::{CodeGraph, GraphLimits};
use crate::shared::cancel::CancellationToken;
use crate::shared::models::{GraphError, ParseResult, Result, Symbol, SymbolRef};
use crate::shared::observer::{attrs, noop_observer, Observer, ObserverSpan};

/// Rough per-entity footprint for the soft memory ceiling
const NODE_FOOTPRINT_BYTES: usize = 600;
const EDGE_FOOTPRINT_BYTES: usize = 160;

/// Phase-ordered graph builder
pub struct GraphBuilder {
    options: BuildOptions,
    observer: Arc<dyn Observer>,
}

impl GraphBuilder {
    pub fn new(options: BuildOptions) -> Self {
        Self {
            options,
            observer: noop_observer(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    /// Build a frozen graph from parse results
    ///
    /// `None` entries are recorded as file errors (null parse results); the
    /// build continues past them.
    pub fn build(
        &self,
        parse_results: &[Option<ParseResult>],
        token: &CancellationToken,
    ) -> Result<BuildResult> {
        let started = Instant::now();
        let files_label = parse_results.len().to_string();
        let mut span = self
            .observer
            .start_span("graph_build", attrs([("files", files_label.as_str())]));

        let mut graph = CodeGraph::new(
            self.options.project_root.clone(),
            GraphLimits {
                max_nodes: self.options.max_nodes,
                max_edges: self.options.max_edges,
            },
        );
        let mut stats = BuildStats::default();
        let mut file_errors: Vec<FileError> = Vec::new();
        let mut edge_errors: Vec<EdgeError> = Vec::new();
        let mut incomplete = false;

        // ------------------------------------------------------------------
        // Phase 1: collect nodes and per-file context
        // ------------------------------------------------------------------
        let files_total = parse_results.len();
        let mut contexts: Vec<FileContext> = Vec::with_capacity(files_total);
        let mut table = SymbolTable::default();

        for (processed, parse_result) in parse_results.iter().enumerate() {
            if token.is_cancelled() {
                warn!("build cancelled during collection");
                incomplete = true;
                break;
            }

            match parse_result {
                None => {
                    stats.files_failed += 1;
                    file_errors.push(FileError {
                        file_path: String::new(),
                        error: "null parse result".to_string(),
                    });
                }
                Some(pr) => {
                    if let Err(reason) = pr.validate() {
                        stats.files_failed += 1;
                        file_errors.push(FileError {
                            file_path: pr.file_path.clone(),
                            error: reason,
                        });
                    } else {
                        let ctx =
                            self.collect_file(pr, &mut graph, &mut table, &mut stats, &mut file_errors);
                        contexts.push(ctx);
                        stats.files_processed += 1;
                    }
                }
            }

            self.report_progress(
                BuildPhase::Collecting,
                files_total,
                processed + 1,
                &stats,
            );
            if self.memory_exceeded(&graph) {
                warn!(
                    max_memory_mb = self.options.max_memory_mb,
                    "memory soft cap reached, build marked incomplete"
                );
                incomplete = true;
                break;
            }
        }

        if incomplete {
            return self.finalize(graph, stats, file_errors, edge_errors, true, started, &mut span);
        }

        contexts.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        table.seal();
        debug!(
            files = contexts.len(),
            nodes = stats.nodes_created,
            "collection finished"
        );

        // ------------------------------------------------------------------
        // Phase 2: per-file edge extraction (parallel, order-preserving)
        // ------------------------------------------------------------------
        let placeholders = PlaceholderRegistry::new();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.worker_count)
            .build()
            .map_err(|e| GraphError::invalid_input(format!("worker pool: {}", e)))?;

        let extracted: Vec<FileEdges> = pool.install(|| {
            contexts
                .par_iter()
                .map(|ctx| {
                    if token.is_cancelled() {
                        FileEdges::default()
                    } else {
                        extract_file_edges(ctx, &table, &placeholders)
                    }
                })
                .collect()
        });

        if token.is_cancelled() {
            incomplete = true;
        }

        // Placeholder nodes first (sorted IDs), then edges in file order
        for symbol in placeholders.drain_sorted() {
            match graph.add_node_ref(symbol) {
                Ok(()) => {
                    stats.nodes_created += 1;
                    stats.placeholder_nodes += 1;
                }
                Err(GraphError::DuplicateNode(_)) => {}
                Err(err) => {
                    edge_errors.push(EdgeError {
                        source_id: String::new(),
                        target: String::new(),
                        error: err.to_string(),
                    });
                }
            }
        }

        'apply: for (applied, mut file_edges) in extracted.into_iter().enumerate() {
            stats.ambiguous_resolves += file_edges.counters.ambiguous_resolves;
            stats.call_edges_resolved += file_edges.counters.call_edges_resolved;
            stats.call_edges_unresolved += file_edges.counters.call_edges_unresolved;
            edge_errors.append(&mut file_edges.errors);

            for pending in &file_edges.edges {
                match self.apply_edge(&mut graph, pending, &mut stats, &mut edge_errors) {
                    ApplyOutcome::Continue => {}
                    ApplyOutcome::Stop => {
                        incomplete = true;
                        break 'apply;
                    }
                }
            }
            self.report_progress(
                BuildPhase::ExtractingEdges,
                contexts.len(),
                applied + 1,
                &stats,
            );
        }

        if incomplete {
            return self.finalize(graph, stats, file_errors, edge_errors, true, started, &mut span);
        }

        // ------------------------------------------------------------------
        // Phases 3+4: method association, implicit interfaces
        // ------------------------------------------------------------------
        match associate_methods(&table, token) {
            Ok(mut assoc) => {
                edge_errors.append(&mut assoc.errors);
                match detect_implicit_interfaces(&table, &assoc, token) {
                    Ok(implicit) => {
                        for pending in &implicit {
                            match self.apply_edge(&mut graph, pending, &mut stats, &mut edge_errors)
                            {
                                ApplyOutcome::Continue => stats.interface_edges += 1,
                                ApplyOutcome::Stop => {
                                    incomplete = true;
                                    break;
                                }
                            }
                        }
                    }
                    Err(GraphError::Cancelled) => incomplete = true,
                    Err(err) => edge_errors.push(EdgeError {
                        source_id: String::new(),
                        target: String::new(),
                        error: err.to_string(),
                    }),
                }
            }
            Err(GraphError::Cancelled) => incomplete = true,
            Err(err) => edge_errors.push(EdgeError {
                source_id: String::new(),
                target: String::new(),
                error: err.to_string(),
            }),
        }

        self.finalize(graph, stats, file_errors, edge_errors, incomplete, started, &mut span)
    }

    /// Add a file's symbols (with descendants) as nodes; build its context
    fn collect_file(
        &self,
        pr: &ParseResult,
        graph: &mut CodeGraph,
        table: &mut SymbolTable,
        stats: &mut BuildStats,
        file_errors: &mut Vec<FileError>,
    ) -> FileContext {
        let mut file_symbols: Vec<SymbolRef> = Vec::new();

        for symbol in pr.symbols.iter().flatten() {
            let mut pending: Vec<&Symbol> = vec![symbol];
            while let Some(current) = pending.pop() {
                let shared: SymbolRef = Arc::new(current.clone());
                match graph.add_node_ref(Arc::clone(&shared)) {
                    Ok(()) => {
                        stats.nodes_created += 1;
                        table.insert(Arc::clone(&shared));
                        file_symbols.push(shared);
                    }
                    Err(err) => file_errors.push(FileError {
                        file_path: pr.file_path.clone(),
                        error: err.to_string(),
                    }),
                }
                pending.extend(current.children.iter());
            }
        }

        FileContext {
            file_path: pr.file_path.clone(),
            imports: pr.imports.clone(),
            symbols: file_symbols,
        }
    }

    fn apply_edge(
        &self,
        graph: &mut CodeGraph,
        pending: &PendingEdge,
        stats: &mut BuildStats,
        edge_errors: &mut Vec<EdgeError>,
    ) -> ApplyOutcome {
        match graph.add_edge(&pending.from, &pending.to, pending.kind, pending.location.clone()) {
            Ok(()) => {
                stats.edges_created += 1;
                ApplyOutcome::Continue
            }
            Err(err @ GraphError::CapacityExceeded { .. }) => {
                edge_errors.push(EdgeError {
                    source_id: pending.from.clone(),
                    target: pending.to.clone(),
                    error: err.to_string(),
                });
                ApplyOutcome::Stop
            }
            Err(err) => {
                edge_errors.push(EdgeError {
                    source_id: pending.from.clone(),
                    target: pending.to.clone(),
                    error: err.to_string(),
                });
                ApplyOutcome::Continue
            }
        }
    }

    fn finalize(
        &self,
        mut graph: CodeGraph,
        mut stats: BuildStats,
        file_errors: Vec<FileError>,
        edge_errors: Vec<EdgeError>,
        incomplete: bool,
        started: Instant,
        span: &mut Box<dyn ObserverSpan>,
    ) -> Result<BuildResult> {
        graph.freeze()?;

        let elapsed = started.elapsed();
        stats.duration_millis = elapsed.as_millis() as u64;
        stats.duration_micros = elapsed.as_micros() as u64;

        self.report_progress(
            BuildPhase::Finalizing,
            stats.files_processed + stats.files_failed,
            stats.files_processed + stats.files_failed,
            &stats,
        );

        self.observer
            .observe("build_nodes_created", Vec::new(), stats.nodes_created as f64);
        self.observer
            .observe("build_edges_created", Vec::new(), stats.edges_created as f64);
        let nodes_label = stats.nodes_created.to_string();
        let edges_label = stats.edges_created.to_string();
        span.set_attrs(attrs([
            ("nodes", nodes_label.as_str()),
            ("edges", edges_label.as_str()),
            ("incomplete", if incomplete { "true" } else { "false" }),
        ]));
        span.end();

        info!(
            nodes = stats.nodes_created,
            edges = stats.edges_created,
            files = stats.files_processed,
            failed = stats.files_failed,
            duration_ms = stats.duration_millis,
            incomplete,
            "graph build finished"
        );

        Ok(BuildResult {
            graph,
            stats,
            file_errors,
            edge_errors,
            incomplete,
        })
    }

    fn report_progress(
        &self,
        phase: BuildPhase,
        files_total: usize,
        files_processed: usize,
        stats: &BuildStats,
    ) {
        if let Some(progress) = &self.options.progress {
            progress(
                phase,
                files_total,
                files_processed,
                stats.nodes_created,
                stats.edges_created,
            );
        }
    }

    fn memory_exceeded(&self, graph: &CodeGraph) -> bool {
        if self.options.max_memory_mb == 0 {
            return false;
        }
        let estimated = graph.node_count() * NODE_FOOTPRINT_BYTES
            + graph.edge_count() * EDGE_FOOTPRINT_BYTES;
        estimated > self.options.max_memory_mb * 1024 * 1024
    }
}

enum ApplyOutcome {
    Continue,
    Stop,
}
