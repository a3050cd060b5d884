//! Dead-code detection
//!
//! Flags nodes with zero incoming edges that are neither External, nor
//! methods (interface dispatch makes method reachability undecidable here,
//! so methods are conservatively kept), nor recognized entry points.

use serde::{Deserialize, Serialize};

use crate::features::graph::{CodeGraph, Node};
use crate::shared::models::{GraphError, Result, SymbolKind};

/// One unreferenced symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadCodeEntry {
    pub node_id: String,
    pub name: String,
    pub file_path: String,
    pub exported: bool,
    pub reason: String,
}

/// Entry points are never dead: mains, test/fuzz/benchmark/example
/// functions, and `ServeHTTP` methods (interface-invoked by net/http).
fn is_entry_point(node: &Node) -> bool {
    let name = node.symbol.name.as_str();
    if name == "main" || name == "init" {
        return true;
    }
    if (name.starts_with("Test") || name.starts_with("Fuzz")) && name.len() > 4 {
        return true;
    }
    if name.starts_with("Benchmark") && name.len() > 9 {
        return true;
    }
    if name.starts_with("Example") && name.len() > 7 {
        return true;
    }
    node.symbol.kind == SymbolKind::Method && name == "ServeHTTP"
}

/// Unreferenced symbols, sorted by (file, name)
pub fn find_dead_code(graph: &CodeGraph) -> Result<Vec<DeadCodeEntry>> {
    if !graph.is_frozen() {
        return Err(GraphError::GraphNotFrozen);
    }

    let mut entries: Vec<DeadCodeEntry> = Vec::new();
    for id in graph.sorted_node_ids() {
        let Some(node) = graph.get_node(&id) else {
            continue;
        };
        if node.in_degree() > 0
            || node.is_external()
            || node.symbol.kind == SymbolKind::Method
            || is_entry_point(node)
        {
            continue;
        }
        let reason = if node.symbol.exported {
            "exported but not referenced internally"
        } else {
            "no callers or references"
        };
        entries.push(DeadCodeEntry {
            node_id: id,
            name: node.symbol.name.clone(),
            file_path: node.symbol.file_path.clone(),
            exported: node.symbol.exported,
            reason: reason.to_string(),
        });
    }

    entries.sort_by(|a, b| {
        a.file_path
            .cmp(&b.file_path)
            .then_with(|| a.name.cmp(&b.name))
    });
    Ok(entries)
}
