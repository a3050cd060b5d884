//! Hierarchical view over a frozen graph
//!
//! Symbol → File → Package → Project navigation. Construction requires a
//! frozen graph; the package/file/kind indexes, per-package metadata, the
//! cross-package/internal edge partition, and the package dependency maps are
//! all functions of the frozen graph and computed exactly once here.
//!
//! A node's package is `Symbol.package` when present, otherwise the directory
//! of its file path.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::features::graph::{CodeGraph, Node};
use crate::shared::models::{Edge, GraphError, NodeId, Result, Symbol, SymbolKind};

/// Navigation level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraphLevel {
    Project,
    Package,
    File,
    Symbol,
}

/// Per-package metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    /// Files contributing nodes to this package, sorted
    pub files: Vec<String>,
    pub node_count: usize,
    pub exported_count: usize,
    /// Packages this package depends on
    pub import_count: usize,
    /// Packages depending on this package
    pub imported_by_count: usize,
    pub type_count: usize,
    pub function_count: usize,
}

/// Package/file/kind indexes plus drill-down/roll-up navigation
pub struct HierarchicalGraph<'g> {
    graph: &'g CodeGraph,
    package_index: BTreeMap<String, Vec<NodeId>>,
    file_index: BTreeMap<String, Vec<NodeId>>,
    kind_index: AHashMap<SymbolKind, Vec<NodeId>>,
    packages: BTreeMap<String, PackageInfo>,
    /// Edge indices whose endpoints live in different packages
    cross_edges: Vec<usize>,
    /// Edge indices whose endpoints share a package
    internal_edges: Vec<usize>,
    package_dependencies: BTreeMap<String, Vec<String>>,
    package_dependents: BTreeMap<String, Vec<String>>,
}

/// Package of a symbol: declared package, else the file path's directory
pub fn package_of(symbol: &Symbol) -> String {
    if !symbol.package.is_empty() {
        return symbol.package.clone();
    }
    match symbol.file_path.rsplit_once('/') {
        Some((dir, _)) => dir.to_string(),
        None => String::new(),
    }
}

impl<'g> HierarchicalGraph<'g> {
    pub fn new(graph: &'g CodeGraph) -> Result<Self> {
        if !graph.is_frozen() {
            return Err(GraphError::GraphNotFrozen);
        }

        let mut package_index: BTreeMap<String, Vec<NodeId>> = BTreeMap::new();
        let mut file_index: BTreeMap<String, Vec<NodeId>> = BTreeMap::new();
        let mut kind_index: AHashMap<SymbolKind, Vec<NodeId>> = AHashMap::new();
        let mut node_package: AHashMap<&str, String> = AHashMap::new();

        for id in graph.sorted_node_ids() {
            let node = graph
                .get_node(&id)
                .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
            let package = package_of(&node.symbol);
            node_package.insert(node.id.as_str(), package.clone());
            package_index.entry(package).or_default().push(id.clone());
            if !node.symbol.file_path.is_empty() {
                file_index
                    .entry(node.symbol.file_path.clone())
                    .or_default()
                    .push(id.clone());
            }
            kind_index.entry(node.symbol.kind).or_default().push(id);
        }

        // Partition edges by package locality
        let mut cross_edges = Vec::new();
        let mut internal_edges = Vec::new();
        let mut dependencies: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut dependents: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for (index, edge) in graph.edges().iter().enumerate() {
            let source_pkg = node_package.get(edge.source_id.as_str());
            let target_pkg = node_package.get(edge.target_id.as_str());
            let (Some(source_pkg), Some(target_pkg)) = (source_pkg, target_pkg) else {
                continue;
            };
            if source_pkg == target_pkg {
                internal_edges.push(index);
            } else {
                cross_edges.push(index);
                dependencies
                    .entry(source_pkg.clone())
                    .or_default()
                    .insert(target_pkg.clone());
                dependents
                    .entry(target_pkg.clone())
                    .or_default()
                    .insert(source_pkg.clone());
            }
        }

        let package_dependencies: BTreeMap<String, Vec<String>> = dependencies
            .into_iter()
            .map(|(pkg, deps)| (pkg, deps.into_iter().collect()))
            .collect();
        let package_dependents: BTreeMap<String, Vec<String>> = dependents
            .into_iter()
            .map(|(pkg, deps)| (pkg, deps.into_iter().collect()))
            .collect();

        // Per-package metadata
        let mut packages = BTreeMap::new();
        for (name, ids) in &package_index {
            let mut files: BTreeSet<String> = BTreeSet::new();
            let mut exported_count = 0;
            let mut type_count = 0;
            let mut function_count = 0;
            for id in ids {
                if let Some(node) = graph.get_node(id) {
                    if !node.symbol.file_path.is_empty() {
                        files.insert(node.symbol.file_path.clone());
                    }
                    if node.symbol.exported {
                        exported_count += 1;
                    }
                    if node.symbol.kind.is_type_like() {
                        type_count += 1;
                    }
                    if node.symbol.kind.is_callable() {
                        function_count += 1;
                    }
                }
            }
            packages.insert(
                name.clone(),
                PackageInfo {
                    name: name.clone(),
                    files: files.into_iter().collect(),
                    node_count: ids.len(),
                    exported_count,
                    import_count: package_dependencies.get(name).map_or(0, Vec::len),
                    imported_by_count: package_dependents.get(name).map_or(0, Vec::len),
                    type_count,
                    function_count,
                },
            );
        }

        Ok(Self {
            graph,
            package_index,
            file_index,
            kind_index,
            packages,
            cross_edges,
            internal_edges,
            package_dependencies,
            package_dependents,
        })
    }

    /// Sorted package names
    pub fn packages(&self) -> Vec<String> {
        self.packages.keys().cloned().collect()
    }

    /// Defensive copy of a package's metadata
    pub fn package_info(&self, package: &str) -> Option<PackageInfo> {
        self.packages.get(package).cloned()
    }

    pub fn nodes_in_package(&self, package: &str) -> Vec<&Node> {
        self.collect_nodes(self.package_index.get(package))
    }

    pub fn nodes_in_file(&self, file_path: &str) -> Vec<&Node> {
        self.collect_nodes(self.file_index.get(file_path))
    }

    pub fn nodes_by_kind(&self, kind: SymbolKind) -> Vec<&Node> {
        self.collect_nodes(self.kind_index.get(&kind))
    }

    pub fn cross_package_edges(&self) -> Vec<&Edge> {
        self.cross_edges
            .iter()
            .filter_map(|&i| self.graph.edge(i))
            .collect()
    }

    pub fn internal_edges(&self) -> Vec<&Edge> {
        self.internal_edges
            .iter()
            .filter_map(|&i| self.graph.edge(i))
            .collect()
    }

    pub fn files_in_package(&self, package: &str) -> Vec<String> {
        self.packages
            .get(package)
            .map(|info| info.files.clone())
            .unwrap_or_default()
    }

    /// Packages `package` depends on (deduped, sorted)
    pub fn package_dependencies(&self, package: &str) -> Vec<String> {
        self.package_dependencies
            .get(package)
            .cloned()
            .unwrap_or_default()
    }

    /// Packages depending on `package` (deduped, sorted)
    pub fn package_dependents(&self, package: &str) -> Vec<String> {
        self.package_dependents
            .get(package)
            .cloned()
            .unwrap_or_default()
    }

    /// Identifiers one level below `(level, id)`:
    /// Project → packages, Package → files, File → nodes, Symbol → children
    pub fn drill_down(&self, level: GraphLevel, id: &str) -> Result<Vec<String>> {
        match level {
            GraphLevel::Project => Ok(self.packages()),
            GraphLevel::Package => {
                if !self.packages.contains_key(id) {
                    return Err(GraphError::NodeNotFound(id.to_string()));
                }
                Ok(self.files_in_package(id))
            }
            GraphLevel::File => Ok(self
                .file_index
                .get(id)
                .cloned()
                .unwrap_or_default()),
            GraphLevel::Symbol => {
                let node = self
                    .graph
                    .get_node(id)
                    .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;
                Ok(node.symbol.children.iter().map(|c| c.id.clone()).collect())
            }
        }
    }

    /// Enclosing `(level, id)` one step up, `None` at the project root
    pub fn roll_up(&self, level: GraphLevel, id: &str) -> Result<Option<(GraphLevel, String)>> {
        match level {
            GraphLevel::Symbol => {
                let node = self
                    .graph
                    .get_node(id)
                    .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;
                Ok(Some((GraphLevel::File, node.symbol.file_path.clone())))
            }
            GraphLevel::File => {
                let package = self
                    .file_index
                    .get(id)
                    .and_then(|ids| ids.first())
                    .and_then(|first| self.graph.get_node(first))
                    .map(|node| package_of(&node.symbol))
                    .unwrap_or_else(|| {
                        id.rsplit_once('/')
                            .map(|(dir, _)| dir.to_string())
                            .unwrap_or_default()
                    });
                Ok(Some((GraphLevel::Package, package)))
            }
            GraphLevel::Package => Ok(Some((
                GraphLevel::Project,
                self.graph.project_root().to_string(),
            ))),
            GraphLevel::Project => Ok(None),
        }
    }

    /// Nodes sharing the file of `node_id`, excluding itself
    pub fn siblings(&self, node_id: &str) -> Result<Vec<&Node>> {
        let node = self
            .graph
            .get_node(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.to_string()))?;
        Ok(self
            .nodes_in_file(&node.symbol.file_path)
            .into_iter()
            .filter(|n| n.id != node_id)
            .collect())
    }

    /// Nodes sharing the package of `node_id`, excluding itself
    pub fn package_siblings(&self, node_id: &str) -> Result<Vec<&Node>> {
        let node = self
            .graph
            .get_node(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.to_string()))?;
        let package = package_of(&node.symbol);
        Ok(self
            .nodes_in_package(&package)
            .into_iter()
            .filter(|n| n.id != node_id)
            .collect())
    }

    fn collect_nodes(&self, ids: Option<&Vec<NodeId>>) -> Vec<&Node> {
        ids.map(|ids| ids.iter().filter_map(|id| self.graph.get_node(id)).collect())
            .unwrap_or_default()
    }
}
