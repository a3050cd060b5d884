//! Package coupling metrics
//!
//! Martin-style afferent/efferent coupling over the package dependency
//! relation derived from cross-package edges:
//!
//! ```text
//! I = Ce / (Ca + Ce)        instability, 0 when Ca + Ce = 0
//! A = abstract / (abstract + concrete)   abstractness, 0 when no types
//! ```
//!
//! Interfaces count as abstract; structs and classes as concrete.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::features::graph::CodeGraph;
use crate::features::hierarchy::package_of;
use crate::shared::models::{GraphError, Result, SymbolKind};

/// Coupling metrics for one package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageCoupling {
    pub package: String,
    /// Packages depending on this one
    pub afferent: usize,
    /// Packages this one depends on
    pub efferent: usize,
    pub instability: f64,
    pub abstract_count: usize,
    pub concrete_count: usize,
    pub abstractness: f64,
}

/// Compute coupling metrics for every package, sorted by package name
pub fn package_coupling(graph: &CodeGraph) -> Result<Vec<PackageCoupling>> {
    if !graph.is_frozen() {
        return Err(GraphError::GraphNotFrozen);
    }

    let mut node_package: AHashMap<&str, String> = AHashMap::new();
    let mut abstract_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut concrete_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut packages: BTreeSet<String> = BTreeSet::new();

    for node in graph.nodes() {
        let package = package_of(&node.symbol);
        packages.insert(package.clone());
        match node.symbol.kind {
            SymbolKind::Interface => {
                *abstract_counts.entry(package.clone()).or_default() += 1;
            }
            SymbolKind::Struct | SymbolKind::Class => {
                *concrete_counts.entry(package.clone()).or_default() += 1;
            }
            _ => {}
        }
        node_package.insert(node.id.as_str(), package);
    }

    let mut dependencies: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut dependents: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for edge in graph.edges() {
        let (Some(source_pkg), Some(target_pkg)) = (
            node_package.get(edge.source_id.as_str()),
            node_package.get(edge.target_id.as_str()),
        ) else {
            continue;
        };
        if source_pkg != target_pkg {
            dependencies
                .entry(source_pkg.as_str())
                .or_default()
                .insert(target_pkg.as_str());
            dependents
                .entry(target_pkg.as_str())
                .or_default()
                .insert(source_pkg.as_str());
        }
    }

    let metrics = packages
        .into_iter()
        .map(|package| {
            let efferent = dependencies.get(package.as_str()).map_or(0, BTreeSet::len);
            let afferent = dependents.get(package.as_str()).map_or(0, BTreeSet::len);
            let instability = if afferent + efferent == 0 {
                0.0
            } else {
                efferent as f64 / (afferent + efferent) as f64
            };
            let abstract_count = abstract_counts.get(&package).copied().unwrap_or(0);
            let concrete_count = concrete_counts.get(&package).copied().unwrap_or(0);
            let abstractness = if abstract_count + concrete_count == 0 {
                0.0
            } else {
                abstract_count as f64 / (abstract_count + concrete_count) as f64
            };
            PackageCoupling {
                package,
                afferent,
                efferent,
                instability,
                abstract_count,
                concrete_count,
                abstractness,
            }
        })
        .collect();
    Ok(metrics)
}
