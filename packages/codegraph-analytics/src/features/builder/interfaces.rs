//! Cross-file method association and implicit interface detection
//!
//! Association (language-tagged `go`, extensible) parses each method's
//! signature and records it against the receiver type. Symbols are immutable
//! once added to the graph, so associations live in a builder-side index that
//! merges three sources per type: metadata-declared methods, nested child
//! methods, and receiver-resolved methods.
//!
//! Interface matching is structural and name-based: a type implements an
//! interface when its method-name set is a superset of the interface's.
//! Signature-aware comparison can replace `is_superset` without touching the
//! grouping or edge emission.

use ahash::AHashMap;
use std::collections::BTreeSet;
use tracing::debug;

use super::edges::{PendingEdge, SymbolTable};
use super::options::EdgeError;
use super::signatures::parse_method_signature;
use crate::shared::cancel::CancellationToken;
use crate::shared::models::{EdgeKind, MethodSignature, Result, SymbolKind, SymbolRef};

/// Languages participating in implicit interface detection
const STRUCTURAL_LANGUAGES: &[&str] = &["go", "python"];

/// Method association derived in phase 3
#[derive(Debug, Default)]
pub(crate) struct MethodAssociation {
    /// Type ID → method-name set (declared ∪ nested ∪ receiver-resolved)
    pub sets: AHashMap<String, BTreeSet<String>>,
    /// Type ID → signatures parsed from methods not already declared
    pub signatures: AHashMap<String, Vec<MethodSignature>>,
    pub errors: Vec<EdgeError>,
}

/// Build the per-type method index
pub(crate) fn associate_methods(
    table: &SymbolTable,
    token: &CancellationToken,
) -> Result<MethodAssociation> {
    let mut assoc = MethodAssociation::default();

    // Seed with declared metadata methods and nested child methods
    for symbol in table.by_id.values() {
        if !symbol.kind.is_type_like() {
            continue;
        }
        let set = assoc.sets.entry(symbol.id.clone()).or_default();
        for name in symbol.declared_method_names() {
            set.insert(name.to_string());
        }
        for child in &symbol.children {
            if child.kind == SymbolKind::Method {
                set.insert(child.name.clone());
            }
        }
    }
    token.check()?;

    // Receiver-based association, currently signature-parsing Go only
    let mut methods: Vec<&SymbolRef> = table
        .by_id
        .values()
        .filter(|s| s.kind == SymbolKind::Method && s.language == "go")
        .collect();
    methods.sort_by(|a, b| a.id.cmp(&b.id));

    for method in methods {
        let Some(type_id) = receiver_type_id(method, table) else {
            continue;
        };
        let already_declared = assoc
            .sets
            .get(&type_id)
            .map(|set| set.contains(&method.name))
            .unwrap_or(false);
        assoc
            .sets
            .entry(type_id.clone())
            .or_default()
            .insert(method.name.clone());

        if already_declared {
            continue;
        }
        if let Some(signature) = method.signature.as_deref() {
            match parse_method_signature(signature) {
                Ok(parsed) => assoc.signatures.entry(type_id).or_default().push(parsed),
                Err(err) => assoc.errors.push(EdgeError {
                    source_id: method.id.clone(),
                    target: type_id,
                    error: err.to_string(),
                }),
            }
        }
    }
    token.check()?;
    Ok(assoc)
}

/// Resolve a method's receiver to a type symbol ID (same package preferred)
fn receiver_type_id(method: &SymbolRef, table: &SymbolTable) -> Option<String> {
    let receiver = method.receiver.as_deref()?;
    let recv_type = receiver.trim_start_matches('*');
    let recv_name = recv_type.rsplit('.').next().unwrap_or(recv_type);
    let candidates = table.by_name.get(recv_name)?;

    let type_like: Vec<&SymbolRef> = candidates
        .iter()
        .filter(|s| s.kind.is_type_like())
        .collect();
    type_like
        .iter()
        .find(|s| s.package == method.package)
        .or_else(|| type_like.first())
        .map(|s| s.id.clone())
}

/// Emit Implements edges for every (type, interface) pair where the type's
/// method-name set covers the interface's. The cancellation token is polled
/// every 1000 comparisons.
pub(crate) fn detect_implicit_interfaces(
    table: &SymbolTable,
    assoc: &MethodAssociation,
    token: &CancellationToken,
) -> Result<Vec<PendingEdge>> {
    let mut interfaces_by_lang: AHashMap<&str, Vec<&SymbolRef>> = AHashMap::new();
    let mut types_by_lang: AHashMap<&str, Vec<&SymbolRef>> = AHashMap::new();

    for symbol in table.by_id.values() {
        let lang = symbol.language.as_str();
        if !STRUCTURAL_LANGUAGES.contains(&lang) {
            continue;
        }
        if symbol.kind == SymbolKind::Interface {
            interfaces_by_lang.entry(lang).or_default().push(symbol);
        } else if symbol.kind.is_type_like() {
            types_by_lang.entry(lang).or_default().push(symbol);
        }
    }

    let mut edges = Vec::new();
    let mut comparisons = 0usize;

    let mut languages: Vec<&&str> = interfaces_by_lang.keys().collect();
    languages.sort_unstable();

    for lang in languages {
        let mut interfaces = interfaces_by_lang[*lang].clone();
        interfaces.sort_by(|a, b| a.id.cmp(&b.id));
        let iface_methods: Vec<BTreeSet<String>> = interfaces
            .iter()
            .map(|iface| interface_method_names(iface, assoc))
            .collect();
        let mut types = types_by_lang.get(*lang).cloned().unwrap_or_default();
        types.sort_by(|a, b| a.id.cmp(&b.id));

        for type_sym in &types {
            let Some(type_methods) = assoc.sets.get(&type_sym.id) else {
                continue;
            };
            if type_methods.is_empty() {
                continue;
            }
            for (iface, iface_methods) in interfaces.iter().zip(&iface_methods) {
                comparisons += 1;
                if comparisons % 1000 == 0 {
                    token.check()?;
                }
                if iface_methods.is_empty() {
                    continue;
                }
                if iface_methods.iter().all(|m| type_methods.contains(m)) {
                    edges.push(PendingEdge {
                        from: type_sym.id.clone(),
                        to: iface.id.clone(),
                        kind: EdgeKind::Implements,
                        location: type_sym.location.clone(),
                    });
                }
            }
        }
    }

    debug!(
        comparisons,
        edges = edges.len(),
        "implicit interface detection finished"
    );
    Ok(edges)
}

fn interface_method_names(iface: &SymbolRef, assoc: &MethodAssociation) -> BTreeSet<String> {
    assoc.sets.get(&iface.id).cloned().unwrap_or_else(|| {
        iface
            .declared_method_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    })
}
