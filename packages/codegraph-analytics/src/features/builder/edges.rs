//! Per-file edge extraction
//!
//! Pure over its inputs: each file context yields a list of pending edges
//! plus error records, with no graph mutation. The builder fans files out to
//! workers, then applies pending edges sequentially in sorted file order so
//! the edge sequence is reproducible run-to-run.
//!
//! Unresolved targets fall back to placeholder nodes with deterministic IDs
//! (`external:<pkg>:<name>`, `external::<name>` for an empty package), so
//! lookup-then-insert through the shared registry is safe from partitioned
//! workers.

use ahash::AHashMap;
use dashmap::DashMap;
use std::sync::Arc;

use super::options::EdgeError;
use crate::shared::models::{
    EdgeKind, Import, Location, Symbol, SymbolKind, SymbolRef,
};

/// Go built-in types skipped by return-type edge extraction
const BUILTIN_TYPES: &[&str] = &[
    "bool", "string", "error", "byte", "rune", "any", "uintptr", "int", "int8", "int16", "int32",
    "int64", "uint", "uint8", "uint16", "uint32", "uint64", "float32", "float64", "complex64",
    "complex128", "interface{}", "struct{}", "None", "object",
];

/// One file's worth of ingestion context, assembled during the collect phase
///
/// Language routing happens per symbol (symbols carry their own language
/// tag), so the context only needs the file identity, its imports, and its
/// symbols.
#[derive(Debug, Clone)]
pub(crate) struct FileContext {
    pub file_path: String,
    pub imports: Vec<Import>,
    /// Top-level and nested symbols of the file, in parse order
    pub symbols: Vec<SymbolRef>,
}

/// Global symbol lookup built after collection
///
/// `by_name` values are sorted by symbol ID so resolution tie-breaks are
/// deterministic.
#[derive(Debug, Default)]
pub(crate) struct SymbolTable {
    pub by_id: AHashMap<String, SymbolRef>,
    pub by_name: AHashMap<String, Vec<SymbolRef>>,
}

impl SymbolTable {
    pub fn insert(&mut self, symbol: SymbolRef) {
        self.by_name
            .entry(symbol.name.clone())
            .or_default()
            .push(Arc::clone(&symbol));
        self.by_id.insert(symbol.id.clone(), symbol);
    }

    /// Sort every name bucket by ID; call once before extraction
    pub fn seal(&mut self) {
        for bucket in self.by_name.values_mut() {
            bucket.sort_by(|a, b| a.id.cmp(&b.id));
        }
    }
}

/// Resolution preference applied before the file/package/global tier order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Prefer {
    Callable,
    TypeLike,
    Kind(SymbolKind),
    Any,
}

impl Prefer {
    fn matches(self, kind: SymbolKind) -> bool {
        match self {
            Prefer::Callable => kind.is_callable(),
            Prefer::TypeLike => kind.is_type_like(),
            Prefer::Kind(k) => kind == k,
            Prefer::Any => true,
        }
    }
}

/// Concurrent placeholder-symbol registry
///
/// Placeholder IDs are deterministic, so lookup-then-insert is correct under
/// any interleaving; the map is only appended to during extraction and
/// drained (sorted) before edges are applied.
#[derive(Debug, Default)]
pub(crate) struct PlaceholderRegistry {
    map: DashMap<String, SymbolRef>,
}

impl PlaceholderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the placeholder for (package, name); returns its node ID
    pub fn intern(&self, package: &str, name: &str) -> String {
        let id = format!("external:{}:{}", package, name);
        if !self.map.contains_key(&id) {
            let symbol = Symbol::new(id.clone(), name, SymbolKind::External, "")
                .with_package(package.to_string());
            self.map.entry(id.clone()).or_insert_with(|| Arc::new(symbol));
        }
        id
    }

    /// All placeholders, sorted by ID for deterministic node insertion
    pub fn drain_sorted(&self) -> Vec<SymbolRef> {
        let mut all: Vec<SymbolRef> = self.map.iter().map(|e| Arc::clone(e.value())).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }
}

/// Edge awaiting application to the graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingEdge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
    pub location: Location,
}

/// Counters merged into the build stats
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ExtractionCounters {
    pub ambiguous_resolves: usize,
    pub call_edges_resolved: usize,
    pub call_edges_unresolved: usize,
}

/// Extraction output for one file
#[derive(Debug, Default)]
pub(crate) struct FileEdges {
    pub edges: Vec<PendingEdge>,
    pub errors: Vec<EdgeError>,
    pub counters: ExtractionCounters,
}

/// Extract all edges observable from one file
pub(crate) fn extract_file_edges(
    ctx: &FileContext,
    table: &SymbolTable,
    placeholders: &PlaceholderRegistry,
) -> FileEdges {
    let mut out = FileEdges::default();
    extract_import_edges(ctx, placeholders, &mut out);

    for symbol in &ctx.symbols {
        match symbol.kind {
            SymbolKind::Method => {
                extract_receives_edge(ctx, symbol, table, placeholders, &mut out);
                extract_returns_edge(ctx, symbol, table, placeholders, &mut out);
                extract_call_edges(ctx, symbol, table, placeholders, &mut out);
            }
            SymbolKind::Function => {
                extract_returns_edge(ctx, symbol, table, placeholders, &mut out);
                extract_call_edges(ctx, symbol, table, placeholders, &mut out);
            }
            kind if kind.is_type_like() => {
                extract_implements_edges(ctx, symbol, table, &mut out);
                extract_embeds_edge(ctx, symbol, table, &mut out);
            }
            _ => {}
        }
    }
    out
}

/// Imports: package symbol (or first symbol) → placeholder per import path
fn extract_import_edges(ctx: &FileContext, placeholders: &PlaceholderRegistry, out: &mut FileEdges) {
    if ctx.imports.is_empty() {
        return;
    }
    let source = ctx
        .symbols
        .iter()
        .find(|s| s.kind == SymbolKind::Package)
        .or_else(|| ctx.symbols.first());
    let Some(source) = source else {
        return;
    };

    for import in &ctx.imports {
        if import.path.is_empty() {
            continue;
        }
        let name = import.path.rsplit('/').next().unwrap_or(&import.path);
        let to = placeholders.intern(&import.path, name);
        out.edges.push(PendingEdge {
            from: source.id.clone(),
            to,
            kind: EdgeKind::Imports,
            location: import.location.clone(),
        });
    }
}

/// Receives: method → receiver type, leading `*` stripped
fn extract_receives_edge(
    ctx: &FileContext,
    method: &SymbolRef,
    table: &SymbolTable,
    placeholders: &PlaceholderRegistry,
    out: &mut FileEdges,
) {
    let Some(receiver) = method.receiver.as_deref() else {
        return;
    };
    let recv_type = receiver.trim_start_matches('*');
    let recv_name = recv_type.rsplit('.').next().unwrap_or(recv_type);
    if recv_name.is_empty() {
        return;
    }

    let to = match resolve(recv_name, ctx, method, table, Prefer::TypeLike, out) {
        Some(id) => id,
        None => placeholders.intern(&method.package, recv_name),
    };
    if to == method.id {
        return;
    }
    out.edges.push(PendingEdge {
        from: method.id.clone(),
        to,
        kind: EdgeKind::Receives,
        location: method.location.clone(),
    });
}

/// Returns: function/method → cleaned return type, built-ins skipped
fn extract_returns_edge(
    ctx: &FileContext,
    func: &SymbolRef,
    table: &SymbolTable,
    placeholders: &PlaceholderRegistry,
    out: &mut FileEdges,
) {
    let Some(return_type) = func.metadata.as_ref().and_then(|m| m.return_type.as_deref()) else {
        return;
    };
    let cleaned = strip_type_wrappers(return_type);
    if cleaned.is_empty() || BUILTIN_TYPES.contains(&cleaned.as_str()) {
        return;
    }

    let (pkg_hint, type_name) = match cleaned.rsplit_once('.') {
        Some((pkg, name)) => (pkg, name),
        None => ("", cleaned.as_str()),
    };
    let to = match resolve(type_name, ctx, func, table, Prefer::TypeLike, out) {
        Some(id) => id,
        None => placeholders.intern(pkg_hint, type_name),
    };
    if to == func.id {
        return;
    }
    out.edges.push(PendingEdge {
        from: func.id.clone(),
        to,
        kind: EdgeKind::Returns,
        location: func.location.clone(),
    });
}

/// Explicit Implements from metadata; target must resolve to an Interface
fn extract_implements_edges(
    ctx: &FileContext,
    type_sym: &SymbolRef,
    table: &SymbolTable,
    out: &mut FileEdges,
) {
    let Some(meta) = type_sym.metadata.as_ref() else {
        return;
    };
    for iface_name in &meta.implements {
        let iface_name = iface_name.rsplit('.').next().unwrap_or(iface_name);
        match resolve(
            iface_name,
            ctx,
            type_sym,
            table,
            Prefer::Kind(SymbolKind::Interface),
            out,
        ) {
            Some(id) => {
                let target_kind = table.by_id.get(&id).map(|s| s.kind);
                if target_kind != Some(SymbolKind::Interface) {
                    out.errors.push(EdgeError {
                        source_id: type_sym.id.clone(),
                        target: iface_name.to_string(),
                        error: "implements target is not an interface".to_string(),
                    });
                    continue;
                }
                out.edges.push(PendingEdge {
                    from: type_sym.id.clone(),
                    to: id,
                    kind: EdgeKind::Implements,
                    location: type_sym.location.clone(),
                });
            }
            None => out.errors.push(EdgeError {
                source_id: type_sym.id.clone(),
                target: iface_name.to_string(),
                error: "unresolved interface".to_string(),
            }),
        }
    }
}

/// Embeds from metadata.extends; source must be a Struct/Class
fn extract_embeds_edge(
    ctx: &FileContext,
    type_sym: &SymbolRef,
    table: &SymbolTable,
    out: &mut FileEdges,
) {
    let Some(extends) = type_sym
        .metadata
        .as_ref()
        .and_then(|m| m.extends.as_deref())
        .filter(|s| !s.is_empty())
    else {
        return;
    };
    if !matches!(type_sym.kind, SymbolKind::Struct | SymbolKind::Class) {
        out.errors.push(EdgeError {
            source_id: type_sym.id.clone(),
            target: extends.to_string(),
            error: format!("embeds source has kind {}, expected struct/class", type_sym.kind),
        });
        return;
    }

    let base_name = extends.rsplit('.').next().unwrap_or(extends);
    match resolve(base_name, ctx, type_sym, table, Prefer::TypeLike, out) {
        Some(id) if id != type_sym.id => out.edges.push(PendingEdge {
            from: type_sym.id.clone(),
            to: id,
            kind: EdgeKind::Embeds,
            location: type_sym.location.clone(),
        }),
        Some(_) => {}
        None => out.errors.push(EdgeError {
            source_id: type_sym.id.clone(),
            target: extends.to_string(),
            error: "unresolved base type".to_string(),
        }),
    }
}

/// Calls from recorded call sites; self-edges (recursion) are skipped
fn extract_call_edges(
    ctx: &FileContext,
    func: &SymbolRef,
    table: &SymbolTable,
    placeholders: &PlaceholderRegistry,
    out: &mut FileEdges,
) {
    for call in &func.call_sites {
        if call.target.is_empty() {
            continue;
        }

        let resolved = if call.is_method {
            let method_name = call.target.rsplit('.').next().unwrap_or(&call.target);
            resolve(
                method_name,
                ctx,
                func,
                table,
                Prefer::Kind(SymbolKind::Method),
                out,
            )
        } else if let Some((pkg, fn_name)) = call.target.split_once('.') {
            resolve_qualified(pkg, fn_name, table, out)
        } else {
            resolve(&call.target, ctx, func, table, Prefer::Callable, out)
        };

        let to = match resolved {
            Some(id) => {
                out.counters.call_edges_resolved += 1;
                id
            }
            None => {
                out.counters.call_edges_unresolved += 1;
                let (pkg, name) = match call.target.rsplit_once('.') {
                    Some((pkg, name)) => (pkg, name),
                    None => ("", call.target.as_str()),
                };
                placeholders.intern(pkg, name)
            }
        };
        if to == func.id {
            continue; // recursion
        }
        out.edges.push(PendingEdge {
            from: func.id.clone(),
            to,
            kind: EdgeKind::Calls,
            location: call.location.clone(),
        });
    }
}

/// Tiered name resolution: in-file, then same-package, then anywhere; within
/// each tier the preference filter is tried before falling back to any kind.
/// The winner of a multi-candidate tier is the smallest ID; the ambiguity is
/// counted.
fn resolve(
    name: &str,
    ctx: &FileContext,
    from: &SymbolRef,
    table: &SymbolTable,
    prefer: Prefer,
    out: &mut FileEdges,
) -> Option<String> {
    let candidates = table.by_name.get(name)?;

    let tiers: [&dyn Fn(&SymbolRef) -> bool; 3] = [
        &|s: &SymbolRef| s.file_path == ctx.file_path,
        &|s: &SymbolRef| !from.package.is_empty() && s.package == from.package,
        &|_: &SymbolRef| true,
    ];

    for tier in tiers {
        for filter in [prefer, Prefer::Any] {
            let matched: Vec<&SymbolRef> = candidates
                .iter()
                .filter(|s| tier(*s) && filter.matches(s.kind))
                .collect();
            if let Some(first) = matched.first() {
                if matched.len() > 1 {
                    out.counters.ambiguous_resolves += 1;
                }
                return Some(first.id.clone());
            }
            if prefer == Prefer::Any {
                break; // second pass is identical
            }
        }
    }
    None
}

/// `pkg.Fn` resolution: by function name, preferring symbols whose package's
/// last segment matches `pkg`
fn resolve_qualified(
    pkg: &str,
    fn_name: &str,
    table: &SymbolTable,
    out: &mut FileEdges,
) -> Option<String> {
    let candidates = table.by_name.get(fn_name)?;

    let in_pkg: Vec<&SymbolRef> = candidates
        .iter()
        .filter(|s| s.kind.is_callable() && s.package.rsplit('/').next() == Some(pkg))
        .collect();
    let pool = if in_pkg.is_empty() {
        candidates.iter().filter(|s| s.kind.is_callable()).collect()
    } else {
        in_pkg
    };
    let first = pool.first()?;
    if pool.len() > 1 {
        out.counters.ambiguous_resolves += 1;
    }
    Some(first.id.clone())
}

/// Strip pointer/slice/channel/map/generic wrappers from a type expression
pub(crate) fn strip_type_wrappers(expr: &str) -> String {
    let mut current = expr.trim();
    loop {
        let next = if let Some(rest) = current.strip_prefix('*') {
            rest
        } else if let Some(rest) = current.strip_prefix("[]") {
            rest
        } else if let Some(rest) = current.strip_prefix("<-chan ") {
            rest
        } else if let Some(rest) = current.strip_prefix("chan<- ") {
            rest
        } else if let Some(rest) = current.strip_prefix("chan ") {
            rest
        } else if current.starts_with("map[") {
            // value type of the map
            match find_map_value(current) {
                Some(value) => value,
                None => return String::new(),
            }
        } else if let Some(open) = current.find('[') {
            // generic instantiation Foo[T]
            if current.ends_with(']') && open > 0 {
                &current[..open]
            } else {
                break;
            }
        } else {
            break;
        };
        current = next.trim();
    }
    current.to_string()
}

/// `map[K]V` → `V`, honoring nested brackets in the key
fn find_map_value(expr: &str) -> Option<&str> {
    let after_keyword = &expr[4..]; // past "map["
    let mut depth = 1usize;
    for (i, c) in after_keyword.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&after_keyword[i + 1..]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::CallSite;
    use pretty_assertions::assert_eq;

    fn ctx_with(symbols: Vec<Symbol>, imports: Vec<Import>) -> (FileContext, SymbolTable) {
        let refs: Vec<SymbolRef> = symbols.into_iter().map(Arc::new).collect();
        let mut table = SymbolTable::default();
        for r in &refs {
            table.insert(Arc::clone(r));
        }
        table.seal();
        let ctx = FileContext {
            file_path: "src/a.go".to_string(),
            imports,
            symbols: refs,
        };
        (ctx, table)
    }

    fn func(id: &str, name: &str) -> Symbol {
        Symbol::new(id, name, SymbolKind::Function, "src/a.go")
            .with_language("go")
            .with_package("pkg/a")
    }

    #[test]
    fn test_strip_type_wrappers() {
        assert_eq!(strip_type_wrappers("*User"), "User");
        assert_eq!(strip_type_wrappers("[]*User"), "User");
        assert_eq!(strip_type_wrappers("chan User"), "User");
        assert_eq!(strip_type_wrappers("<-chan User"), "User");
        assert_eq!(strip_type_wrappers("map[string]User"), "User");
        assert_eq!(strip_type_wrappers("map[string][]*User"), "User");
        assert_eq!(strip_type_wrappers("List[User]"), "List");
        assert_eq!(strip_type_wrappers("User"), "User");
    }

    #[test]
    fn test_import_edges_use_package_symbol() {
        let pkg = Symbol::new("pkg-sym", "a", SymbolKind::Package, "src/a.go");
        let (ctx, table) = ctx_with(
            vec![func("f1", "Helper"), pkg],
            vec![Import::new("github.com/lib/pq", Location::in_file("src/a.go"))],
        );
        let placeholders = PlaceholderRegistry::new();
        let out = extract_file_edges(&ctx, &table, &placeholders);

        let import_edge = out
            .edges
            .iter()
            .find(|e| e.kind == EdgeKind::Imports)
            .unwrap();
        assert_eq!(import_edge.from, "pkg-sym");
        assert_eq!(import_edge.to, "external:github.com/lib/pq:pq");
        assert_eq!(placeholders.len(), 1);
    }

    #[test]
    fn test_call_resolution_in_file() {
        let mut caller = func("f1", "Caller");
        caller.call_sites = vec![CallSite::new("Helper", Location::in_file("src/a.go"))];
        let (ctx, table) = ctx_with(vec![caller, func("f2", "Helper")], vec![]);
        let placeholders = PlaceholderRegistry::new();
        let out = extract_file_edges(&ctx, &table, &placeholders);

        assert_eq!(out.counters.call_edges_resolved, 1);
        assert_eq!(out.counters.call_edges_unresolved, 0);
        let call = out.edges.iter().find(|e| e.kind == EdgeKind::Calls).unwrap();
        assert_eq!((call.from.as_str(), call.to.as_str()), ("f1", "f2"));
    }

    #[test]
    fn test_unresolved_call_becomes_placeholder() {
        let mut caller = func("f1", "Caller");
        caller.call_sites = vec![CallSite::new("fmt.Println", Location::in_file("src/a.go"))];
        let (ctx, table) = ctx_with(vec![caller], vec![]);
        let placeholders = PlaceholderRegistry::new();
        let out = extract_file_edges(&ctx, &table, &placeholders);

        assert_eq!(out.counters.call_edges_unresolved, 1);
        let call = out.edges.iter().find(|e| e.kind == EdgeKind::Calls).unwrap();
        assert_eq!(call.to, "external:fmt:Println");
    }

    #[test]
    fn test_recursion_is_skipped() {
        let mut rec = func("f1", "Loop");
        rec.call_sites = vec![CallSite::new("Loop", Location::in_file("src/a.go"))];
        let (ctx, table) = ctx_with(vec![rec], vec![]);
        let placeholders = PlaceholderRegistry::new();
        let out = extract_file_edges(&ctx, &table, &placeholders);
        assert!(out.edges.iter().all(|e| e.kind != EdgeKind::Calls));
    }

    #[test]
    fn test_receives_edge() {
        let method = Symbol::new("m1", "Close", SymbolKind::Method, "src/a.go")
            .with_package("pkg/a")
            .with_receiver("*Store");
        let store = Symbol::new("t1", "Store", SymbolKind::Struct, "src/a.go")
            .with_package("pkg/a");
        let (ctx, table) = ctx_with(vec![method, store], vec![]);
        let placeholders = PlaceholderRegistry::new();
        let out = extract_file_edges(&ctx, &table, &placeholders);

        let recv = out
            .edges
            .iter()
            .find(|e| e.kind == EdgeKind::Receives)
            .unwrap();
        assert_eq!((recv.from.as_str(), recv.to.as_str()), ("m1", "t1"));
    }

    #[test]
    fn test_returns_edge_skips_builtins() {
        let mut f = func("f1", "Count");
        f.metadata = Some(crate::shared::models::SymbolMetadata {
            return_type: Some("int".to_string()),
            ..Default::default()
        });
        let (ctx, table) = ctx_with(vec![f], vec![]);
        let placeholders = PlaceholderRegistry::new();
        let out = extract_file_edges(&ctx, &table, &placeholders);
        assert!(out.edges.iter().all(|e| e.kind != EdgeKind::Returns));
        assert_eq!(placeholders.len(), 0);
    }

    #[test]
    fn test_returns_edge_resolves_type() {
        let mut f = func("f1", "Load");
        f.metadata = Some(crate::shared::models::SymbolMetadata {
            return_type: Some("[]*Config".to_string()),
            ..Default::default()
        });
        let cfg = Symbol::new("t1", "Config", SymbolKind::Struct, "src/a.go")
            .with_package("pkg/a");
        let (ctx, table) = ctx_with(vec![f, cfg], vec![]);
        let placeholders = PlaceholderRegistry::new();
        let out = extract_file_edges(&ctx, &table, &placeholders);

        let ret = out.edges.iter().find(|e| e.kind == EdgeKind::Returns).unwrap();
        assert_eq!(ret.to, "t1");
    }

    #[test]
    fn test_implements_requires_interface() {
        let mut t = Symbol::new("t1", "Store", SymbolKind::Struct, "src/a.go")
            .with_package("pkg/a");
        t.metadata = Some(crate::shared::models::SymbolMetadata {
            implements: vec!["Closer".to_string(), "NotAnIface".to_string()],
            ..Default::default()
        });
        let iface = Symbol::new("i1", "Closer", SymbolKind::Interface, "src/a.go")
            .with_package("pkg/a");
        let other = Symbol::new("x1", "NotAnIface", SymbolKind::Struct, "src/a.go")
            .with_package("pkg/a");
        let (ctx, table) = ctx_with(vec![t, iface, other], vec![]);
        let placeholders = PlaceholderRegistry::new();
        let out = extract_file_edges(&ctx, &table, &placeholders);

        let impls: Vec<_> = out
            .edges
            .iter()
            .filter(|e| e.kind == EdgeKind::Implements)
            .collect();
        assert_eq!(impls.len(), 1);
        assert_eq!(impls[0].to, "i1");
        assert_eq!(out.errors.len(), 1);
        assert!(out.errors[0].error.contains("not an interface"));
    }

    #[test]
    fn test_embeds_edge() {
        let mut t = Symbol::new("t1", "Worker", SymbolKind::Struct, "src/a.go")
            .with_package("pkg/a");
        t.metadata = Some(crate::shared::models::SymbolMetadata {
            extends: Some("Base".to_string()),
            ..Default::default()
        });
        let base = Symbol::new("t2", "Base", SymbolKind::Struct, "src/a.go")
            .with_package("pkg/a");
        let (ctx, table) = ctx_with(vec![t, base], vec![]);
        let placeholders = PlaceholderRegistry::new();
        let out = extract_file_edges(&ctx, &table, &placeholders);

        let embed = out.edges.iter().find(|e| e.kind == EdgeKind::Embeds).unwrap();
        assert_eq!((embed.from.as_str(), embed.to.as_str()), ("t1", "t2"));
    }

    #[test]
    fn test_placeholder_ids_are_deterministic() {
        let registry = PlaceholderRegistry::new();
        assert_eq!(registry.intern("fmt", "Println"), "external:fmt:Println");
        assert_eq!(registry.intern("", "Helper"), "external::Helper");
        // Repeat interning does not duplicate
        registry.intern("fmt", "Println");
        assert_eq!(registry.len(), 2);
        let sorted = registry.drain_sorted();
        assert_eq!(sorted[0].id, "external::Helper");
        assert_eq!(sorted[1].id, "external:fmt:Println");
    }
}
