//! Integration tests for graph analytics
//!
//! Covers the cycle/articulation scenario, dead-code entry-point rules,
//! Leiden on the two-clique graph, and cross-run determinism.

use codegraph_analytics::{
    detect_communities, detect_communities_parallel, find_articulation_points, find_cycles,
    find_dead_code, find_hotspots, CancellationToken, CodeGraph, EdgeKind, GraphAnalytics,
    LeidenOptions, Location, Symbol, SymbolKind,
};

fn graph_from_edges(nodes: &[(&str, &str)], edges: &[(&str, &str)]) -> CodeGraph {
    let mut g = CodeGraph::with_default_limits("/repo");
    for (id, file) in nodes {
        g.add_node(
            Symbol::new(*id, *id, SymbolKind::Function, *file)
                .with_package(file.rsplit_once('/').map(|(d, _)| d).unwrap_or("")),
        )
        .unwrap();
    }
    for (from, to) in edges {
        g.add_edge(from, to, EdgeKind::Calls, Location::in_file("main.go"))
            .unwrap();
    }
    g.freeze().unwrap();
    g
}

/// a→b→c→a cycle with a d→a tail
#[test]
fn cycle_and_articulation_with_tail() {
    let g = graph_from_edges(
        &[
            ("a", "pkg/m.go"),
            ("b", "pkg/m.go"),
            ("c", "pkg/m.go"),
            ("d", "pkg/m.go"),
        ],
        &[("a", "b"), ("b", "c"), ("c", "a"), ("d", "a")],
    );

    let (cycles, err) = find_cycles(&g, &CancellationToken::new());
    assert!(err.is_none());
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].length, 3);
    let mut members = cycles[0].node_ids.clone();
    members.sort();
    assert_eq!(members, vec!["a", "b", "c"]);

    let (articulation, err) = find_articulation_points(&g, &CancellationToken::new());
    assert!(err.is_none());
    // Removing a disconnects d from the b/c cycle
    assert_eq!(articulation.articulation_points, vec!["a"]);
    assert_eq!(
        articulation.bridges,
        vec![("a".to_string(), "d".to_string())]
    );
    assert_eq!(articulation.components, 1);
}

/// main→A→B→C plus a Test function and untouched helpers
#[test]
fn dead_code_with_entry_points() {
    let g = graph_from_edges(
        &[
            ("main", "cmd/main.go"),
            ("A", "cmd/main.go"),
            ("B", "lib/b.go"),
            ("C", "lib/c.go"),
            ("Test_Foo", "lib/b_test.go"),
            ("unused1", "lib/b.go"),
            ("unused2", "lib/a.go"),
        ],
        &[("main", "A"), ("A", "B"), ("B", "C")],
    );

    let dead = find_dead_code(&g).unwrap();
    let ids: Vec<&str> = dead.iter().map(|d| d.node_id.as_str()).collect();
    // main and Test_Foo are entry points; A/B/C have callers
    assert_eq!(ids, vec!["unused2", "unused1"]);
    // Ordered by (file, name): lib/a.go before lib/b.go
    assert_eq!(dead[0].file_path, "lib/a.go");
    assert_eq!(dead[1].file_path, "lib/b.go");
}

#[test]
fn hotspots_rank_by_weighted_degree() {
    let g = graph_from_edges(
        &[
            ("hub", "pkg/m.go"),
            ("s1", "pkg/m.go"),
            ("s2", "pkg/m.go"),
            ("s3", "pkg/m.go"),
        ],
        &[("s1", "hub"), ("s2", "hub"), ("s3", "hub"), ("hub", "s1")],
    );
    let hotspots = find_hotspots(&g, 2).unwrap();
    assert_eq!(hotspots[0].node_id, "hub");
    assert_eq!(hotspots[0].score, 2 * 3 + 1);
    assert_eq!(hotspots.len(), 2);
}

/// Tightly connected 4-clique plus an isolated 4-clique
#[test]
fn leiden_separates_two_cliques() {
    let mut g = CodeGraph::with_default_limits("/repo");
    for (prefix, pkg) in [("a", "pkg/a"), ("b", "pkg/b")] {
        for i in 0..4 {
            let id = format!("{}{}", prefix, i);
            g.add_node(
                Symbol::new(&id, &id, SymbolKind::Function, format!("{}/f.go", pkg))
                    .with_package(pkg),
            )
            .unwrap();
        }
        for i in 0..4 {
            for j in (i + 1)..4 {
                g.add_edge(
                    &format!("{}{}", prefix, i),
                    &format!("{}{}", prefix, j),
                    EdgeKind::Calls,
                    Location::zero(),
                )
                .unwrap();
            }
        }
    }
    g.freeze().unwrap();

    let result = detect_communities(&g, &LeidenOptions::default(), &CancellationToken::new())
        .unwrap();
    assert_eq!(result.communities.len(), 2);
    assert!(result.modularity > 0.3);
    assert!(result.converged);

    // The parallel variant agrees (it falls back to sequential at this size)
    let parallel =
        detect_communities_parallel(&g, &LeidenOptions::default(), &CancellationToken::new())
            .unwrap();
    assert_eq!(parallel, result);
}

#[test]
fn empty_graph_analytics_are_well_formed() {
    let mut g = CodeGraph::with_default_limits("/repo");
    g.freeze().unwrap();

    assert!(find_hotspots(&g, 10).unwrap().is_empty());
    assert!(find_dead_code(&g).unwrap().is_empty());

    let (cycles, err) = find_cycles(&g, &CancellationToken::new());
    assert!(err.is_none());
    assert!(cycles.is_empty());

    let (articulation, err) = find_articulation_points(&g, &CancellationToken::new());
    assert!(err.is_none());
    assert_eq!(articulation.components, 0);

    let result = detect_communities(&g, &LeidenOptions::default(), &CancellationToken::new())
        .unwrap();
    assert!(result.communities.is_empty());
}

#[test]
fn analytics_are_deterministic_across_runs() {
    let g = graph_from_edges(
        &[
            ("a", "p/x.go"),
            ("b", "p/x.go"),
            ("c", "q/y.go"),
            ("d", "q/y.go"),
            ("e", "q/z.go"),
        ],
        &[("a", "b"), ("b", "c"), ("c", "a"), ("c", "d"), ("d", "e")],
    );

    for _ in 0..3 {
        assert_eq!(find_hotspots(&g, 10).unwrap(), find_hotspots(&g, 10).unwrap());
        assert_eq!(find_dead_code(&g).unwrap(), find_dead_code(&g).unwrap());
        assert_eq!(
            find_cycles(&g, &CancellationToken::new()).0,
            find_cycles(&g, &CancellationToken::new()).0
        );
        assert_eq!(
            find_articulation_points(&g, &CancellationToken::new()).0,
            find_articulation_points(&g, &CancellationToken::new()).0
        );
        assert_eq!(
            detect_communities(&g, &LeidenOptions::default(), &CancellationToken::new()).unwrap(),
            detect_communities(&g, &LeidenOptions::default(), &CancellationToken::new()).unwrap()
        );
    }
}

#[test]
fn facade_bundles_queries_with_traces() {
    let g = graph_from_edges(
        &[("a", "p/x.go"), ("b", "q/y.go")],
        &[("a", "b")],
    );
    let analytics = GraphAnalytics::new(&g);

    let (hotspots, step) = analytics.hotspots_with_trace(5);
    assert!(hotspots.is_ok());
    assert_eq!(step.tool, "codegraph-analytics");

    let (coupling, step) = analytics.package_coupling_with_trace();
    assert_eq!(coupling.unwrap().len(), 2);
    assert_eq!(step.metadata["most_unstable_pkg"], "p");
}
