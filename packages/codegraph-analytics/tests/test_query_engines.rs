//! Integration tests for the HLD-backed path/subtree query engines
//!
//! Covers the canonical single-tree scenario, the two-chain forest, and the
//! GCD chain, plus update round-trips through the subtree update engine.

use std::collections::HashMap;
use std::sync::Arc;

use codegraph_analytics::{
    Aggregate, CancellationToken, CodeGraph, EdgeKind, ForestOptions, GraphError,
    HeavyLightDecomposition, HldForest, Location, PathQueryEngine, SubtreeQueryEngine,
    SubtreeUpdateEngine, Symbol, SymbolKind,
};

fn tree_graph(nodes: &[&str], edges: &[(&str, &str)]) -> CodeGraph {
    let mut g = CodeGraph::with_default_limits("/repo");
    for id in nodes {
        g.add_node(Symbol::new(*id, *id, SymbolKind::Function, "main.go"))
            .unwrap();
    }
    for (from, to) in edges {
        g.add_edge(from, to, EdgeKind::Calls, Location::in_file("main.go"))
            .unwrap();
    }
    g.freeze().unwrap();
    g
}

fn values(pairs: &[(&str, i64)]) -> HashMap<String, i64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// Nine-node tree: 1→{2,3,4}, 2→{5,6}, 4→7, 5→{8,9}
fn nine_node_tree() -> (Arc<HeavyLightDecomposition>, HashMap<String, i64>) {
    let g = tree_graph(
        &["1", "2", "3", "4", "5", "6", "7", "8", "9"],
        &[
            ("1", "2"),
            ("1", "3"),
            ("1", "4"),
            ("2", "5"),
            ("2", "6"),
            ("4", "7"),
            ("5", "8"),
            ("5", "9"),
        ],
    );
    let hld = Arc::new(HeavyLightDecomposition::new(&g, "1", &CancellationToken::new()).unwrap());
    let vals = values(&[
        ("1", 5),
        ("2", 10),
        ("3", 2),
        ("4", 8),
        ("5", 3),
        ("6", 7),
        ("7", 4),
        ("8", 1),
        ("9", 6),
    ]);
    (hld, vals)
}

#[test]
fn subtree_sums_on_nine_node_tree() {
    let (hld, vals) = nine_node_tree();
    let engine = SubtreeQueryEngine::new(hld, &vals, Aggregate::Sum);

    assert_eq!(engine.subtree_sum("1").unwrap(), 46);
    assert_eq!(engine.subtree_sum("2").unwrap(), 27);
    assert_eq!(engine.subtree_sum("5").unwrap(), 10);
    assert_eq!(engine.subtree_sum("8").unwrap(), 1);
}

#[test]
fn path_queries_on_nine_node_tree() {
    let (hld, vals) = nine_node_tree();

    let sum = PathQueryEngine::new(Arc::clone(&hld), &vals, Aggregate::Sum);
    // 8→5→2→1→4→7 = 1+3+10+5+8+4
    assert_eq!(sum.path_sum("8", "7").unwrap(), 31);

    let min = PathQueryEngine::new(Arc::clone(&hld), &vals, Aggregate::Min);
    assert_eq!(min.path_min("8", "1").unwrap(), 1);

    let max = PathQueryEngine::new(hld, &vals, Aggregate::Max);
    assert_eq!(max.path_max("9", "1").unwrap(), 10);
}

/// Two disjoint chains A→B→C and X→Y→Z
fn two_chain_forest() -> (Arc<HldForest>, HashMap<String, i64>) {
    let g = tree_graph(
        &["A", "B", "C", "X", "Y", "Z"],
        &[("A", "B"), ("B", "C"), ("X", "Y"), ("Y", "Z")],
    );
    let forest =
        Arc::new(HldForest::new(&g, ForestOptions::default(), &CancellationToken::new()).unwrap());
    let vals = values(&[
        ("A", 10),
        ("B", 20),
        ("C", 30),
        ("X", 100),
        ("Y", 200),
        ("Z", 300),
    ]);
    (forest, vals)
}

#[test]
fn forest_subtrees_over_two_chains() {
    let (forest, vals) = two_chain_forest();
    let engine = SubtreeQueryEngine::from_forest(forest, &vals, Aggregate::Sum);

    assert_eq!(engine.subtree_sum("A").unwrap(), 60);
    assert_eq!(engine.subtree_sum("X").unwrap(), 600);
    assert_eq!(engine.subtree_sum("Y").unwrap(), 500);
}

#[test]
fn cross_tree_paths_error() {
    let (forest, vals) = two_chain_forest();
    let engine = PathQueryEngine::from_forest(forest, &vals, Aggregate::Sum);

    assert_eq!(engine.path_sum("A", "C").unwrap(), 60);
    for (u, v) in [("A", "X"), ("C", "Z"), ("B", "Y")] {
        assert!(matches!(
            engine.path_sum(u, v),
            Err(GraphError::CrossTreeQuery { .. })
        ));
    }
}

/// GCD on the chain 12→18→24
#[test]
fn gcd_chain_queries() {
    let g = tree_graph(&["12", "18", "24"], &[("12", "18"), ("18", "24")]);
    let hld = Arc::new(HeavyLightDecomposition::new(&g, "12", &CancellationToken::new()).unwrap());
    let vals = values(&[("12", 12), ("18", 18), ("24", 24)]);

    let path = PathQueryEngine::new(Arc::clone(&hld), &vals, Aggregate::Gcd);
    assert_eq!(path.path_gcd("12", "24").unwrap(), 6);

    let subtree = SubtreeQueryEngine::new(hld, &vals, Aggregate::Gcd);
    assert_eq!(subtree.subtree_gcd("18").unwrap(), 6);
}

#[test]
fn subtree_update_round_trip() {
    let (hld, vals) = nine_node_tree();
    let mut engine = SubtreeUpdateEngine::new(hld, &vals, Aggregate::Sum);

    let initial = engine.queries().subtree_sum("5").unwrap();
    engine.subtree_update("5", 9).unwrap();
    engine.subtree_update("5", -9).unwrap();
    assert_eq!(engine.queries().subtree_sum("5").unwrap(), initial);
}

#[test]
fn point_update_shifts_covering_ranges_only() {
    let (hld, vals) = nine_node_tree();
    let sum = PathQueryEngine::new(Arc::clone(&hld), &vals, Aggregate::Sum);
    let before_inside = sum.path_sum("8", "1").unwrap();
    let before_outside = sum.path_sum("3", "3").unwrap();

    // Rebuild with node 5 bumped by +δ: ranges containing 5 shift by δ
    let mut shifted = vals.clone();
    *shifted.get_mut("5").unwrap() += 11;
    let sum_after = PathQueryEngine::new(hld, &shifted, Aggregate::Sum);
    assert_eq!(sum_after.path_sum("8", "1").unwrap(), before_inside + 11);
    assert_eq!(sum_after.path_sum("3", "3").unwrap(), before_outside);
}

#[test]
fn lca_and_subtree_nodes() {
    let (hld, vals) = nine_node_tree();
    let path = PathQueryEngine::new(Arc::clone(&hld), &vals, Aggregate::Sum);
    assert_eq!(path.lca("8", "9").unwrap(), "5");
    assert_eq!(path.lca("6", "9").unwrap(), "2");
    assert_eq!(path.lca("3", "7").unwrap(), "1");

    let subtree = SubtreeQueryEngine::new(hld, &vals, Aggregate::Sum);
    let mut nodes = subtree.subtree_nodes("5").unwrap();
    nodes.sort();
    assert_eq!(nodes, vec!["5", "8", "9"]);
}

#[test]
fn single_node_graph_hld() {
    let g = tree_graph(&["solo"], &[]);
    let hld = Arc::new(HeavyLightDecomposition::new(&g, "solo", &CancellationToken::new()).unwrap());
    assert_eq!(hld.node_count(), 1);
    assert_eq!(hld.depth(0), 0);
    assert_eq!(hld.parent(0), None);

    let engine = SubtreeQueryEngine::new(hld, &values(&[("solo", 42)]), Aggregate::Sum);
    assert_eq!(engine.subtree_sum("solo").unwrap(), 42);
}

#[test]
fn engine_stats_accumulate() {
    let (hld, vals) = nine_node_tree();
    let engine = PathQueryEngine::new(hld, &vals, Aggregate::Sum).with_caches(true, true);

    engine.path_query("8", "7").unwrap();
    engine.path_query("8", "7").unwrap();
    engine.path_query("9", "3").unwrap();

    let stats = engine.stats();
    assert_eq!(stats.query_count, 3);
    assert!(stats.cache_hit_ratio > 0.0);
    assert!(stats.total_latency >= stats.last_query_latency);
}
