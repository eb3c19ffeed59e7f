//! Integration test: the merged graph accumulates across independent runs.
//!
//! Each "run" opens the pedigree cache and graph store from disk, fetches one
//! subject through the cache with a stub loader, merges it and saves. The
//! subjects share their sire line:
//!
//!   Run 1: Järvsöfaks (sire Trollfaks, dam Järvsö Pil), depth 2
//!   Run 2: Tangen Scott (sire Järvsöfaks), depth 2, so Trollfaks sits at
//!          generation 2 of the second pedigree

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use ancestry_graph_core::analysis::summarize;
use ancestry_graph_core::graph::{GraphStore, MergedAncestryGraph, NodeId};
use ancestry_graph_core::pedigree::{
    flatten, FlattenedPedigree, PedigreeCache, PedigreeTree, SubjectKey,
};
use ancestry_graph_core::AncestryError;

static COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_dir() -> PathBuf {
    let id = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("test_ancestry_runs_{}_{}", std::process::id(), id))
}

fn horse(name: &str, id: &str, year: i32) -> PedigreeTree {
    let mut tree = PedigreeTree::leaf(name);
    tree.external_id = Some(id.to_string());
    tree.birth_year = Some(year);
    tree
}

fn jarvsofaks() -> PedigreeTree {
    horse("Järvsöfaks", "3001", 1994).with_parents(
        horse("Trollfaks", "2001", 1980)
            .with_parents(horse("Faks", "1001", 1967), horse("Trollmor", "1002", 1970)),
        horse("Järvsö Pil", "2002", 1984)
            .with_parents(horse("Pilot", "1003", 1972), horse("Pilmor", "1004", 1975)),
    )
}

fn tangen_scott() -> PedigreeTree {
    horse("Tangen Scott", "4001", 2003).with_parents(
        horse("Järvsöfaks", "3001", 1994)
            .with_parents(horse("Trollfaks", "2001", 1980), horse("Järvsö Pil", "2002", 1984)),
        horse("Tangen Mor", "3002", 1995)
            .with_parents(horse("Mormor S", "2003", 1985), horse("Mormor D", "2004", 1986)),
    )
}

/// One merge-and-save cycle. Returns how many times the loader ran.
fn run(dir: &Path, key: &SubjectKey, tree: &PedigreeTree) -> usize {
    let mut cache = PedigreeCache::open(dir.join("pedigrees"));
    let store = GraphStore::new(dir.join("merged_pedigree_graph.json"));
    let mut graph = store.load().unwrap();

    let calls = Cell::new(0);
    let pedigree: FlattenedPedigree = cache
        .get_or_fetch(key, |_| {
            calls.set(calls.get() + 1);
            Ok(flatten(tree))
        })
        .unwrap();
    graph.merge(&pedigree).unwrap();
    store.save(&graph).unwrap();
    calls.get()
}

#[test]
fn test_graph_accumulates_across_runs() {
    let dir = temp_dir();
    let first = SubjectKey::new("Järvsöfaks", Some(1994));
    let second = SubjectKey::new("Tangen Scott", Some(2003));

    assert_eq!(run(&dir, &first, &jarvsofaks()), 1);
    assert_eq!(run(&dir, &second, &tangen_scott()), 1);
    // A repeat run is served from the cache and leaves the graph unchanged.
    let before = GraphStore::new(dir.join("merged_pedigree_graph.json")).load().unwrap();
    assert_eq!(run(&dir, &first, &jarvsofaks()), 0);

    let graph = GraphStore::new(dir.join("merged_pedigree_graph.json")).load().unwrap();
    std::fs::remove_dir_all(&dir).ok();

    // 7 + 7 nodes, with Järvsöfaks, Trollfaks and Järvsö Pil shared.
    assert_eq!(graph.node_count(), 11);
    assert_eq!(graph.nodes().collect::<Vec<_>>(), before.nodes().collect::<Vec<_>>());
    assert_eq!(graph.merge_log().len(), 3);

    let trollfaks = graph.node(&NodeId::external("2001")).unwrap();
    assert_eq!(trollfaks.appearance_count(), 2);

    // Through the merged graph Tangen Scott now reaches Faks at depth 3.
    let summary = summarize(&graph, &NodeId::external("4001"), 3).unwrap();
    assert_eq!(summary[2].appearance_count, 4);
    assert_eq!(summary[2].unique_count, 4);
}

#[test]
fn test_round_trip_preserves_structure() {
    let dir = temp_dir();
    let store = GraphStore::new(dir.join("graph.json"));

    let mut graph = MergedAncestryGraph::new();
    graph.merge(&flatten(&jarvsofaks())).unwrap();
    graph.merge(&flatten(&tangen_scott())).unwrap();
    store.save(&graph).unwrap();

    let loaded = store.load().unwrap();
    std::fs::remove_dir_all(&dir).ok();

    assert_eq!(loaded, graph);
    for node in graph.nodes() {
        assert_eq!(loaded.node(&node.id).unwrap().appearances, node.appearances);
    }
    assert_eq!(
        loaded.edges().collect::<Vec<_>>(),
        graph.edges().collect::<Vec<_>>()
    );
}

#[test]
fn test_truncated_store_fails_loudly() {
    let dir = temp_dir();
    let path = dir.join("graph.json");
    let store = GraphStore::new(&path);

    let mut graph = MergedAncestryGraph::new();
    graph.merge(&flatten(&jarvsofaks())).unwrap();
    store.save(&graph).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, &text.as_bytes()[..text.len() / 2]).unwrap();

    let err = store.load().unwrap_err();
    std::fs::remove_dir_all(&dir).ok();
    assert!(matches!(err, AncestryError::PersistenceCorruption { .. }));
}
