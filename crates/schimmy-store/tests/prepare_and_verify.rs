//! Generate → prepare → commit → verify against an on-disk store.

use schimmy_core::Partitioner;
use schimmy_network::generator::{generate_graph, GraphSpec};
use schimmy_network::kind::NetworkKind;
use schimmy_store::dir::DirStore;
use schimmy_store::layout::Layout;
use schimmy_store::manifest::{commit_round, read_manifest, verify_round, write_manifest};
use schimmy_store::prepare::prepare;
use schimmy_store::store::SnapshotStore;
use std::path::PathBuf;

fn tmp_root(name: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("schimmy_store_it_{name}_{nanos}"))
}

#[test]
fn prepared_round_verifies_after_reopen() {
    let kind = NetworkKind::Network256;
    let spec = GraphSpec {
        population: 120,
        seeds: 4,
        immune_ratio: 0.1,
        hit_list_len: 6,
        seed: 5,
    };
    let graph = generate_graph(kind.address_space(), &spec).unwrap();

    let root = tmp_root("verify");
    let parts = Partitioner::new(kind.address_space(), 4).unwrap();
    let store = DirStore::create(&root, Layout::new(kind.name(), &parts)).unwrap();
    let report = prepare(&store, graph.iter().cloned().map(Ok)).unwrap();
    assert_eq!(report.nodes, 120);
    assert_eq!(report.per_partition.iter().sum::<usize>(), 120);

    let manifest = commit_round(&store, 0).unwrap();
    assert_eq!(manifest.counts.infected, 4);
    write_manifest(store.manifest_path(0), &manifest).unwrap();

    let reopened = DirStore::open(&root).unwrap();
    let back = read_manifest(reopened.manifest_path(0)).unwrap();
    verify_round(&reopened, 0, &back).unwrap();

    // Every resident node came back where the partitioner put it.
    let mut all: Vec<_> = reopened
        .load_round(0)
        .unwrap()
        .into_iter()
        .flat_map(|s| s.into_nodes())
        .collect();
    all.sort_by_key(|n| n.address);
    assert_eq!(all, graph);

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn second_prepare_rewrites_identical_files() {
    let kind = NetworkKind::NetworkGraphable;
    let graph = generate_graph(kind.address_space(), &GraphSpec::default()).unwrap();
    let root = tmp_root("idem");
    let parts = Partitioner::new(kind.address_space(), 3).unwrap();
    let store = DirStore::create(&root, Layout::new(kind.name(), &parts)).unwrap();

    prepare(&store, graph.iter().cloned().map(Ok)).unwrap();
    let first: Vec<Vec<u8>> = parts
        .ids()
        .map(|p| std::fs::read(store.partition_path(0, p)).unwrap())
        .collect();
    prepare(&store, graph.iter().cloned().map(Ok)).unwrap();
    let second: Vec<Vec<u8>> = parts
        .ids()
        .map(|p| std::fs::read(store.partition_path(0, p)).unwrap())
        .collect();
    assert_eq!(first, second);

    let _ = std::fs::remove_dir_all(root);
}
