//! Multi-round properties over seeded networks.

use proptest::prelude::*;
use schimmy_core::{Node, Partitioner, PropagationConfig, Status};
use schimmy_driver::RoundDriver;
use schimmy_network::generator::{generate_graph, GraphSpec};
use schimmy_network::kind::NetworkKind;
use schimmy_network::seeded::SeededNetwork;
use schimmy_store::dir::DirStore;
use schimmy_store::layout::Layout;
use schimmy_store::manifest::commit_round;
use schimmy_store::prepare::prepare;
use schimmy_store::snapshot::Snapshot;
use schimmy_store::store::{MemoryStore, SnapshotStore};

const KIND: NetworkKind = NetworkKind::NetworkGraphable;

fn run(graph: &[Node], partitions: u32, seed: u64, cfg: PropagationConfig) -> Vec<Vec<Node>> {
    let parts = Partitioner::new(KIND.address_space(), partitions).unwrap();
    let store = MemoryStore::new(Layout::new(KIND.name(), &parts));
    prepare(&store, graph.iter().cloned().map(Ok)).unwrap();
    let driver = RoundDriver::new(&store, SeededNetwork::new(KIND, seed), cfg).unwrap();
    let report = driver.run().unwrap();
    (0..=report.final_round)
        .map(|r| {
            store
                .load_round(r)
                .unwrap()
                .into_iter()
                .flat_map(Snapshot::into_nodes)
                .collect()
        })
        .collect()
}

fn graph(seed: u64) -> Vec<Node> {
    generate_graph(
        KIND.address_space(),
        &GraphSpec {
            population: 48,
            seeds: 2,
            immune_ratio: 0.2,
            hit_list_len: 3,
            seed,
        },
    )
    .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn outcome_does_not_depend_on_partition_count(seed in any::<u64>(), delay in 0u32..3) {
        let g = graph(seed);
        let cfg = PropagationConfig::default().with_iterations(6).with_propagation_delay(delay);
        let one = run(&g, 1, seed, cfg);
        for p in [2, 3, 8] {
            prop_assert_eq!(&run(&g, p, seed, cfg), &one);
        }
    }

    #[test]
    fn population_is_conserved_and_infection_is_sticky(seed in any::<u64>()) {
        let g = graph(seed);
        let cfg = PropagationConfig::default().with_iterations(5).with_propagation_delay(1);
        let rounds = run(&g, 4, seed, cfg);
        for pair in rounds.windows(2) {
            let (before, after) = (&pair[0], &pair[1]);
            let addrs = |v: &Vec<Node>| v.iter().map(|n| n.address).collect::<Vec<_>>();
            prop_assert_eq!(addrs(before), addrs(after));
            for (b, a) in before.iter().zip(after) {
                prop_assert!(a.status.is_stable());
                if b.status == Status::Infected {
                    prop_assert_eq!(a.status, Status::Infected);
                }
                if b.status == Status::Immune {
                    prop_assert_eq!(a.status, Status::Immune);
                }
            }
        }
    }
}

#[test]
fn replay_from_disk_matches_bit_for_bit() {
    let g = graph(77);
    let cfg = PropagationConfig::default()
        .with_iterations(4)
        .with_propagation_delay(1);
    let parts = Partitioner::new(KIND.address_space(), 3).unwrap();

    let mut roots = Vec::new();
    for attempt in 0..2 {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let root = std::env::temp_dir().join(format!("schimmy_driver_replay_{attempt}_{nanos}"));
        let store = DirStore::create(&root, Layout::new(KIND.name(), &parts)).unwrap();
        prepare(&store, g.iter().cloned().map(Ok)).unwrap();
        let report = RoundDriver::new(&store, SeededNetwork::new(KIND, 9), cfg)
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(report.final_round, 4);
        assert_eq!(store.latest_round().unwrap(), Some(4));
        roots.push(commit_round(&store, 4).unwrap().root);
        let _ = std::fs::remove_dir_all(root);
    }
    assert_eq!(roots[0], roots[1]);
}

#[test]
fn resumed_run_continues_from_latest_round() {
    let g = graph(3);
    let parts = Partitioner::new(KIND.address_space(), 2).unwrap();
    let store = MemoryStore::new(Layout::new(KIND.name(), &parts));
    prepare(&store, g.iter().cloned().map(Ok)).unwrap();
    let net = SeededNetwork::new(KIND, 1);

    let two = PropagationConfig::default().with_iterations(2);
    let first = RoundDriver::new(&store, net, two).unwrap().run().unwrap();
    let second = RoundDriver::new(&store, net, two).unwrap().run().unwrap();
    assert_eq!((first.start_round, first.final_round), (0, 2));
    assert_eq!((second.start_round, second.final_round), (2, 4));

    // Same as running four rounds in one go.
    let straight = run(&g, 2, 1, PropagationConfig::default().with_iterations(4));
    let resumed: Vec<Node> = store
        .load_round(4)
        .unwrap()
        .into_iter()
        .flat_map(Snapshot::into_nodes)
        .collect();
    assert_eq!(straight[4], resumed);
}
