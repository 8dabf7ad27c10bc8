//! One-time preparation: split an initial graph into round-0 snapshots.
//!
//! Preparation is an explicit step rather than a side effect of opening a
//! store. Running it again with the same input rewrites byte-identical
//! partition files and discards every round the store had run since.

use crate::snapshot::Snapshot;
use crate::store::SnapshotStore;
use anyhow::{Context, Result};
use schimmy_core::io::{stream_nodes_auto, Validated};
use schimmy_core::Node;
use std::path::Path;
use tracing::{info, warn};

/// What [`prepare`] wrote.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrepareReport {
    /// Total nodes written.
    pub nodes: usize,
    /// Nodes per partition, indexed by partition id.
    pub per_partition: Vec<usize>,
}

/// Validate `records`, route them by the store's partitioner and publish
/// round 0 for every partition (empty partitions included).
///
/// Rounds after 0 and in-flight records left by an earlier run are discarded,
/// so the next propagation starts from the freshly prepared graph.
///
/// # Errors
/// The first malformed, out-of-range or duplicate record aborts preparation
/// before anything is published.
pub fn prepare<S, I>(store: &S, records: I) -> Result<PrepareReport>
where
    S: SnapshotStore + ?Sized,
    I: IntoIterator<Item = schimmy_core::Result<Node>>,
{
    let layout = store.layout().clone();
    let partitioner = layout.partitioner()?;
    let mut snaps: Vec<Snapshot> = partitioner.ids().map(Snapshot::new).collect();

    for node in Validated::new(records.into_iter(), layout.address_space) {
        let node = node?;
        let p = partitioner.partition(node.address);
        snaps[p as usize].insert(&partitioner, node)?;
    }

    if let Some(latest) = store.latest_round()?.filter(|&r| r > 0) {
        warn!(latest, "re-preparing a store that already ran rounds; discarding them");
    }
    store
        .truncate_after(0)
        .context("discard rounds from an earlier run")?;

    let mut report = PrepareReport::default();
    for snap in &snaps {
        store
            .publish(0, snap)
            .with_context(|| format!("publish round 0 partition {}", snap.partition()))?;
        store.publish_inflight(0, snap.partition(), &[])?;
        report.nodes += snap.len();
        report.per_partition.push(snap.len());
    }
    info!(
        nodes = report.nodes,
        partitions = snaps.len(),
        network = %layout.network,
        "prepared round 0"
    );
    Ok(report)
}

/// [`prepare`] from a `.json` / `.cbor` / `.jsonl` / `.ndjson` graph file.
pub fn prepare_file<S>(store: &S, graph: impl AsRef<Path>) -> Result<PrepareReport>
where
    S: SnapshotStore + ?Sized,
{
    let graph = graph.as_ref();
    let stream = stream_nodes_auto(graph).with_context(|| format!("open {}", graph.display()))?;
    prepare(store, stream).with_context(|| format!("prepare from {}", graph.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Layout;
    use crate::store::MemoryStore;
    use schimmy_core::{Error, Partitioner, Status};

    fn store(partitions: u32) -> MemoryStore {
        MemoryStore::new(Layout::new(
            "network-graphable",
            &Partitioner::new(64, partitions).unwrap(),
        ))
    }

    fn graph() -> Vec<Node> {
        vec![
            Node::new(1, Status::Infected).with_hit_list(vec![40]),
            Node::new(17, Status::Vulnerable),
            Node::new(40, Status::Immune),
            Node::new(63, Status::Vulnerable),
        ]
    }

    #[test]
    fn splits_by_range_and_keeps_empty_partitions() {
        let s = store(8);
        let report = prepare(&s, graph().into_iter().map(Ok)).unwrap();
        assert_eq!(report.nodes, 4);
        assert_eq!(report.per_partition, vec![1, 0, 1, 0, 0, 1, 0, 1]);
        assert_eq!(s.latest_round().unwrap(), Some(0));
        assert!(s.load(0, 1).unwrap().is_empty());
        assert_eq!(s.load(0, 5).unwrap().get(40).unwrap().status, Status::Immune);
    }

    #[test]
    fn rerun_is_idempotent() {
        let s = store(2);
        prepare(&s, graph().into_iter().map(Ok)).unwrap();
        let first = s.load_round(0).unwrap();
        prepare(&s, graph().into_iter().map(Ok)).unwrap();
        assert_eq!(s.load_round(0).unwrap(), first);
    }

    #[test]
    fn reprepare_discards_rounds_already_run() {
        let s = store(2);
        prepare(&s, graph().into_iter().map(Ok)).unwrap();
        for round in 1..=3 {
            for p in 0..2 {
                s.publish(round, &Snapshot::new(p)).unwrap();
            }
        }
        s.publish_inflight(3, 0, &[Node::new(1, Status::Successful).with_source(40)])
            .unwrap();
        assert_eq!(s.latest_round().unwrap(), Some(3));

        let fresh = vec![Node::new(50, Status::Vulnerable)];
        prepare(&s, fresh.into_iter().map(Ok)).unwrap();
        assert_eq!(s.latest_round().unwrap(), Some(0));
        assert!(s.load(1, 0).is_err());
        assert!(s.load_inflight(3, 0).unwrap().is_empty());
        let nodes: Vec<Node> = s
            .load_round(0)
            .unwrap()
            .into_iter()
            .flat_map(Snapshot::into_nodes)
            .collect();
        assert_eq!(nodes, vec![Node::new(50, Status::Vulnerable)]);
    }

    #[test]
    fn bad_record_aborts_before_publishing() {
        let s = store(2);
        let mut g = graph();
        g.push(Node::new(64, Status::Vulnerable));
        let err = prepare(&s, g.into_iter().map(Ok)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::Deserialization { position: Some(5), .. })
        ));
        assert_eq!(s.latest_round().unwrap(), None);
    }

    #[test]
    fn duplicate_record_aborts() {
        let s = store(2);
        let mut g = graph();
        g.push(Node::new(17, Status::Immune));
        let err = prepare(&s, g.into_iter().map(Ok)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::DuplicateAddress(17))
        ));
    }
}
