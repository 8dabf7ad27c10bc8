//! The snapshot store seam and its in-memory implementation.
//!
//! Round `r` of a store holds the resident state *before* round `r` runs:
//! round 0 is the prepared initial graph, round `k + 1` is what round `k`'s
//! merge published. Alongside each partition snapshot a store keeps the
//! in-flight records (back-links) that must be emitted by that partition in
//! that round.

use crate::layout::Layout;
use crate::snapshot::Snapshot;
use anyhow::{anyhow, bail, Result};
use schimmy_core::{Node, PartitionId};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Where resident snapshots live between rounds.
///
/// Implementations must allow concurrent calls for *different* partitions of
/// the same round; the driver never touches one `(round, partition)` from two
/// workers.
pub trait SnapshotStore: Send + Sync {
    /// Partitioning this store was built for.
    fn layout(&self) -> &Layout;

    /// Resident snapshot of `partition` at the start of `round`.
    fn load(&self, round: u32, partition: PartitionId) -> Result<Snapshot>;

    /// Replace the snapshot of `snapshot.partition()` for `round`.
    fn publish(&self, round: u32, snapshot: &Snapshot) -> Result<()>;

    /// Records in flight to `partition` at the start of `round`.
    ///
    /// A round nobody routed anything to reads as empty.
    fn load_inflight(&self, round: u32, partition: PartitionId) -> Result<Vec<Node>>;

    /// Replace the in-flight records of `partition` for `round`.
    fn publish_inflight(&self, round: u32, partition: PartitionId, records: &[Node])
        -> Result<()>;

    /// Highest round for which every partition has a snapshot.
    fn latest_round(&self) -> Result<Option<u32>>;

    /// Drop every snapshot and in-flight record of rounds after `round`.
    fn truncate_after(&self, round: u32) -> Result<()>;

    /// All partition snapshots of `round`, in partition order.
    fn load_round(&self, round: u32) -> Result<Vec<Snapshot>> {
        (0..self.layout().partitions)
            .map(|p| self.load(round, p))
            .collect()
    }
}

/// Heap-backed store for tests and small jobs.
#[derive(Debug)]
pub struct MemoryStore {
    layout: Layout,
    snapshots: Mutex<BTreeMap<(u32, PartitionId), Snapshot>>,
    inflight: Mutex<BTreeMap<(u32, PartitionId), Vec<Node>>>,
}

impl MemoryStore {
    /// Empty store for `layout`.
    #[must_use]
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            snapshots: Mutex::new(BTreeMap::new()),
            inflight: Mutex::new(BTreeMap::new()),
        }
    }

    fn check_partition(&self, partition: PartitionId) -> Result<()> {
        if partition >= self.layout.partitions {
            bail!(
                "partition {partition} out of range for a {}-partition store",
                self.layout.partitions
            );
        }
        Ok(())
    }
}

impl SnapshotStore for MemoryStore {
    fn layout(&self) -> &Layout {
        &self.layout
    }

    fn load(&self, round: u32, partition: PartitionId) -> Result<Snapshot> {
        self.check_partition(partition)?;
        let map = self
            .snapshots
            .lock()
            .map_err(|_| anyhow!("snapshot map poisoned"))?;
        map.get(&(round, partition))
            .cloned()
            .ok_or_else(|| anyhow!("no snapshot for round {round} partition {partition}"))
    }

    fn publish(&self, round: u32, snapshot: &Snapshot) -> Result<()> {
        self.check_partition(snapshot.partition())?;
        self.snapshots
            .lock()
            .map_err(|_| anyhow!("snapshot map poisoned"))?
            .insert((round, snapshot.partition()), snapshot.clone());
        Ok(())
    }

    fn load_inflight(&self, round: u32, partition: PartitionId) -> Result<Vec<Node>> {
        self.check_partition(partition)?;
        let map = self
            .inflight
            .lock()
            .map_err(|_| anyhow!("in-flight map poisoned"))?;
        Ok(map.get(&(round, partition)).cloned().unwrap_or_default())
    }

    fn publish_inflight(
        &self,
        round: u32,
        partition: PartitionId,
        records: &[Node],
    ) -> Result<()> {
        self.check_partition(partition)?;
        self.inflight
            .lock()
            .map_err(|_| anyhow!("in-flight map poisoned"))?
            .insert((round, partition), records.to_vec());
        Ok(())
    }

    fn latest_round(&self) -> Result<Option<u32>> {
        let map = self
            .snapshots
            .lock()
            .map_err(|_| anyhow!("snapshot map poisoned"))?;
        let mut per_round: BTreeMap<u32, u32> = BTreeMap::new();
        for &(round, _) in map.keys() {
            *per_round.entry(round).or_default() += 1;
        }
        Ok(per_round
            .into_iter()
            .rev()
            .find(|&(_, n)| n == self.layout.partitions)
            .map(|(round, _)| round))
    }

    fn truncate_after(&self, round: u32) -> Result<()> {
        self.snapshots
            .lock()
            .map_err(|_| anyhow!("snapshot map poisoned"))?
            .retain(|&(r, _), _| r <= round);
        self.inflight
            .lock()
            .map_err(|_| anyhow!("in-flight map poisoned"))?
            .retain(|&(r, _), _| r <= round);
        Ok(())
    }
}
