//! Two-phase, barrier-separated round execution.

use crate::stats::{RoundStats, RunReport};
use anyhow::{anyhow, Context, Result};
use rayon::prelude::*;
use schimmy_core::{
    emit, merge, Address, Emission, Error, Network, Node, PartitionId, Partitioner,
    PropagationConfig, Status,
};
use schimmy_store::snapshot::Snapshot;
use schimmy_store::store::SnapshotStore;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// What one partition's emission phase hands to the barrier.
struct Emitted {
    snapshot: Snapshot,
    /// Deltas bucketed by destination partition.
    outbox: Vec<Vec<Node>>,
    attempts: u64,
}

/// What one partition's merge phase hands to the barrier.
struct MergedPartition {
    next: Snapshot,
    nodes: u64,
    infected: u64,
    newly_infected: u64,
    backlinks: Vec<Node>,
    volatile: Vec<Node>,
}

/// Runs propagation rounds against a snapshot store.
///
/// The partitioner is taken from the store's layout, so a driver can only run
/// under the partitioning its snapshots were written with.
pub struct RoundDriver<'s, S: SnapshotStore + ?Sized, N> {
    store: &'s S,
    network: N,
    cfg: PropagationConfig,
    partitioner: Partitioner,
}

impl<'s, S, N> RoundDriver<'s, S, N>
where
    S: SnapshotStore + ?Sized,
    N: Network + Clone,
{
    /// Bind a store, a network model and the job's propagation settings.
    ///
    /// # Errors
    /// [`Error::LayoutMismatch`] if the network's address space is not the one
    /// the store was partitioned over.
    pub fn new(store: &'s S, network: N, cfg: PropagationConfig) -> Result<Self> {
        let layout = store.layout();
        if network.address_space() != layout.address_space {
            return Err(Error::LayoutMismatch(format!(
                "network address space {} but store {} was built for {}",
                network.address_space(),
                layout.network,
                layout.address_space
            ))
            .into());
        }
        let partitioner = layout.partitioner()?;
        Ok(Self {
            store,
            network,
            cfg,
            partitioner,
        })
    }

    /// Propagation settings.
    #[must_use]
    pub const fn config(&self) -> &PropagationConfig {
        &self.cfg
    }

    /// Run `cfg.iterations` rounds starting from the store's latest complete
    /// snapshot.
    ///
    /// # Errors
    /// [`Error::Configuration`] if the last round would not fit in a `u32`.
    pub fn run(&self) -> Result<RunReport> {
        let start = self
            .store
            .latest_round()?
            .ok_or_else(|| anyhow!("store has no prepared snapshot; run `prepare` first"))?;
        let end = start.checked_add(self.cfg.iterations).ok_or_else(|| {
            Error::config(format!(
                "{} iterations from round {start} overflow the round counter",
                self.cfg.iterations
            ))
        })?;
        let mut report = RunReport {
            start_round: start,
            final_round: start,
            ..RunReport::default()
        };
        for round in start..end {
            let (stats, volatile) = self.run_round(round)?;
            info!(
                round,
                nodes = stats.nodes,
                infected = stats.infected,
                newly_infected = stats.newly_infected,
                attempts = stats.attempts,
                backlinks = stats.backlinks,
                volatile = stats.volatile,
                "round complete"
            );
            report.rounds.push(stats);
            report.volatile = volatile;
            report.final_round = round + 1;
        }
        Ok(report)
    }

    /// Run one round: read snapshot `round`, publish snapshot `round + 1`.
    ///
    /// The next round's in-flight records are written before any of its
    /// snapshots, so a round only reads as complete once its back-links are
    /// durable. A round that fails part way is rerun from `round` in full.
    ///
    /// Returns the round's stats and its volatile records.
    pub fn run_round(&self, round: u32) -> Result<(RoundStats, Vec<Node>)> {
        let next_round = round
            .checked_add(1)
            .ok_or_else(|| Error::config(format!("round {round} is the last representable round")))?;
        let network = self.network.for_round(round);
        let ids: Vec<PartitionId> = self.partitioner.ids().collect();

        // Phase 1: emission. Collecting every partition is the first barrier.
        let emitted: Vec<Emitted> = ids
            .par_iter()
            .map(|&p| self.emit_partition(round, p, &network))
            .collect::<Result<_>>()?;

        let attempts = emitted.iter().map(|e| e.attempts).sum();
        let (snapshots, inboxes) = self.route(emitted);

        // Phase 2: merge. Collecting every partition is the second barrier.
        let merged: Vec<MergedPartition> = snapshots
            .into_par_iter()
            .zip(inboxes)
            .map(|(snap, inbox)| self.merge_partition(round, snap, inbox))
            .collect::<Result<_>>()?;

        // Back-links become the next round's in-flight records of their owners.
        let mut inflight: Vec<Vec<Node>> = vec![Vec::new(); ids.len()];
        let mut stats = RoundStats {
            round,
            attempts,
            ..RoundStats::default()
        };
        let mut volatile = Vec::new();
        let mut next = Vec::with_capacity(merged.len());
        for m in merged {
            stats.nodes += m.nodes;
            stats.infected += m.infected;
            stats.newly_infected += m.newly_infected;
            stats.backlinks += m.backlinks.len() as u64;
            stats.volatile += m.volatile.len() as u64;
            for b in m.backlinks {
                let dest = self.partitioner.try_partition(b.address)?;
                inflight[dest as usize].push(b);
            }
            volatile.extend(m.volatile);
            next.push(m.next);
        }
        for (p, records) in ids.iter().zip(&inflight) {
            self.store
                .publish_inflight(next_round, *p, records)
                .with_context(|| format!("publish in-flight round {next_round} partition {p}"))?;
        }
        next.par_iter().try_for_each(|snap| {
            self.store.publish(next_round, snap).with_context(|| {
                format!("publish round {next_round} partition {}", snap.partition())
            })
        })?;
        Ok((stats, volatile))
    }

    fn emit_partition(&self, round: u32, partition: PartitionId, network: &N) -> Result<Emitted> {
        let mut snapshot = self
            .store
            .load(round, partition)
            .with_context(|| format!("load round {round} partition {partition}"))?;
        let inflight = self
            .store
            .load_inflight(round, partition)
            .with_context(|| format!("load in-flight round {round} partition {partition}"))?;

        let mut outbox: Vec<Vec<Node>> = vec![Vec::new(); self.partitioner.partitions() as usize];
        let mut dormant: Vec<(Address, u32)> = Vec::new();
        let mut attempts = 0u64;

        for node in snapshot.nodes() {
            match emit(node, &self.cfg, network) {
                Emission::Quiet => {}
                Emission::Dormant(left) => dormant.push((node.address, left)),
                Emission::Delta(d) => {
                    if d.status == Status::Infecting {
                        attempts += 1;
                    }
                    let dest = self.partitioner.try_partition(d.address)?;
                    outbox[dest as usize].push(d);
                }
            }
        }
        for rec in &inflight {
            self.partitioner.check_owner(rec.address, partition)?;
            if let Some(d) = emit(rec, &self.cfg, network).into_delta() {
                let dest = self.partitioner.try_partition(d.address)?;
                outbox[dest as usize].push(d);
            }
        }
        for (address, left) in dormant {
            if let Some(n) = snapshot.get_mut(address) {
                n.propagation_delay = left;
            }
        }

        debug!(
            round,
            partition,
            resident = snapshot.len(),
            inflight = inflight.len(),
            attempts,
            "emitted"
        );
        Ok(Emitted {
            snapshot,
            outbox,
            attempts,
        })
    }

    /// Transpose per-source outboxes into per-destination inboxes.
    ///
    /// Each inbox lists deltas by source partition, then in emission order, so
    /// merges see the same sequence on every run.
    fn route(&self, emitted: Vec<Emitted>) -> (Vec<Snapshot>, Vec<Vec<Node>>) {
        let n = self.partitioner.partitions() as usize;
        let mut inboxes: Vec<Vec<Node>> = vec![Vec::new(); n];
        let mut snapshots = Vec::with_capacity(n);
        for e in emitted {
            for (dest, mut deltas) in e.outbox.into_iter().enumerate() {
                inboxes[dest].append(&mut deltas);
            }
            snapshots.push(e.snapshot);
        }
        (snapshots, inboxes)
    }

    fn merge_partition(
        &self,
        round: u32,
        mut resident: Snapshot,
        inbox: Vec<Node>,
    ) -> Result<MergedPartition> {
        let partition = resident.partition();

        let mut by_address: BTreeMap<Address, Vec<Node>> = BTreeMap::new();
        for d in inbox {
            self.partitioner.check_owner(d.address, partition)?;
            by_address.entry(d.address).or_default().push(d);
        }
        let resident_addresses: Vec<Address> = resident.nodes().map(|n| n.address).collect();
        for a in resident_addresses {
            by_address.entry(a).or_default();
        }

        let mut out = MergedPartition {
            next: Snapshot::new(partition),
            nodes: 0,
            infected: 0,
            newly_infected: 0,
            backlinks: Vec::new(),
            volatile: Vec::new(),
        };
        for (address, deltas) in by_address {
            let m = merge(address, resident.remove(address), deltas, &self.cfg)?;
            if m.is_new_infection() {
                out.newly_infected += 1;
            }
            if let Some(node) = m.node {
                if node.status == Status::Infected {
                    out.infected += 1;
                }
                out.next.insert(&self.partitioner, node)?;
            }
            out.backlinks.extend(m.backlink);
            out.volatile.extend(m.volatile);
        }
        out.nodes = out.next.len() as u64;

        debug!(
            round,
            partition,
            nodes = out.nodes,
            newly_infected = out.newly_infected,
            "merged"
        );
        Ok(out)
    }
}
