//! BLAKE3 digests over one published round.
//!
//! - Partition digest: BLAKE3 over a compact, fixed-order encoding of every
//!   resident node (address order), so it does not depend on the store's file
//!   format.
//! - Round root: Merkle root over the partition digests in partition order.
//! - Manifests read/write as JSON or CBOR by extension.

use crate::layout::Layout;
use crate::snapshot::{Snapshot, StatusCounts};
use crate::store::SnapshotStore;
use anyhow::{bail, Context, Result};
use blake3::Hasher;
use schimmy_core::{Node, PartitionId, Status};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Format version for [`SnapshotManifest`].
pub const MANIFEST_VERSION: u32 = 1;

/// Digest of one partition snapshot.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartitionDigest {
    /// Partition id.
    pub partition: PartitionId,
    /// Resident node count.
    pub nodes: u64,
    /// BLAKE3 over the canonical node encoding.
    pub digest: [u8; 32],
}

/// Commitment to every partition of one round.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotManifest {
    /// Schema version.
    pub version: u32,
    /// Round the snapshots belong to.
    pub round: u32,
    /// Layout of the store they were read from.
    pub layout: Layout,
    /// Per-partition digests, in partition order.
    pub partitions: Vec<PartitionDigest>,
    /// Status tally across the round.
    pub counts: StatusCounts,
    /// Merkle root over the partition digests.
    pub root: [u8; 32],
}

impl SnapshotManifest {
    /// Hex form of [`Self::root`].
    #[must_use]
    pub fn root_hex(&self) -> String {
        hex::encode(self.root)
    }
}

const fn status_tag(s: Status) -> u8 {
    match s {
        Status::Vulnerable => 0,
        Status::Infected => 1,
        Status::Infecting => 2,
        Status::Immune => 3,
        Status::Successful => 4,
    }
}

fn hash_node(h: &mut Hasher, n: &Node) {
    h.update(&n.address.to_le_bytes());
    h.update(&[status_tag(n.status)]);
    h.update(&n.propagation_delay.to_le_bytes());
    match n.source {
        Some(src) => {
            h.update(&[1]);
            h.update(&src.to_le_bytes());
        }
        None => {
            h.update(&[0]);
        }
    }
    h.update(&(n.hit_list.len() as u64).to_le_bytes());
    for a in &n.hit_list {
        h.update(&a.to_le_bytes());
    }
}

/// Digest of one snapshot.
#[must_use]
pub fn digest_snapshot(snap: &Snapshot) -> PartitionDigest {
    let mut h = Hasher::new();
    h.update(&snap.partition().to_le_bytes());
    for n in snap.nodes() {
        hash_node(&mut h, n);
    }
    PartitionDigest {
        partition: snap.partition(),
        nodes: snap.len() as u64,
        digest: *h.finalize().as_bytes(),
    }
}

#[inline]
fn merkle_parent(a: [u8; 32], b: [u8; 32]) -> [u8; 32] {
    let mut h = Hasher::new();
    h.update(&a);
    h.update(&b);
    *h.finalize().as_bytes()
}

fn merkle_root(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return [0u8; 32];
    }
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity(leaves.len().div_ceil(2));
        for pair in leaves.chunks(2) {
            match *pair {
                [a, b] => next.push(merkle_parent(a, b)),
                // Promote odd leaf (left-balanced).
                [a] => next.push(a),
                _ => {}
            }
        }
        leaves = next;
    }
    leaves[0]
}

/// Build a manifest from already-loaded snapshots.
#[must_use]
pub fn manifest_for(round: u32, layout: &Layout, snaps: &[Snapshot]) -> SnapshotManifest {
    let partitions: Vec<PartitionDigest> = snaps.iter().map(digest_snapshot).collect();
    let counts = snaps
        .iter()
        .map(Snapshot::counts)
        .fold(StatusCounts::default(), StatusCounts::merged);
    let root = merkle_root(partitions.iter().map(|d| d.digest).collect());
    SnapshotManifest {
        version: MANIFEST_VERSION,
        round,
        layout: layout.clone(),
        partitions,
        counts,
        root,
    }
}

/// Load every partition of `round` and commit to it.
pub fn commit_round<S: SnapshotStore + ?Sized>(store: &S, round: u32) -> Result<SnapshotManifest> {
    let snaps = store
        .load_round(round)
        .with_context(|| format!("load round {round}"))?;
    Ok(manifest_for(round, store.layout(), &snaps))
}

/// Recompute `round` from `store` and compare it with `manifest`.
///
/// # Errors
/// Names the first partition whose digest or count differs, or the root if
/// only the partition set differs.
pub fn verify_round<S: SnapshotStore + ?Sized>(
    store: &S,
    round: u32,
    manifest: &SnapshotManifest,
) -> Result<()> {
    if manifest.version != MANIFEST_VERSION {
        bail!(
            "unsupported manifest version {} (expected {MANIFEST_VERSION})",
            manifest.version
        );
    }
    if manifest.round != round {
        bail!("manifest is for round {}, asked to verify round {round}", manifest.round);
    }
    manifest.layout.ensure_matches(store.layout())?;

    let recomputed = commit_round(store, round)?;
    for (want, got) in manifest.partitions.iter().zip(&recomputed.partitions) {
        if want.nodes != got.nodes {
            bail!(
                "partition {} node count mismatch: manifest={}, recomputed={}",
                want.partition,
                want.nodes,
                got.nodes
            );
        }
        if want.digest != got.digest {
            bail!(
                "partition {} digest mismatch: manifest={}, recomputed={}",
                want.partition,
                hex::encode(want.digest),
                hex::encode(got.digest)
            );
        }
    }
    if recomputed.root != manifest.root {
        bail!(
            "root mismatch: manifest={}, recomputed={}",
            manifest.root_hex(),
            recomputed.root_hex()
        );
    }
    Ok(())
}

/* -------------------- Manifest IO (JSON/CBOR) -------------------- */

/// Read a manifest; `.cbor` is CBOR, anything else JSON.
pub fn read_manifest<P: AsRef<Path>>(path: P) -> Result<SnapshotManifest> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut rdr = BufReader::new(f);
    if is_cbor(path) {
        ciborium::de::from_reader(&mut rdr).with_context(|| "deserialize CBOR manifest")
    } else {
        serde_json::from_reader(rdr).with_context(|| "deserialize JSON manifest")
    }
}

/// Write a manifest; `.cbor` is CBOR, anything else pretty JSON.
pub fn write_manifest<P: AsRef<Path>>(path: P, m: &SnapshotManifest) -> Result<()> {
    let path = path.as_ref();
    schimmy_core::io::ensure_parent_dir(path)?;
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w = BufWriter::new(f);
    if is_cbor(path) {
        ciborium::ser::into_writer(m, &mut w).with_context(|| "serialize CBOR manifest")?;
    } else {
        serde_json::to_writer_pretty(&mut w, m).with_context(|| "serialize JSON manifest")?;
    }
    w.flush().with_context(|| "flush manifest writer")?;
    Ok(())
}

fn is_cbor(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("cbor"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use schimmy_core::Partitioner;

    fn filled_store() -> MemoryStore {
        let parts = Partitioner::new(16, 3).unwrap();
        let s = MemoryStore::new(Layout::new("test", &parts));
        let nodes = [
            Node::new(1, Status::Infected).with_hit_list(vec![9]),
            Node::new(7, Status::Vulnerable),
            Node::new(12, Status::Immune).with_source(1),
        ];
        for id in parts.ids() {
            let mine = nodes.iter().filter(|n| parts.partition(n.address) == id).cloned();
            s.publish(0, &Snapshot::from_nodes(&parts, id, mine).unwrap())
                .unwrap();
        }
        s
    }

    #[test]
    fn merkle_root_empty_and_odd() {
        assert_eq!(merkle_root(vec![]), [0u8; 32]);
        let (a, b, c) = ([1u8; 32], [2u8; 32], [3u8; 32]);
        assert_eq!(merkle_root(vec![a, b, c]), merkle_parent(merkle_parent(a, b), c));
    }

    #[test]
    fn commit_then_verify() {
        let s = filled_store();
        let m = commit_round(&s, 0).unwrap();
        assert_eq!(m.partitions.len(), 3);
        assert_eq!(m.counts.total(), 3);
        verify_round(&s, 0, &m).unwrap();
    }

    #[test]
    fn tampered_partition_is_named() {
        let s = filled_store();
        let m = commit_round(&s, 0).unwrap();

        let mut snap = s.load(0, 0).unwrap();
        snap.get_mut(1).unwrap().propagation_delay = 5;
        s.publish(0, &snap).unwrap();

        let err = verify_round(&s, 0, &m).unwrap_err();
        assert!(err.to_string().contains("partition 0 digest mismatch"));
    }

    #[test]
    fn source_presence_changes_the_digest() {
        let parts = Partitioner::new(16, 1).unwrap();
        let a = Snapshot::from_nodes(&parts, 0, [Node::new(0, Status::Infected)]).unwrap();
        let b = Snapshot::from_nodes(&parts, 0, [Node::new(0, Status::Infected).with_source(0)])
            .unwrap();
        assert_ne!(digest_snapshot(&a).digest, digest_snapshot(&b).digest);
    }

    #[test]
    fn manifest_file_roundtrip() {
        let s = filled_store();
        let m = commit_round(&s, 0).unwrap();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        for ext in ["json", "cbor"] {
            let p = std::env::temp_dir().join(format!("schimmy_manifest_{nanos}.{ext}"));
            write_manifest(&p, &m).unwrap();
            assert_eq!(read_manifest(&p).unwrap(), m);
            let _ = std::fs::remove_file(p);
        }
    }
}
