//! On-disk snapshot store.
//!
//! ```text
//! <root>/layout.json
//! <root>/round-00000/part-00000.jsonl
//! <root>/round-00000/part-00001.jsonl
//! <root>/round-00001/inflight-00000.jsonl
//! <root>/round-00001/manifest.json
//! ```
//!
//! Partition files are JSON Lines sorted by address. Each file is written to a
//! sibling `.tmp` path and renamed into place, so a crashed worker never leaves
//! a half-written snapshot under the final name.

use crate::layout::Layout;
use crate::snapshot::Snapshot;
use crate::store::SnapshotStore;
use anyhow::{Context, Result};
use schimmy_core::io::Validated;
use schimmy_core::io_jsonl::{stream_nodes_jsonl, JsonlWriter};
use schimmy_core::{Node, PartitionId, Partitioner};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const LAYOUT_FILE: &str = "layout.json";

/// Snapshot store rooted at a directory.
#[derive(Clone, Debug)]
pub struct DirStore {
    root: PathBuf,
    layout: Layout,
    partitioner: Partitioner,
}

impl DirStore {
    /// Open `root` for `layout`, creating it if needed.
    ///
    /// An existing store must have been built with the same layout.
    pub fn create(root: impl AsRef<Path>, layout: Layout) -> Result<Self> {
        let root = root.as_ref().to_owned();
        fs::create_dir_all(&root)
            .with_context(|| format!("create store directory {}", root.display()))?;
        let layout_path = root.join(LAYOUT_FILE);
        if layout_path.exists() {
            let on_disk = read_layout(&layout_path)?;
            on_disk.ensure_matches(&layout)?;
        } else {
            let json = serde_json::to_vec_pretty(&layout)?;
            fs::write(&layout_path, json)
                .with_context(|| format!("write {}", layout_path.display()))?;
        }
        let partitioner = layout.partitioner()?;
        Ok(Self {
            root,
            layout,
            partitioner,
        })
    }

    /// Open an existing store, taking its layout from `layout.json`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_owned();
        let layout = read_layout(&root.join(LAYOUT_FILE))?;
        let partitioner = layout.partitioner()?;
        Ok(Self {
            root,
            layout,
            partitioner,
        })
    }

    /// Store root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of one round.
    #[must_use]
    pub fn round_dir(&self, round: u32) -> PathBuf {
        self.root.join(format!("round-{round:05}"))
    }

    /// Resident snapshot file of one partition.
    #[must_use]
    pub fn partition_path(&self, round: u32, partition: PartitionId) -> PathBuf {
        self.round_dir(round)
            .join(format!("part-{partition:05}.jsonl"))
    }

    /// In-flight records file of one partition.
    #[must_use]
    pub fn inflight_path(&self, round: u32, partition: PartitionId) -> PathBuf {
        self.round_dir(round)
            .join(format!("inflight-{partition:05}.jsonl"))
    }

    /// Manifest file of one round.
    #[must_use]
    pub fn manifest_path(&self, round: u32) -> PathBuf {
        self.round_dir(round).join("manifest.json")
    }

    fn read_nodes(&self, path: &Path) -> Result<Vec<Node>> {
        let stream = stream_nodes_jsonl(path)?;
        Validated::new(stream, self.layout.address_space)
            .collect::<schimmy_core::Result<Vec<_>>>()
            .with_context(|| format!("read {}", path.display()))
    }

    fn write_nodes<'a>(path: &Path, nodes: impl Iterator<Item = &'a Node>) -> Result<usize> {
        let tmp = path.with_extension("jsonl.tmp");
        let mut w = JsonlWriter::create(&tmp)?;
        for n in nodes {
            w.write(n)?;
        }
        let count = w.finish()?;
        fs::rename(&tmp, path)
            .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
        Ok(count)
    }
}

impl SnapshotStore for DirStore {
    fn layout(&self) -> &Layout {
        &self.layout
    }

    fn load(&self, round: u32, partition: PartitionId) -> Result<Snapshot> {
        let path = self.partition_path(round, partition);
        let nodes = self.read_nodes(&path)?;
        let snap = Snapshot::from_nodes(&self.partitioner, partition, nodes)
            .with_context(|| format!("load {}", path.display()))?;
        Ok(snap)
    }

    fn publish(&self, round: u32, snapshot: &Snapshot) -> Result<()> {
        let path = self.partition_path(round, snapshot.partition());
        let n = Self::write_nodes(&path, snapshot.nodes())?;
        debug!(round, partition = snapshot.partition(), nodes = n, "published snapshot");
        Ok(())
    }

    fn load_inflight(&self, round: u32, partition: PartitionId) -> Result<Vec<Node>> {
        let path = self.inflight_path(round, partition);
        if !path.exists() {
            return Ok(Vec::new());
        }
        self.read_nodes(&path)
    }

    fn publish_inflight(
        &self,
        round: u32,
        partition: PartitionId,
        records: &[Node],
    ) -> Result<()> {
        let path = self.inflight_path(round, partition);
        if records.is_empty() {
            // Absent and empty read the same; keep the round directory tidy.
            if path.exists() {
                fs::remove_file(&path)
                    .with_context(|| format!("remove {}", path.display()))?;
            }
            return Ok(());
        }
        let n = Self::write_nodes(&path, records.iter())?;
        debug!(round, partition, records = n, "published in-flight records");
        Ok(())
    }

    fn latest_round(&self) -> Result<Option<u32>> {
        let mut best = None;
        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("list {}", self.root.display()))?;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(round) = name
                .to_str()
                .and_then(|s| s.strip_prefix("round-"))
                .and_then(|s| s.parse::<u32>().ok())
            else {
                continue;
            };
            let complete = self
                .partitioner
                .ids()
                .all(|p| self.partition_path(round, p).is_file());
            if complete && best < Some(round) {
                best = Some(round);
            }
        }
        Ok(best)
    }

    fn truncate_after(&self, round: u32) -> Result<()> {
        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("list {}", self.root.display()))?;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let later = name
                .to_str()
                .and_then(|s| s.strip_prefix("round-"))
                .and_then(|s| s.parse::<u32>().ok())
                .is_some_and(|r| r > round);
            if later {
                let path = entry.path();
                fs::remove_dir_all(&path)
                    .with_context(|| format!("remove {}", path.display()))?;
                debug!(dir = %path.display(), "removed stale round");
            }
        }
        Ok(())
    }
}

fn read_layout(path: &Path) -> Result<Layout> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parse {}", path.display()))
}
