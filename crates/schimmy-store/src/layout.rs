//! What a store was built for.
//!
//! Resident snapshots are only meaningful under the partitioner that wrote
//! them, so every store records its layout and refuses jobs that disagree.

use schimmy_core::{Error, Partitioner, Result};
use serde::{Deserialize, Serialize};

/// Format version for `layout.json`.
pub const LAYOUT_VERSION: u32 = 1;

/// Partitioning parameters fixed for the lifetime of a store.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Layout {
    /// Schema version.
    pub version: u32,
    /// Network model name (as accepted by `--network`).
    pub network: String,
    /// Size of the address space.
    pub address_space: u64,
    /// Partition count `P`.
    pub partitions: u32,
}

impl Layout {
    /// Layout for a validated partitioner.
    #[must_use]
    pub fn new(network: impl Into<String>, partitioner: &Partitioner) -> Self {
        Self {
            version: LAYOUT_VERSION,
            network: network.into(),
            address_space: partitioner.address_space(),
            partitions: partitioner.partitions(),
        }
    }

    /// Rebuild the partitioner this layout describes.
    pub fn partitioner(&self) -> Result<Partitioner> {
        Partitioner::new(self.address_space, self.partitions)
    }

    /// Fail unless `other` describes the same partitioning.
    ///
    /// # Errors
    /// [`Error::LayoutMismatch`] naming the first differing field.
    pub fn ensure_matches(&self, other: &Self) -> Result<()> {
        if self.version != other.version {
            return Err(Error::LayoutMismatch(format!(
                "layout version {} vs {}",
                self.version, other.version
            )));
        }
        if self.network != other.network {
            return Err(Error::LayoutMismatch(format!(
                "store built for network {:?}, job uses {:?}",
                self.network, other.network
            )));
        }
        if self.address_space != other.address_space || self.partitions != other.partitions {
            return Err(Error::LayoutMismatch(format!(
                "store built for address space {} over {} partitions, job uses {} over {}",
                self.address_space, self.partitions, other.address_space, other.partitions
            )));
        }
        Ok(())
    }
}
