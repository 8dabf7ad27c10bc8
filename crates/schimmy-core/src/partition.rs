//! Range partitioning of the address space.
//!
//! Partition `p` owns the contiguous addresses `a` with
//! `floor(a * P / address_space) == p`. The same `(address_space, P)` pair
//! must be used for every round of a job: resident snapshots are only valid
//! under the layout they were written with.
//!
//! The product is computed in `u128`, so the assignment is exact for the whole
//! `u64` address range (no float rounding at partition boundaries).

use crate::error::{Error, Result};
use crate::types::{Address, PartitionId};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Maps addresses to partitions for one job.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Partitioner {
    address_space: u64,
    partitions: PartitionId,
}

impl Partitioner {
    /// Validate and build a partitioner.
    ///
    /// # Errors
    /// [`Error::Configuration`] if either argument is zero or there are more
    /// partitions than addresses (some partitions would own nothing).
    pub fn new(address_space: u64, partitions: PartitionId) -> Result<Self> {
        if address_space == 0 {
            return Err(Error::config("address space must be non-empty"));
        }
        if partitions == 0 {
            return Err(Error::config("--partitions must be at least 1"));
        }
        if u64::from(partitions) > address_space {
            return Err(Error::config(format!(
                "--partitions {partitions} exceeds address space {address_space}"
            )));
        }
        Ok(Self {
            address_space,
            partitions,
        })
    }

    /// Size of the address space.
    #[inline]
    #[must_use]
    pub const fn address_space(&self) -> u64 {
        self.address_space
    }

    /// Number of partitions `P`.
    #[inline]
    #[must_use]
    pub const fn partitions(&self) -> PartitionId {
        self.partitions
    }

    /// Partition owning `address`.
    ///
    /// # Panics
    /// Panics if `address >= address_space`. Callers route only validated
    /// records; use [`Self::try_partition`] at trust boundaries.
    #[inline]
    #[must_use]
    pub fn partition(&self, address: Address) -> PartitionId {
        assert!(
            address < self.address_space,
            "partition: address {address} outside address space {}",
            self.address_space
        );
        self.assign(address)
    }

    /// Checked variant of [`Self::partition`].
    ///
    /// # Errors
    /// [`Error::Deserialization`] if the address is out of range.
    #[inline]
    pub fn try_partition(&self, address: Address) -> Result<PartitionId> {
        if address >= self.address_space {
            return Err(Error::malformed(
                None,
                format!(
                    "address {address} outside address space {}",
                    self.address_space
                ),
            ));
        }
        Ok(self.assign(address))
    }

    /// Fail with [`Error::PartitionMismatch`] unless `address` belongs to `found`.
    pub fn check_owner(&self, address: Address, found: PartitionId) -> Result<()> {
        let expected = self.try_partition(address)?;
        if expected == found {
            Ok(())
        } else {
            Err(Error::PartitionMismatch {
                address,
                expected,
                found,
            })
        }
    }

    /// Half-open address range owned by `partition`.
    #[must_use]
    pub fn range(&self, partition: PartitionId) -> Range<Address> {
        self.lower_bound(partition)..self.lower_bound(partition + 1)
    }

    /// Iterator over every partition id.
    pub fn ids(&self) -> impl Iterator<Item = PartitionId> {
        0..self.partitions
    }

    #[inline]
    fn assign(&self, address: Address) -> PartitionId {
        let p = u128::from(address) * u128::from(self.partitions) / u128::from(self.address_space);
        // address < address_space guarantees p < P; the clamp keeps the
        // contract explicit.
        let p = p.min(u128::from(self.partitions - 1));
        PartitionId::try_from(p).unwrap_or(self.partitions - 1)
    }

    /// Smallest address `a` with `assign(a) >= p`, i.e. `ceil(p * S / P)`.
    fn lower_bound(&self, p: PartitionId) -> Address {
        if p >= self.partitions {
            return self.address_space;
        }
        let s = u128::from(self.address_space);
        let n = u128::from(self.partitions);
        let lb = (u128::from(p) * s + n - 1) / n;
        Address::try_from(lb).unwrap_or(self.address_space)
    }
}
