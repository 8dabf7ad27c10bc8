//! One partition's resident state at a round boundary.

use schimmy_core::{Address, Error, Node, PartitionId, Partitioner, Result, Status};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Address-ordered resident records owned by one partition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    partition: PartitionId,
    nodes: BTreeMap<Address, Node>,
}

impl Snapshot {
    /// Empty snapshot for `partition`.
    #[must_use]
    pub const fn new(partition: PartitionId) -> Self {
        Self {
            partition,
            nodes: BTreeMap::new(),
        }
    }

    /// Collect `nodes` into a snapshot, checking ownership and uniqueness.
    ///
    /// # Errors
    /// - [`Error::PartitionMismatch`] for a node that `partitioner` assigns
    ///   elsewhere (or [`Error::Deserialization`] if it is out of range).
    /// - [`Error::DuplicateAddress`] when two nodes share an address.
    pub fn from_nodes<I>(partitioner: &Partitioner, partition: PartitionId, nodes: I) -> Result<Self>
    where
        I: IntoIterator<Item = Node>,
    {
        let mut snap = Self::new(partition);
        for n in nodes {
            snap.insert(partitioner, n)?;
        }
        Ok(snap)
    }

    /// Insert one node after the same checks as [`Self::from_nodes`].
    pub fn insert(&mut self, partitioner: &Partitioner, node: Node) -> Result<()> {
        partitioner.check_owner(node.address, self.partition)?;
        if self.nodes.contains_key(&node.address) {
            return Err(Error::DuplicateAddress(node.address));
        }
        self.nodes.insert(node.address, node);
        Ok(())
    }

    /// Owning partition.
    #[must_use]
    pub const fn partition(&self) -> PartitionId {
        self.partition
    }

    /// Resident entry for `address`.
    #[must_use]
    pub fn get(&self, address: Address) -> Option<&Node> {
        self.nodes.get(&address)
    }

    /// Mutable resident entry for `address`.
    pub fn get_mut(&mut self, address: Address) -> Option<&mut Node> {
        self.nodes.get_mut(&address)
    }

    /// Remove and return the entry for `address`.
    pub fn remove(&mut self, address: Address) -> Option<Node> {
        self.nodes.remove(&address)
    }

    /// Number of resident nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// `true` if nothing is resident.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in address order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.values()
    }

    /// Consume into nodes in address order.
    pub fn into_nodes(self) -> impl Iterator<Item = Node> {
        self.nodes.into_values()
    }

    /// Tally of resident statuses.
    #[must_use]
    pub fn counts(&self) -> StatusCounts {
        self.nodes().collect()
    }
}

/// Number of records per status.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusCounts {
    /// `VULNERABLE` records.
    pub vulnerable: u64,
    /// `INFECTED` records.
    pub infected: u64,
    /// `INFECTING` records.
    pub infecting: u64,
    /// `IMMUNE` records.
    pub immune: u64,
    /// `SUCCESSFUL` records.
    pub successful: u64,
}

impl StatusCounts {
    /// Count one record.
    pub fn add(&mut self, status: Status) {
        match status {
            Status::Vulnerable => self.vulnerable += 1,
            Status::Infected => self.infected += 1,
            Status::Infecting => self.infecting += 1,
            Status::Immune => self.immune += 1,
            Status::Successful => self.successful += 1,
        }
    }

    /// Count for one status.
    #[must_use]
    pub const fn get(&self, status: Status) -> u64 {
        match status {
            Status::Vulnerable => self.vulnerable,
            Status::Infected => self.infected,
            Status::Infecting => self.infecting,
            Status::Immune => self.immune,
            Status::Successful => self.successful,
        }
    }

    /// Sum over all statuses.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.vulnerable + self.infected + self.infecting + self.immune + self.successful
    }

    /// Field-wise sum.
    #[must_use]
    pub const fn merged(self, other: Self) -> Self {
        Self {
            vulnerable: self.vulnerable + other.vulnerable,
            infected: self.infected + other.infected,
            infecting: self.infecting + other.infecting,
            immune: self.immune + other.immune,
            successful: self.successful + other.successful,
        }
    }
}

impl<'a> FromIterator<&'a Node> for StatusCounts {
    fn from_iter<T: IntoIterator<Item = &'a Node>>(iter: T) -> Self {
        let mut c = Self::default();
        for n in iter {
            c.add(n.status);
        }
        c
    }
}

impl fmt::Display for StatusCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for st in Status::ALL {
            let n = self.get(st);
            if n == 0 {
                continue;
            }
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{st}={n}")?;
            first = false;
        }
        if first {
            f.write_str("empty")?;
        }
        Ok(())
    }
}
