//! Canonical node record shared across the Schimmy workspace.
//!
//! `Node` is both the resident snapshot entry and the delta that travels
//! between partitions. Serialized forms stay conservative (serde, named
//! fields) so JSON, JSON Lines and CBOR all carry the same five fields.

use crate::error::{Error, Result};
use crate::status::Status;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer address inside `[0, address_space)`.
pub type Address = u64;

/// Partition index inside `[0, partitions)`.
pub type PartitionId = u32;

/// A node's full state at a round boundary, or a proposed change to it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Node {
    /// Primary key; also the partitioning key.
    pub address: Address,
    /// Current (or claimed) status.
    pub status: Status,
    /// Addresses this node intends to attack, consumed from the back.
    #[serde(default)]
    pub hit_list: Vec<Address>,
    /// Rounds left before the node may scan again.
    #[serde(default)]
    pub propagation_delay: u32,
    /// Address that caused the current status; `None` for nodes that were
    /// never touched by another node.
    #[serde(default)]
    pub source: Option<Address>,
}

impl Node {
    /// A node with an empty hit list, no delay and no source.
    #[inline]
    #[must_use]
    pub const fn new(address: Address, status: Status) -> Self {
        Self {
            address,
            status,
            hit_list: Vec::new(),
            propagation_delay: 0,
            source: None,
        }
    }

    /// Builder-style hit list.
    #[must_use]
    pub fn with_hit_list(mut self, hit_list: Vec<Address>) -> Self {
        self.hit_list = hit_list;
        self
    }

    /// Builder-style delay.
    #[must_use]
    pub fn with_delay(mut self, propagation_delay: u32) -> Self {
        self.propagation_delay = propagation_delay;
        self
    }

    /// Builder-style source.
    #[must_use]
    pub fn with_source(mut self, source: Address) -> Self {
        self.source = Some(source);
        self
    }

    /// Structural validation against the job's address space.
    ///
    /// `position` is echoed into the error so a corrupt stream can be located.
    pub fn validate(&self, address_space: u64, position: Option<usize>) -> Result<()> {
        if self.address >= address_space {
            return Err(Error::malformed(
                position,
                format!(
                    "address {} outside address space {address_space}",
                    self.address
                ),
            ));
        }
        if let Some(src) = self.source.filter(|&s| s >= address_space) {
            return Err(Error::malformed(
                position,
                format!(
                    "source {src} of node {} outside address space {address_space}",
                    self.address
                ),
            ));
        }
        if let Some(bad) = self.hit_list.iter().find(|&&a| a >= address_space) {
            return Err(Error::malformed(
                position,
                format!(
                    "hit-list entry {bad} of node {} outside address space {address_space}",
                    self.address
                ),
            ));
        }
        Ok(())
    }

    /// Split into the key/value wire framing.
    #[must_use]
    pub fn into_wire(self) -> WireRecord {
        WireRecord {
            key: self.address,
            value: WireValue {
                status: self.status,
                hit_list: self.hit_list,
                propagation_delay: self.propagation_delay,
                source: self.source,
            },
        }
    }

    /// Reassemble from the key/value wire framing.
    #[must_use]
    pub fn from_wire(rec: WireRecord) -> Self {
        Self {
            address: rec.key,
            status: rec.value.status,
            hit_list: rec.value.hit_list,
            propagation_delay: rec.value.propagation_delay,
            source: rec.value.source,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.address, self.status)?;
        if let Some(src) = self.source {
            write!(f, " src={src}")?;
        }
        write!(
            f,
            " delay={} hits={}",
            self.propagation_delay,
            self.hit_list.len()
        )
    }
}

/// Key/value framing: the key is exactly the address used for partitioning.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireRecord {
    /// Partition/sort key.
    pub key: Address,
    /// Remaining node fields.
    pub value: WireValue,
}

/// Value half of a [`WireRecord`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireValue {
    /// Node status.
    pub status: Status,
    /// Node hit list.
    #[serde(default)]
    pub hit_list: Vec<Address>,
    /// Node delay.
    #[serde(default)]
    pub propagation_delay: u32,
    /// Node source.
    #[serde(default)]
    pub source: Option<Address>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_bounds() {
        let ok = Node::new(5, Status::Infected).with_hit_list(vec![1, 99]);
        ok.validate(100, None).unwrap();

        let bad_addr = Node::new(100, Status::Vulnerable);
        assert!(matches!(
            bad_addr.validate(100, Some(3)),
            Err(Error::Deserialization { position: Some(3), .. })
        ));

        let bad_src = Node::new(1, Status::Infected).with_source(250);
        assert!(bad_src.validate(100, None).is_err());

        let bad_hit = Node::new(1, Status::Infected).with_hit_list(vec![2, 300]);
        let err = bad_hit.validate(256, None).unwrap_err();
        assert!(err.to_string().contains("hit-list entry 300"));
    }

    #[test]
    fn wire_framing_keeps_all_fields() {
        let n = Node::new(42, Status::Infecting)
            .with_hit_list(vec![7, 8, 9])
            .with_delay(3)
            .with_source(5);
        let rec = n.clone().into_wire();
        assert_eq!(rec.key, 42);
        assert_eq!(rec.value.source, Some(5));
        assert_eq!(Node::from_wire(rec), n);
    }

    #[test]
    fn missing_optional_fields_default() {
        let n: Node = serde_json::from_str(r#"{"address":9,"status":"VULNERABLE"}"#).unwrap();
        assert_eq!(n.hit_list, Vec::<Address>::new());
        assert_eq!(n.propagation_delay, 0);
        assert_eq!(n.source, None);
    }

    #[test]
    fn display_is_compact() {
        let n = Node::new(42, Status::Infecting).with_source(5).with_delay(2);
        assert_eq!(n.to_string(), "42[INFECTING] src=5 delay=2 hits=0");
        assert_eq!(Node::new(1, Status::Immune).to_string(), "1[IMMUNE] delay=0 hits=0");
    }
}
