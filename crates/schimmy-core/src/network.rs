//! Address-space collaborator consulted by the emission stage.
//!
//! Implementations must be pure given their inputs: a replayed partition
//! task has to produce the same deltas as the original attempt. Seeded
//! implementations achieve this by deriving their randomness from the round
//! they were bound to with [`Network::for_round`] and the calling address.

use crate::status::Status;
use crate::types::{Address, Node};

/// Topology model: the size of the address space and a target picker.
pub trait Network: Send + Sync {
    /// Number of addressable nodes; valid addresses are `[0, address_space)`.
    fn address_space(&self) -> u64;

    /// Pick a node other than `avoid_address`, carrying `status` and `delay`.
    ///
    /// Only the address is chosen by the network; callers overwrite the
    /// remaining fields as they see fit.
    fn random_node(&self, avoid_address: Address, status: Status, delay: u32) -> Node;

    /// The same network bound to `round`. Stateless models return a copy.
    #[must_use]
    fn for_round(&self, round: u32) -> Self
    where
        Self: Sized + Clone,
    {
        let _ = round;
        self.clone()
    }
}

impl<N: Network + ?Sized> Network for &N {
    fn address_space(&self) -> u64 {
        (**self).address_space()
    }

    fn random_node(&self, avoid_address: Address, status: Status, delay: u32) -> Node {
        (**self).random_node(avoid_address, status, delay)
    }
}

/// Deterministic stub that always answers with the same target.
///
/// Handy for tests and for replaying recorded runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedTarget {
    /// Size of the modelled address space.
    pub address_space: u64,
    /// Address returned by every `random_node` call.
    pub target: Address,
}

impl Network for FixedTarget {
    fn address_space(&self) -> u64 {
        self.address_space
    }

    fn random_node(&self, avoid_address: Address, status: Status, delay: u32) -> Node {
        Node::new(self.target, status)
            .with_delay(delay)
            .with_source(avoid_address)
    }
}
