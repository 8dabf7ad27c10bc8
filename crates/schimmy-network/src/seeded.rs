//! A reproducible [`Network`] over one of the named address spaces.
//!
//! Every `random_node` call builds a fresh `StdRng` from
//! `(seed, round, avoid_address)`. Nothing is shared between calls, so
//! partitions can emit in parallel and a re-run of any partition task picks
//! exactly the same targets.

use crate::kind::NetworkKind;
use rand::{rngs::StdRng, Rng as _, SeedableRng};
use schimmy_core::{Address, Network, Node, Status};
use serde::{Deserialize, Serialize};

/// Seeded address-space model bound to one round.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeededNetwork {
    kind: NetworkKind,
    seed: u64,
    round: u32,
}

impl SeededNetwork {
    /// A network for `kind`, bound to round 0.
    #[must_use]
    pub const fn new(kind: NetworkKind, seed: u64) -> Self {
        Self {
            kind,
            seed,
            round: 0,
        }
    }

    /// Topology.
    #[must_use]
    pub const fn kind(&self) -> NetworkKind {
        self.kind
    }

    /// Job seed.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Round this instance draws for.
    #[must_use]
    pub const fn round(&self) -> u32 {
        self.round
    }

    fn rng_for(&self, avoid_address: Address) -> StdRng {
        StdRng::seed_from_u64(mix(self.seed, self.round, avoid_address))
    }
}

impl Network for SeededNetwork {
    fn address_space(&self) -> u64 {
        self.kind.address_space()
    }

    fn random_node(&self, avoid_address: Address, status: Status, delay: u32) -> Node {
        let space = self.address_space();
        let target = if space <= 1 {
            0
        } else {
            // Draw from S-1 slots and skip over the attacker.
            let draw = self.rng_for(avoid_address).random_range(0..space - 1);
            if draw >= avoid_address {
                draw + 1
            } else {
                draw
            }
        };
        Node::new(target, status)
            .with_delay(delay)
            .with_source(avoid_address)
    }

    fn for_round(&self, round: u32) -> Self {
        Self { round, ..*self }
    }
}

/// splitmix64 finaliser over the three inputs.
fn mix(seed: u64, round: u32, address: Address) -> u64 {
    let mut z = seed
        ^ u64::from(round).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ address.rotate_left(32).wrapping_mul(0xD1B5_4A32_D192_ED03);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_is_in_range_and_never_the_attacker() {
        let net = SeededNetwork::new(NetworkKind::NetworkGraphable, 7);
        for round in 0..4 {
            let net = net.for_round(round);
            for a in 0..64 {
                let n = net.random_node(a, Status::Infecting, 3);
                assert!(n.address < 64);
                assert_ne!(n.address, a);
                assert_eq!(n.status, Status::Infecting);
                assert_eq!(n.propagation_delay, 3);
                assert_eq!(n.source, Some(a));
                assert!(n.hit_list.is_empty());
            }
        }
    }

    #[test]
    fn replays_are_identical() {
        let a = SeededNetwork::new(NetworkKind::Ipv4, 11).for_round(5);
        let b = SeededNetwork::new(NetworkKind::Ipv4, 11).for_round(5);
        for addr in [0, 1, 99, u64::from(u32::MAX)] {
            assert_eq!(
                a.random_node(addr, Status::Infecting, 0),
                b.random_node(addr, Status::Infecting, 0)
            );
        }
    }

    #[test]
    fn rounds_draw_differently() {
        let net = SeededNetwork::new(NetworkKind::Ipv4, 11);
        let r0: Vec<_> = (0..16)
            .map(|a| net.random_node(a, Status::Infecting, 0).address)
            .collect();
        let r1: Vec<_> = (0..16)
            .map(|a| net.for_round(1).random_node(a, Status::Infecting, 0).address)
            .collect();
        assert_ne!(r0, r1);
    }

    #[test]
    fn for_round_keeps_kind_and_seed() {
        let net = SeededNetwork::new(NetworkKind::Network256, 3).for_round(9);
        assert_eq!(net.round(), 9);
        assert_eq!(net.seed(), 3);
        assert_eq!(net.kind(), NetworkKind::Network256);
        assert_eq!(net.address_space(), 256);
    }
}
