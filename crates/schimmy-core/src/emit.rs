//! Emission stage: one resident or in-flight record in, at most one delta out.
//!
//! Emission never mutates its input. A dormant infected node emits nothing;
//! its countdown is handed back as [`Emission::Dormant`] so the owning
//! partition can carry the decremented value in its own snapshot copy. The
//! node itself is never re-sent: the resident snapshot already has it.

use crate::config::PropagationConfig;
use crate::network::Network;
use crate::status::Status;
use crate::types::{Address, Node};

/// What a single record contributes to the current round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Emission {
    /// Nothing leaves the node.
    Quiet,
    /// Still dormant; the resident entry continues with this many rounds left.
    Dormant(u32),
    /// A record routed to `delta.address` for this round's merge.
    Delta(Node),
}

impl Emission {
    /// The routed record, if any.
    #[must_use]
    pub fn into_delta(self) -> Option<Node> {
        match self {
            Self::Delta(n) => Some(n),
            Self::Quiet | Self::Dormant(_) => None,
        }
    }
}

/// Decide what `node` does this round.
///
/// - `Infected` with no delay attacks exactly one target.
/// - `Infected` with a delay counts down.
/// - `Successful` passes through so it can meet its attacker at merge time.
/// - Everything else is quiet.
#[must_use]
pub fn emit<N: Network + ?Sized>(node: &Node, cfg: &PropagationConfig, network: &N) -> Emission {
    match node.status {
        Status::Infected if node.propagation_delay == 0 => {
            Emission::Delta(attack(node, cfg.propagation_delay, network))
        }
        Status::Infected => Emission::Dormant(node.propagation_delay - 1),
        Status::Successful => Emission::Delta(node.clone()),
        Status::Vulnerable | Status::Immune | Status::Infecting => Emission::Quiet,
    }
}

/// Build the `Infecting` delta for an attacker whose delay has expired.
///
/// The target is the back of the hit list, or a random address if the list is
/// exhausted. The target inherits the second half of whatever remains, split
/// at `len / 2`.
fn attack<N: Network + ?Sized>(node: &Node, delay: u32, network: &N) -> Node {
    let mut remaining = node.hit_list.clone();
    let target: Address = match remaining.pop() {
        Some(a) => a,
        None => {
            network
                .random_node(node.address, Status::Infecting, delay)
                .address
        }
    };
    let handoff = remaining.split_off(remaining.len() / 2);

    Node {
        address: target,
        status: Status::Infecting,
        hit_list: handoff,
        propagation_delay: delay,
        source: Some(node.address),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::FixedTarget;

    const NET: FixedTarget = FixedTarget {
        address_space: 100,
        target: 42,
    };

    fn cfg(delay: u32) -> PropagationConfig {
        PropagationConfig::default().with_propagation_delay(delay)
    }

    #[test]
    fn empty_hit_list_asks_the_network() {
        let a = Node::new(5, Status::Infected);
        let d = emit(&a, &cfg(3), &NET).into_delta().unwrap();
        assert_eq!(d.address, 42);
        assert_eq!(d.status, Status::Infecting);
        assert_eq!(d.source, Some(5));
        assert_eq!(d.propagation_delay, 3);
        assert!(d.hit_list.is_empty());
    }

    #[test]
    fn hit_list_pops_back_and_hands_off_second_half() {
        let a = Node::new(5, Status::Infected).with_hit_list(vec![10, 11, 12, 13, 14, 15]);
        let d = emit(&a, &cfg(0), &NET).into_delta().unwrap();
        assert_eq!(d.address, 15);
        // remaining [10..=14] (len 5) splits at 2 -> [12, 13, 14]
        assert_eq!(d.hit_list, vec![12, 13, 14]);
        // input untouched
        assert_eq!(a.hit_list.len(), 6);
    }

    #[test]
    fn single_entry_hit_list() {
        let a = Node::new(5, Status::Infected).with_hit_list(vec![77]);
        let d = emit(&a, &cfg(0), &NET).into_delta().unwrap();
        assert_eq!(d.address, 77);
        assert!(d.hit_list.is_empty());
    }

    #[test]
    fn delayed_node_counts_down_silently() {
        let a = Node::new(5, Status::Infected).with_delay(2);
        assert_eq!(emit(&a, &cfg(0), &NET), Emission::Dormant(1));
    }

    #[test]
    fn successful_passes_through() {
        let s = Node::new(5, Status::Successful).with_source(42);
        assert_eq!(emit(&s, &cfg(0), &NET), Emission::Delta(s.clone()));
    }

    #[test]
    fn other_statuses_are_quiet() {
        for st in [Status::Vulnerable, Status::Immune, Status::Infecting] {
            assert_eq!(emit(&Node::new(1, st), &cfg(0), &NET), Emission::Quiet);
        }
    }
}
