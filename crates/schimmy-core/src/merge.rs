//! Merge stage: resolve every claim about one address into one record.
//!
//! Contributors are the resident snapshot entry (if any) followed by the
//! deltas routed to the address this round. The status is a fold of
//! [`compare`](crate::status::compare), so it depends only on the multiset of
//! contributors. The remaining fields are resolved as follows:
//!
//! - **hit list**: the longest contributor list (strictly longer wins, so the
//!   first of equally long lists is kept), halved if any contributor is
//!   `Successful`. The other half already went to the node that was infected.
//! - **delay**: the largest contributor delay, raised to the configured default
//!   if any contributor is `Successful`.
//! - **source**: the largest contributor source.
//!
//! A merge that turns a node `Infected` for the first time because an attack
//! was in flight also produces a `Successful` back-link addressed to the
//! attacker.

use crate::config::PropagationConfig;
use crate::error::{Error, Result};
use crate::status::{self, Status};
use crate::types::{Address, Node};

/// Everything a merge can produce for one address.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Merged {
    /// Entry for the next round's snapshot (stable outcomes only).
    pub node: Option<Node>,
    /// `Successful` notice for the attacker of a fresh infection.
    pub backlink: Option<Node>,
    /// `Infecting` contributors, when volatile emission is on.
    pub volatile: Vec<Node>,
}

impl Merged {
    /// `true` if this merge turned its address `Infected` for the first time.
    #[inline]
    #[must_use]
    pub const fn is_new_infection(&self) -> bool {
        self.backlink.is_some()
    }
}

/// `true` iff `result` is `Infected`, no contributor already was, and an
/// attack was in flight.
#[must_use]
pub fn is_new_infection(result: Status, statuses: &[Status]) -> bool {
    result == Status::Infected
        && statuses.iter().all(|&s| s != Status::Infected)
        && statuses.iter().any(|&s| s == Status::Infecting)
}

/// Merge the claims about `address`.
///
/// `resident` is this partition's snapshot entry; `deltas` are the records
/// routed here this round. Any contributor whose address is not `address` is
/// a routing bug and fails the task.
///
/// # Errors
/// [`Error::Misrouted`] if a contributor carries another address.
pub fn merge(
    address: Address,
    resident: Option<Node>,
    deltas: Vec<Node>,
    cfg: &PropagationConfig,
) -> Result<Merged> {
    let contributors: Vec<Node> = resident.into_iter().chain(deltas).collect();

    if let Some(stray) = contributors.iter().find(|n| n.address != address) {
        return Err(Error::Misrouted {
            key: address,
            found: stray.address,
        });
    }

    let statuses: Vec<Status> = contributors.iter().map(|n| n.status).collect();
    let Some(result) = status::fold(statuses.iter().copied()) else {
        return Ok(Merged::default());
    };

    let mut out = Merged::default();

    if result.is_stable() {
        let node = Node {
            address,
            status: result,
            hit_list: resolve_hit_list(&statuses, &contributors),
            propagation_delay: resolve_delay(&statuses, &contributors, cfg.propagation_delay),
            source: contributors.iter().filter_map(|n| n.source).max(),
        };

        if is_new_infection(result, &statuses) {
            if let Some(attacker) = node.source {
                out.backlink = Some(Node::new(attacker, Status::Successful).with_source(address));
            }
        }
        out.node = Some(node);
    }

    if cfg.emit_volatile {
        out.volatile = contributors
            .into_iter()
            .filter(|n| n.status == Status::Infecting)
            .collect();
    }

    Ok(out)
}

fn resolve_hit_list(statuses: &[Status], nodes: &[Node]) -> Vec<Address> {
    let mut best: &[Address] = &[];
    for n in nodes {
        if n.hit_list.len() > best.len() {
            best = &n.hit_list;
        }
    }
    if statuses.contains(&Status::Successful) {
        best[..best.len() / 2].to_vec()
    } else {
        best.to_vec()
    }
}

fn resolve_delay(statuses: &[Status], nodes: &[Node], default_delay: u32) -> u32 {
    let existing = nodes.iter().map(|n| n.propagation_delay).max().unwrap_or(0);
    if statuses.contains(&Status::Successful) {
        existing.max(default_delay)
    } else {
        existing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> PropagationConfig {
        PropagationConfig::default().with_propagation_delay(4)
    }

    #[test]
    fn nothing_in_nothing_out() {
        let m = merge(3, None, vec![], &cfg()).unwrap();
        assert_eq!(m, Merged::default());
    }

    #[test]
    fn stable_resident_merges_to_itself() {
        for st in [Status::Vulnerable, Status::Immune, Status::Infected] {
            let n = Node::new(9, st).with_hit_list(vec![1, 2, 3]).with_delay(1);
            let m = merge(9, Some(n.clone()), vec![], &cfg()).unwrap();
            assert_eq!(m.node, Some(n));
            assert!(m.backlink.is_none());
        }
    }

    #[test]
    fn attack_on_vulnerable_host_lands() {
        let host = Node::new(42, Status::Vulnerable);
        let attack = Node::new(42, Status::Infecting)
            .with_source(5)
            .with_delay(4)
            .with_hit_list(vec![70, 71]);
        let m = merge(42, Some(host), vec![attack], &cfg()).unwrap();

        let node = m.node.clone().unwrap();
        assert_eq!(node.status, Status::Infected);
        assert_eq!(node.source, Some(5));
        assert_eq!(node.propagation_delay, 4);
        assert_eq!(node.hit_list, vec![70, 71]);

        let back = m.backlink.unwrap();
        assert_eq!(back.address, 5);
        assert_eq!(back.source, Some(42));
        assert_eq!(back.status, Status::Successful);
    }

    #[test]
    fn reinfection_is_not_new() {
        let host = Node::new(42, Status::Infected).with_source(1);
        let attack = Node::new(42, Status::Infecting).with_source(5);
        let m = merge(42, Some(host), vec![attack], &cfg()).unwrap();
        assert_eq!(m.node.unwrap().status, Status::Infected);
        assert!(m.backlink.is_none());
    }

    #[test]
    fn immune_host_resists() {
        let host = Node::new(42, Status::Immune);
        let attack = Node::new(42, Status::Infecting).with_source(5);
        let m = merge(42, Some(host), vec![attack], &cfg()).unwrap();
        let node = m.node.unwrap();
        assert_eq!(node.status, Status::Immune);
        assert!(m.backlink.is_none());
    }

    #[test]
    fn attack_on_empty_address_is_dropped_unless_volatile() {
        let attack = Node::new(42, Status::Infecting).with_source(5);
        let m = merge(42, None, vec![attack.clone()], &cfg()).unwrap();
        assert_eq!(m, Merged::default());

        let volatile = cfg().with_emit_volatile(true);
        let m = merge(42, None, vec![attack.clone()], &volatile).unwrap();
        assert!(m.node.is_none());
        assert_eq!(m.volatile, vec![attack]);
    }

    #[test]
    fn successful_halves_hit_list_and_bumps_delay() {
        let attacker = Node::new(5, Status::Infected).with_hit_list(vec![1, 2, 3, 4]);
        let back = Node::new(5, Status::Successful).with_source(42);
        let m = merge(5, Some(attacker), vec![back], &cfg()).unwrap();
        let node = m.node.unwrap();
        assert_eq!(node.hit_list, vec![1, 2]);
        assert_eq!(node.propagation_delay, 4);
        assert_eq!(node.source, Some(42));
        assert!(m.backlink.is_none());
    }

    #[test]
    fn successful_alone_is_transient() {
        let back = Node::new(5, Status::Successful)
            .with_source(42)
            .with_hit_list(vec![1, 2, 3, 4]);
        let m = merge(5, None, vec![back], &cfg()).unwrap();
        assert!(m.node.is_none());
    }

    #[test]
    fn longest_hit_list_wins_first_on_tie() {
        let host = Node::new(8, Status::Vulnerable).with_hit_list(vec![1, 2]);
        let a = Node::new(8, Status::Infecting).with_source(3).with_hit_list(vec![9, 9]);
        let b = Node::new(8, Status::Infecting).with_source(4).with_hit_list(vec![5, 6, 7]);
        let m = merge(8, Some(host.clone()), vec![a.clone()], &cfg()).unwrap();
        assert_eq!(m.node.unwrap().hit_list, vec![1, 2]);
        let m = merge(8, Some(host), vec![a, b], &cfg()).unwrap();
        assert_eq!(m.node.as_ref().unwrap().hit_list, vec![5, 6, 7]);
        // the larger attacker address is credited
        assert_eq!(m.backlink.unwrap().address, 4);
    }

    #[test]
    fn stray_address_is_a_routing_bug() {
        let stray = Node::new(43, Status::Infecting);
        let err = merge(42, None, vec![stray], &cfg()).unwrap_err();
        assert!(matches!(err, Error::Misrouted { key: 42, found: 43 }));
    }

    #[test]
    fn new_infection_predicate() {
        use Status::*;
        assert!(is_new_infection(Infected, &[Vulnerable, Infecting]));
        assert!(!is_new_infection(Infected, &[Infected, Infecting]));
        assert!(!is_new_infection(Infected, &[Vulnerable, Immune]));
        assert!(!is_new_infection(Immune, &[Immune, Infecting]));
    }
}
