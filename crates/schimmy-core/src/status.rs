//! Infection status and its dominance order.
//!
//! Merge resolves every claim about an address by folding the claimed
//! statuses through [`compare`]. The fold must not depend on arrival order, so
//! `compare` is the join of a small semilattice:
//!
//! ```text
//!             Infected
//!            /        \
//!       Immune       Vulnerable
//!          |             |
//!      Infecting         |
//!            \          /
//!            Successful
//! ```
//!
//! The table is written out exhaustively below. Declaration order of the enum
//! carries no meaning and must not be used for comparisons.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of node states.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Host present and open to infection.
    Vulnerable,
    /// Host compromised; scans for new targets once its delay reaches zero.
    Infected,
    /// Attack in flight towards this address (transient).
    Infecting,
    /// Host present and resistant to infection.
    Immune,
    /// Back-link telling an attacker that its target fell (transient).
    Successful,
}

impl Status {
    /// Every status, for exhaustive tests and tables.
    pub const ALL: [Self; 5] = [
        Self::Vulnerable,
        Self::Infected,
        Self::Infecting,
        Self::Immune,
        Self::Successful,
    ];

    /// Stable statuses are carried into the next round's snapshot; the rest
    /// only exist to trigger side effects during a single merge.
    #[inline]
    #[must_use]
    pub const fn is_stable(self) -> bool {
        matches!(self, Self::Vulnerable | Self::Infected | Self::Immune)
    }

    /// Join with `other` (see [`compare`]).
    #[inline]
    #[must_use]
    pub const fn join(self, other: Self) -> Self {
        compare(self, other)
    }

    /// Wire/display name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vulnerable => "VULNERABLE",
            Self::Infected => "INFECTED",
            Self::Infecting => "INFECTING",
            Self::Immune => "IMMUNE",
            Self::Successful => "SUCCESSFUL",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Return the dominant status of `a` and `b`.
///
/// Associative, commutative and idempotent. Notable entries:
/// - `Infected` absorbs everything.
/// - `Vulnerable ⊕ Infecting = Infected`: an attack on an open host lands.
/// - `Immune ⊕ Infecting = Immune`: the attack bounces.
/// - `Successful` is the bottom and never changes what it meets.
/// - `Vulnerable ⊕ Immune = Infected` is forced by the lattice. Snapshots hold
///   one record per address and deltas never carry either status, so a merge
///   never sees the pair.
#[must_use]
pub const fn compare(a: Status, b: Status) -> Status {
    use Status::{Immune, Infected, Infecting, Successful, Vulnerable};

    match (a, b) {
        (Infected, _) | (_, Infected) => Infected,

        (Successful, x) | (x, Successful) => x,

        (Vulnerable, Vulnerable) => Vulnerable,
        (Immune, Immune) => Immune,
        (Infecting, Infecting) => Infecting,

        (Vulnerable, Infecting) | (Infecting, Vulnerable) => Infected,
        (Vulnerable, Immune) | (Immune, Vulnerable) => Infected,

        (Immune, Infecting) | (Infecting, Immune) => Immune,
    }
}

/// Fold a sequence of statuses; `None` for an empty input.
#[must_use]
pub fn fold<I>(statuses: I) -> Option<Status>
where
    I: IntoIterator<Item = Status>,
{
    statuses.into_iter().reduce(compare)
}
