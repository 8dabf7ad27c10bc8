//! Round statistics.

use schimmy_core::Node;
use serde::Serialize;
use std::fmt;

/// Counters for one completed round.
#[derive(Clone, Copy, Debug, Default, Serialize, PartialEq, Eq)]
pub struct RoundStats {
    /// Round that ran (its output is snapshot `round + 1`).
    pub round: u32,
    /// Stable nodes in the published snapshot.
    pub nodes: u64,
    /// `INFECTED` nodes in the published snapshot.
    pub infected: u64,
    /// Nodes that turned `INFECTED` this round.
    pub newly_infected: u64,
    /// `INFECTING` deltas emitted.
    pub attempts: u64,
    /// Back-links produced for the next round.
    pub backlinks: u64,
    /// Volatile records surfaced by the merges.
    pub volatile: u64,
}

impl fmt::Display for RoundStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "round {}: nodes={} infected={} (+{}) attempts={} backlinks={} volatile={}",
            self.round,
            self.nodes,
            self.infected,
            self.newly_infected,
            self.attempts,
            self.backlinks,
            self.volatile
        )
    }
}

/// Outcome of [`RoundDriver::run`](crate::RoundDriver::run).
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct RunReport {
    /// Snapshot round the run started from.
    pub start_round: u32,
    /// Snapshot round holding the final state.
    pub final_round: u32,
    /// One entry per round, in order.
    pub rounds: Vec<RoundStats>,
    /// Volatile records of the last round (empty unless enabled).
    #[serde(skip)]
    pub volatile: Vec<Node>,
}

impl RunReport {
    /// Total new infections over the run.
    #[must_use]
    pub fn total_new_infections(&self) -> u64 {
        self.rounds.iter().map(|r| r.newly_infected).sum()
    }

    /// Stats of the last round, if any ran.
    #[must_use]
    pub fn last(&self) -> Option<&RoundStats> {
        self.rounds.last()
    }
}
