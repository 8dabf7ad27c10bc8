//! Per-job propagation settings consumed by the emission and merge stages.

use serde::{Deserialize, Serialize};

/// Knobs that shape each round. Defaults match the CLI defaults.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PropagationConfig {
    /// Number of rounds to run.
    pub iterations: u32,
    /// Delay given to a newly infected target, and the floor applied to an
    /// attacker that just received a back-link.
    pub propagation_delay: u32,
    /// Surface transient `INFECTING` records from each merge.
    pub emit_volatile: bool,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            iterations: 1,
            propagation_delay: 0,
            emit_volatile: false,
        }
    }
}

impl PropagationConfig {
    /// Builder-style iterations.
    #[must_use]
    pub const fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    /// Builder-style default delay.
    #[must_use]
    pub const fn with_propagation_delay(mut self, propagation_delay: u32) -> Self {
        self.propagation_delay = propagation_delay;
        self
    }

    /// Builder-style volatile switch.
    #[must_use]
    pub const fn with_emit_volatile(mut self, emit_volatile: bool) -> Self {
        self.emit_volatile = emit_volatile;
        self
    }
}
