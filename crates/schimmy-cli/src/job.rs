//! Job configuration: an optional TOML file overlaid by command-line flags.
//!
//! ```toml
//! network = "network256"
//! partitions = 4
//! seed = 7
//!
//! [propagation]
//! iterations = 10
//! propagation_delay = 1
//! emit_volatile = false
//! ```

use schimmy_core::{Error, PropagationConfig, Result};
use schimmy_network::kind::NetworkKind;
use serde::Deserialize;
use std::path::Path;

/// Default RNG seed when neither the file nor the flags name one.
pub const DEFAULT_SEED: u64 = 42;

/// Partially specified job; every field may come from the file or a flag.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct JobConfig {
    pub network: Option<NetworkKind>,
    pub partitions: Option<u32>,
    pub seed: Option<u64>,
    pub propagation: PropagationOverrides,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PropagationOverrides {
    pub iterations: Option<u32>,
    pub propagation_delay: Option<u32>,
    pub emit_volatile: Option<bool>,
}

/// Fully resolved job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Job {
    pub network: NetworkKind,
    pub partitions: u32,
    pub seed: u64,
    pub propagation: PropagationConfig,
}

impl JobConfig {
    /// Parse a TOML job file.
    pub fn from_toml_str(src: &str) -> Result<Self> {
        toml::from_str(src).map_err(|e| Error::config(format!("job file: {e}")))
    }

    /// Read and parse a TOML job file.
    pub fn load(path: &Path) -> Result<Self> {
        let src = std::fs::read_to_string(path)
            .map_err(|e| Error::io(format!("read job file {}", path.display()), e))?;
        Self::from_toml_str(&src)
    }

    /// `self` with every field that `over` sets replaced.
    #[must_use]
    pub fn overlay(self, over: Self) -> Self {
        Self {
            network: over.network.or(self.network),
            partitions: over.partitions.or(self.partitions),
            seed: over.seed.or(self.seed),
            propagation: PropagationOverrides {
                iterations: over.propagation.iterations.or(self.propagation.iterations),
                propagation_delay: over
                    .propagation
                    .propagation_delay
                    .or(self.propagation.propagation_delay),
                emit_volatile: over
                    .propagation
                    .emit_volatile
                    .or(self.propagation.emit_volatile),
            },
        }
    }

    /// Check required fields and fill defaults.
    ///
    /// # Errors
    /// [`Error::Configuration`] when `network` or `partitions` is missing, or
    /// `partitions` is zero.
    pub fn resolve(self) -> Result<Job> {
        let network = self
            .network
            .ok_or_else(|| Error::config("--network is required (flag or job file)"))?;
        let partitions = self
            .partitions
            .ok_or_else(|| Error::config("--partitions is required (flag or job file)"))?;
        if partitions == 0 {
            return Err(Error::config("--partitions must be at least 1"));
        }
        let defaults = PropagationConfig::default();
        let p = self.propagation;
        Ok(Job {
            network,
            partitions,
            seed: self.seed.unwrap_or(DEFAULT_SEED),
            propagation: PropagationConfig {
                iterations: p.iterations.unwrap_or(defaults.iterations),
                propagation_delay: p.propagation_delay.unwrap_or(defaults.propagation_delay),
                emit_volatile: p.emit_volatile.unwrap_or(defaults.emit_volatile),
            },
        })
    }
}
