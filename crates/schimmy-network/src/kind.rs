//! Named address-space models.

use schimmy_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Topology selected with `--network`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case", try_from = "String")]
pub enum NetworkKind {
    /// The full IPv4 space, `2^32` addresses.
    Ipv4,
    /// A toy `/24`-sized space of 256 addresses.
    Network256,
    /// 64 addresses; small enough to draw the resulting graph.
    NetworkGraphable,
}

impl NetworkKind {
    /// Every kind, in CLI listing order.
    pub const ALL: [Self; 3] = [Self::Ipv4, Self::Network256, Self::NetworkGraphable];

    /// Number of addresses in this model.
    #[must_use]
    pub const fn address_space(self) -> u64 {
        match self {
            Self::Ipv4 => 1 << 32,
            Self::Network256 => 256,
            Self::NetworkGraphable => 64,
        }
    }

    /// CLI / config name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ipv4 => "ipv4",
            Self::Network256 => "network256",
            Self::NetworkGraphable => "network-graphable",
        }
    }
}

impl fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NetworkKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        if wanted == "ipv6" {
            return Err(Error::config(
                "network \"ipv6\" is not supported: addresses are 64-bit and cannot span a 2^128 space",
            ));
        }
        Self::ALL
            .into_iter()
            .find(|k| k.name() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|k| k.name()).collect();
                Error::config(format!(
                    "unknown network {s:?} (expected one of: {})",
                    known.join(", ")
                ))
            })
    }
}

impl TryFrom<String> for NetworkKind {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}
