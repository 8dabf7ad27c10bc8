//! schimmy-core: node model, status lattice, partitioning, emission and merge.
//!
//! This crate defines the **stable boundary** used across Schimmy crates:
//! - the canonical [`Node`] record and its [`Status`] lattice,
//! - the range [`Partitioner`] that pins every address to one worker for a
//!   whole job,
//! - the pure per-record stages: [`emit`] (attack / count down / pass
//!   through) and [`merge`] (fold every claim about an address into one
//!   authoritative record plus an optional back-link),
//! - the [`Network`] collaborator trait, and
//! - JSON/CBOR I/O (with `.jsonl/.ndjson` streaming helpers).
//!
//! ```
//! use schimmy_core::prelude::*;
//!
//! let cfg = PropagationConfig::default().with_propagation_delay(2);
//! let net = FixedTarget { address_space: 100, target: 42 };
//!
//! let attacker = Node::new(5, Status::Infected);
//! let delta = emit(&attacker, &cfg, &net).into_delta().unwrap();
//! assert_eq!((delta.address, delta.status), (42, Status::Infecting));
//!
//! let host = Node::new(42, Status::Vulnerable);
//! let merged = merge(42, Some(host), vec![delta], &cfg)?;
//! assert_eq!(merged.node.unwrap().status, Status::Infected);
//! assert_eq!(merged.backlink.unwrap().address, 5);
//! # Ok::<(), schimmy_core::Error>(())
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![deny(missing_docs)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]
// Small, explicit allowlist to keep docs readable and APIs ergonomic.
#![allow(
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::doc_markdown
)]

/// Per-job propagation knobs.
pub mod config;
/// Emission stage (per-record delta generation).
pub mod emit;
/// Error taxonomy shared by every crate in the workspace.
pub mod error;
/// JSON/CBOR helpers and auto-detecting read/write APIs.
pub mod io;
/// Streaming JSONL/NDJSON helpers for partition-sized node sets.
pub mod io_jsonl;
/// Merge stage (per-address reduction).
pub mod merge;
/// Address-space collaborator trait.
pub mod network;
/// Address → partition assignment.
pub mod partition;
/// Status enumeration and its dominance order.
pub mod status;
/// Canonical node record and wire framing.
pub mod types;

// ---- Re-exports for workspace compatibility ----
pub use config::*;
pub use emit::*;
pub use error::{Error, Result};
pub use merge::*;
pub use network::*;
pub use partition::*;
pub use status::{compare, Status};
pub use types::*;

/// Commonly-used items for quick imports.
///
/// ```rust
/// use schimmy_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        config::PropagationConfig,
        emit::{emit, Emission},
        merge::{merge, Merged},
        network::{FixedTarget, Network},
        partition::Partitioner,
        status::{compare, Status},
        types::*,
    };
}
