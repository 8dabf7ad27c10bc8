//! Round driver for Schimmy propagation.
//!
//! One round is two data-parallel phases over the partitions of a
//! [`SnapshotStore`](schimmy_store::store::SnapshotStore), each closed by a
//! barrier:
//!
//! 1. **Emit**: every partition worker loads its resident snapshot and its
//!    in-flight records, runs the emission stage over both, applies dormant
//!    countdowns to its own snapshot copy and buckets the deltas by
//!    destination partition.
//! 2. **Merge**: every worker merges its resident snapshot with the deltas
//!    routed to it, publishes the next round's snapshot and returns its
//!    back-links, which are stored as the next round's in-flight records.
//!
//! No worker observes another partition's state inside a phase; the only
//! communication is the routed deltas.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

/// Parallel round execution.
pub mod driver;
/// Per-round and per-run statistics.
pub mod stats;

pub use driver::RoundDriver;
pub use stats::{RoundStats, RunReport};
