//! Resident snapshot storage for Schimmy rounds.
//!
//! A job keeps one [`Snapshot`](snapshot::Snapshot) per partition per round
//! boundary. Stores are addressed by `(round, partition)` and never rewrite a
//! published round in place except through [`prepare`](prepare::prepare),
//! which is idempotent.
//!
//! - `snapshot`: the per-partition ordered map and status tallies.
//! - `layout`: the `(network, address_space, partitions)` a store was built for.
//! - `store`: the [`SnapshotStore`](store::SnapshotStore) trait and the
//!   in-memory implementation.
//! - `dir`: the on-disk implementation (`round-NNNNN/part-NNNNN.jsonl`).
//! - `prepare`: one-time split of an initial graph into round 0.
//! - `manifest`: BLAKE3 digests over a published round.

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

/// On-disk snapshot store.
pub mod dir;
/// Store layout descriptor.
pub mod layout;
/// Per-round BLAKE3 manifests.
pub mod manifest;
/// Idempotent round-0 preparation.
pub mod prepare;
/// Per-partition resident snapshot.
pub mod snapshot;
/// Store trait and in-memory store.
pub mod store;
