//! Concrete address-space models for Schimmy propagation.
//!
//! - `kind`: the named topologies selectable with `--network`.
//! - `seeded`: a [`Network`](schimmy_core::Network) whose random targets are
//!   reproducible per `(seed, round, attacker)`.
//! - `generator`: a deterministic synthetic initial graph for tests, the CLI
//!   `generate` subcommand and benches.
//!
//! As with the other library crates, callers import stable module paths such
//! as `schimmy_network::seeded::SeededNetwork`.

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

/// Deterministic synthetic initial graphs.
pub mod generator;
/// Named address-space models.
pub mod kind;
/// Seeded `Network` implementation.
pub mod seeded;
