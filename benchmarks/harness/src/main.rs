//! schimmy-bench-harness
//!
//! Run small end-to-end benchmarks (generate -> prepare -> propagate -> verify)
//! and append CSV rows into `benchmarks/reports/bench-<unix>.csv`.
//!
//! Usage examples:
//!   cargo run -p schimmy-bench-harness -- --profile configs/profiles/small.toml
//!   cargo run -p schimmy-bench-harness -- --profile configs/profiles/small.toml --store memory

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::Deserialize;

use schimmy_core::{Partitioner, PropagationConfig};
use schimmy_driver::RoundDriver;
use schimmy_network::generator::{generate_graph, GraphSpec};
use schimmy_network::kind::NetworkKind;
use schimmy_network::seeded::SeededNetwork;
use schimmy_store::dir::DirStore;
use schimmy_store::layout::Layout;
use schimmy_store::manifest::{commit_round, verify_round};
use schimmy_store::prepare::prepare;
use schimmy_store::store::{MemoryStore, SnapshotStore};

#[derive(Debug, Deserialize)]
struct Profile {
    /// Address-space model
    network: NetworkKind,
    /// Populated addresses in the generated graph
    population: u64,
    /// Initially infected nodes
    seeds: u64,
    /// Fraction of immune nodes
    #[serde(default)]
    immune_ratio: f64,
    /// Hit-list length per seed
    #[serde(default)]
    hit_list_len: usize,
    /// Partition count
    partitions: u32,
    /// Rounds per run
    iterations: u32,
    /// Delay for newly infected nodes
    #[serde(default)]
    propagation_delay: u32,
    /// Repetitions of the whole pipeline
    repeats: u32,
}

#[derive(Clone, Copy, Debug)]
enum StoreSel {
    Dir,
    Memory,
}

fn parse_flag(name: &str, default: &str) -> String {
    let mut it = std::env::args().skip(1);
    while let Some(k) = it.next() {
        if k == format!("--{name}") {
            return it.next().unwrap_or_else(|| default.to_string());
        }
    }
    default.to_string()
}

fn dur_ms(d: Duration) -> u128 {
    d.as_millis()
}

/// Prepare, propagate and verify against one store; returns stage timings and extras.
fn run_pipeline<S: SnapshotStore>(
    store: &S,
    profile: &Profile,
    graph: &[schimmy_core::Node],
    seed: u64,
) -> Result<Vec<(&'static str, Duration, String)>> {
    let mut rows = Vec::new();

    let t0 = Instant::now();
    let prepared = prepare(store, graph.iter().cloned().map(Ok))?;
    rows.push(("prepare", t0.elapsed(), format!("nodes={}", prepared.nodes)));

    let cfg = PropagationConfig::default()
        .with_iterations(profile.iterations)
        .with_propagation_delay(profile.propagation_delay);
    let t0 = Instant::now();
    let report = RoundDriver::new(store, SeededNetwork::new(profile.network, seed), cfg)?.run()?;
    let infected = report.last().map_or(0, |r| r.infected);
    rows.push((
        "propagate",
        t0.elapsed(),
        format!(
            "rounds={} infected={infected} new={}",
            report.rounds.len(),
            report.total_new_infections()
        ),
    ));

    let t0 = Instant::now();
    let manifest = commit_round(store, report.final_round)?;
    verify_round(store, report.final_round, &manifest)?;
    rows.push(("verify", t0.elapsed(), format!("root={}", hex::encode(manifest.root))));

    Ok(rows)
}

fn main() -> Result<()> {
    let profile_path = PathBuf::from(parse_flag("profile", "configs/profiles/small.toml"));
    let store_str = parse_flag("store", "dir");
    let store_sel = match store_str.as_str() {
        "dir" => StoreSel::Dir,
        "memory" => StoreSel::Memory,
        other => anyhow::bail!("unknown --store {other} (use dir|memory)"),
    };

    let profile_src = fs::read_to_string(&profile_path)
        .with_context(|| format!("read profile {}", profile_path.display()))?;
    let profile: Profile = toml::from_str(&profile_src).context("parse profile toml")?;
    println!(
        "Profile: network={}, population={}, seeds={}, partitions={}, iterations={}, repeats={}, store={store_str}",
        profile.network,
        profile.population,
        profile.seeds,
        profile.partitions,
        profile.iterations,
        profile.repeats
    );

    fs::create_dir_all("benchmarks/reports").context("create benchmarks/reports")?;

    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock before UNIX epoch")?
        .as_secs();
    let csv_path = PathBuf::from(format!("benchmarks/reports/bench-{ts}.csv"));
    let mut csv = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&csv_path)?;
    writeln!(
        csv,
        "timestamp,store,network,population,partitions,iterations,repeat,stage,ms,extra"
    )?;

    let partitioner = Partitioner::new(profile.network.address_space(), profile.partitions)?;
    let layout = Layout::new(profile.network.name(), &partitioner);

    for rep in 0..profile.repeats {
        let seed = u64::from(rep);
        let mut row = |stage: &str, d: Duration, extra: &str| {
            writeln!(
                csv,
                "{ts},{store_str},{},{},{},{},{rep},{stage},{},{extra}",
                profile.network,
                profile.population,
                profile.partitions,
                profile.iterations,
                dur_ms(d)
            )
        };

        // 1) generate graph
        let t0 = Instant::now();
        let graph = generate_graph(
            profile.network.address_space(),
            &GraphSpec {
                population: profile.population,
                seeds: profile.seeds,
                immune_ratio: profile.immune_ratio,
                hit_list_len: profile.hit_list_len,
                seed,
            },
        )?;
        row("generate", t0.elapsed(), &format!("nodes={}", graph.len()))?;

        // 2-4) prepare, propagate, verify
        let stages = match store_sel {
            StoreSel::Memory => run_pipeline(&MemoryStore::new(layout.clone()), &profile, &graph, seed)?,
            StoreSel::Dir => {
                let root = PathBuf::from(format!("benchmarks/tmp-store-{ts}-{rep}"));
                let store = DirStore::create(&root, layout.clone())?;
                let stages = run_pipeline(&store, &profile, &graph, seed);
                // cleanup temp store to avoid disk bloat
                let _ = fs::remove_dir_all(&root);
                stages?
            }
        };
        for (stage, d, extra) in stages {
            row(stage, d, &extra)?;
        }
    }

    println!("Wrote report → {}", csv_path.display());
    Ok(())
}
