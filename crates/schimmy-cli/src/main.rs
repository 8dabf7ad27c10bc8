#![forbid(unsafe_code)]
#![deny(
    rust_2018_idioms,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo
)]

mod job;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use job::{JobConfig, PropagationOverrides};
use schimmy_core::io::{stream_nodes_auto, write_nodes_auto};
use schimmy_core::io_jsonl::{write_jsonl, JsonlWriter};
use schimmy_core::{Node, Partitioner};
use schimmy_driver::RoundDriver;
use schimmy_network::generator::{generate_graph, GraphSpec};
use schimmy_network::kind::NetworkKind;
use schimmy_network::seeded::SeededNetwork;
use schimmy_store::dir::DirStore;
use schimmy_store::layout::Layout;
use schimmy_store::manifest::{commit_round, read_manifest, verify_round, write_manifest};
use schimmy_store::prepare::prepare_file;
use schimmy_store::snapshot::{Snapshot, StatusCounts};
use schimmy_store::store::SnapshotStore;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "schimmy-cli",
    about = "Schimmy propagation CLI",
    long_about = "Schimmy propagation CLI.\n\nGenerate an initial graph, split it into resident partition snapshots, run synchronized propagation rounds and verify the published snapshots.",
    version = env!("CARGO_PKG_VERSION"),
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Generate a synthetic initial graph.
    /// If --out ends with `.jsonl`, writes NDJSON for streaming.
    Generate {
        /// Address-space model; IPv6 is not supported
        #[arg(value_enum, long)]
        network: NetworkOpt,

        /// Number of populated addresses (>0)
        #[arg(long, default_value_t = 64, value_parser = clap::value_parser!(u64).range(1..))]
        population: u64,

        /// Initially infected nodes
        #[arg(long, default_value_t = 1)]
        seeds: u64,

        /// Fraction of the population that starts immune
        #[arg(long, default_value_t = 0.0)]
        immune_ratio: f64,

        /// Hit-list length given to every seed
        #[arg(long, default_value_t = 0)]
        hit_list_len: usize,

        /// RNG seed
        #[arg(long, default_value_t = job::DEFAULT_SEED)]
        seed: u64,

        /// Output path (JSON/CBOR/JSONL)
        #[arg(long, default_value = "graph.jsonl")]
        out: PathBuf,
    },

    /// Split an initial graph into round-0 partition snapshots
    Prepare {
        /// Initial graph (JSON/CBOR/JSONL)
        #[arg(long)]
        graph: PathBuf,

        /// Store directory
        #[arg(long)]
        store: PathBuf,

        #[command(flatten)]
        job: JobArgs,
    },

    /// Run propagation rounds from the store's latest snapshot
    Propagate {
        /// Store directory
        #[arg(long)]
        store: PathBuf,

        #[command(flatten)]
        job: JobArgs,

        /// Number of rounds [default: 1]
        #[arg(long)]
        iterations: Option<u32>,

        /// Delay assigned to newly infected nodes [default: 0]
        #[arg(long)]
        propagation_delay: Option<u32>,

        /// Surface transient INFECTING records; `--emit-volatile false`
        /// overrides a job file that turns them on
        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        emit_volatile: Option<bool>,

        /// Export the final snapshot to this file (JSON/CBOR/JSONL)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Write the last round's volatile records to this JSONL file
        #[arg(long)]
        volatile_out: Option<PathBuf>,

        /// Write per-round statistics as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Check a published round against its manifest
    VerifySnapshot {
        /// Store directory
        #[arg(long)]
        store: PathBuf,

        /// Round to verify (defaults to the latest complete round)
        #[arg(long)]
        round: Option<u32>,
    },

    /// Convert nodes (CBOR/JSON/JSONL) -> JSON Lines (NDJSON)
    ExportJsonl {
        /// Input nodes path (CBOR/JSON/JSONL)
        #[arg(long)]
        input: PathBuf,
        /// Output JSONL path
        #[arg(long)]
        output: PathBuf,
    },

    /// Count nodes by status
    Summary {
        /// Input nodes path (CBOR/JSON/JSONL)
        #[arg(long)]
        input: PathBuf,
    },
}

/// Flags shared by every subcommand that needs the job layout.
#[derive(clap::Args, Debug)]
struct JobArgs {
    /// Address-space model; IPv6 is not supported
    #[arg(value_enum, long)]
    network: Option<NetworkOpt>,

    /// Number of partitions (= merge workers)
    #[arg(long)]
    partitions: Option<u32>,

    /// RNG seed for random targets [default: 42]
    #[arg(long)]
    seed: Option<u64>,

    /// TOML job file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
enum NetworkOpt {
    /// Full IPv4 space (2^32 addresses)
    Ipv4,
    /// 256 addresses
    Network256,
    /// 64 addresses
    NetworkGraphable,
}

impl From<NetworkOpt> for NetworkKind {
    fn from(n: NetworkOpt) -> Self {
        match n {
            NetworkOpt::Ipv4 => Self::Ipv4,
            NetworkOpt::Network256 => Self::Network256,
            NetworkOpt::NetworkGraphable => Self::NetworkGraphable,
        }
    }
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Generate {
            network,
            population,
            seeds,
            immune_ratio,
            hit_list_len,
            seed,
            out,
        } => generate(
            network.into(),
            &GraphSpec {
                population,
                seeds,
                immune_ratio,
                hit_list_len,
                seed,
            },
            &out,
        ),

        Cmd::Prepare { graph, store, job } => prepare_store(&graph, &store, &job),

        Cmd::Propagate {
            store,
            job,
            iterations,
            propagation_delay,
            emit_volatile,
            out,
            volatile_out,
            report,
        } => propagate(
            &store,
            &job,
            PropagationOverrides {
                iterations,
                propagation_delay,
                emit_volatile,
            },
            &Outputs {
                out,
                volatile_out,
                report,
            },
        ),

        Cmd::VerifySnapshot { store, round } => verify_snapshot(&store, round),

        Cmd::ExportJsonl { input, output } => export_jsonl(&input, &output),

        Cmd::Summary { input } => summary(&input),
    }
}

/// Initialize tracing with an env-driven filter (default INFO).
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().with_target(false).with_level(true).compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

/// Merge the job file (if any) with flags and check required fields.
fn resolve_job(args: &JobArgs, propagation: PropagationOverrides) -> Result<job::Job> {
    let file = match &args.config {
        Some(path) => JobConfig::load(path)?,
        None => JobConfig::default(),
    };
    let flags = JobConfig {
        network: args.network.map(NetworkKind::from),
        partitions: args.partitions,
        seed: args.seed,
        propagation,
    };
    Ok(file.overlay(flags).resolve()?)
}

fn open_store(dir: &Path, job: &job::Job) -> Result<DirStore> {
    let partitioner = Partitioner::new(job.network.address_space(), job.partitions)?;
    DirStore::create(dir, Layout::new(job.network.name(), &partitioner))
        .with_context(|| format!("open store {}", dir.display()))
}

fn generate(kind: NetworkKind, spec: &GraphSpec, out: &Path) -> Result<()> {
    info!(network = %kind, population = spec.population, seeds = spec.seeds, "generating graph");
    let nodes = generate_graph(kind.address_space(), spec)?;
    write_nodes_auto(out, &nodes).with_context(|| format!("write graph to {}", out.display()))?;
    println!(
        "Generated {} nodes on {kind} → {}",
        nodes.len(),
        out.display()
    );
    Ok(())
}

fn prepare_store(graph: &Path, dir: &Path, args: &JobArgs) -> Result<()> {
    let job = resolve_job(args, PropagationOverrides::default())?;
    let store = open_store(dir, &job)?;
    info!(graph=%graph.display(), store=%dir.display(), partitions = job.partitions, "preparing");

    let report = prepare_file(&store, graph)?;
    let manifest = commit_round(&store, 0)?;
    write_manifest(store.manifest_path(0), &manifest)?;

    println!(
        "Prepared {} nodes into {} partitions, root={} → {}",
        report.nodes,
        job.partitions,
        manifest.root_hex(),
        dir.display()
    );
    Ok(())
}

struct Outputs {
    out: Option<PathBuf>,
    volatile_out: Option<PathBuf>,
    report: Option<PathBuf>,
}

fn propagate(
    dir: &Path,
    args: &JobArgs,
    propagation: PropagationOverrides,
    outputs: &Outputs,
) -> Result<()> {
    let job = resolve_job(args, propagation)?;
    let store = open_store(dir, &job)?;
    info!(
        store=%dir.display(),
        network=%job.network,
        partitions = job.partitions,
        iterations = job.propagation.iterations,
        propagation_delay = job.propagation.propagation_delay,
        emit_volatile = job.propagation.emit_volatile,
        seed = job.seed,
        "propagating"
    );

    let network = SeededNetwork::new(job.network, job.seed);
    let report = RoundDriver::new(&store, network, job.propagation)?.run()?;

    let manifest = commit_round(&store, report.final_round)?;
    write_manifest(store.manifest_path(report.final_round), &manifest)?;

    if let Some(out) = &outputs.out {
        let nodes: Vec<Node> = store
            .load_round(report.final_round)?
            .into_iter()
            .flat_map(Snapshot::into_nodes)
            .collect();
        write_nodes_auto(out, &nodes)
            .with_context(|| format!("export final snapshot to {}", out.display()))?;
    }
    if let Some(path) = &outputs.volatile_out {
        write_jsonl(path, &report.volatile)
            .with_context(|| format!("write volatile records to {}", path.display()))?;
    }
    if let Some(path) = &outputs.report {
        schimmy_core::io::ensure_parent_dir(path)?;
        let json = serde_json::to_vec_pretty(&report)?;
        std::fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    }

    for r in &report.rounds {
        println!("{r}");
    }
    println!(
        "Rounds {}..{} done: {} → root={}",
        report.start_round,
        report.final_round,
        manifest.counts,
        manifest.root_hex()
    );
    Ok(())
}

fn verify_snapshot(dir: &Path, round: Option<u32>) -> Result<()> {
    let store = DirStore::open(dir).with_context(|| format!("open store {}", dir.display()))?;
    let round = match round {
        Some(r) => r,
        None => store
            .latest_round()?
            .with_context(|| format!("{} holds no complete round", dir.display()))?,
    };
    let path = store.manifest_path(round);
    info!(store=%dir.display(), round, manifest=%path.display(), "verifying snapshot");

    let manifest = read_manifest(&path)?;
    verify_round(&store, round, &manifest)
        .with_context(|| format!("verifying round {round} against {}", path.display()))?;

    println!("OK: round {round} matches manifest root={}", manifest.root_hex());
    Ok(())
}

/// Convert any nodes file (CBOR/JSON/JSONL) into JSON Lines.
fn export_jsonl(input: &Path, output: &Path) -> Result<()> {
    info!(infile=%input.display(), outfile=%output.display(), "export to jsonl");
    let iter = stream_nodes_auto(input).context("open input stream")?;

    let mut w = JsonlWriter::create(output)?;
    for item in iter {
        w.write(&item?)?;
    }
    let n = w.finish()?;

    println!("Exported {n} nodes → {}", output.display());
    Ok(())
}

fn summary(input: &Path) -> Result<()> {
    let iter = stream_nodes_auto(input).context("open input stream")?;
    let mut counts = StatusCounts::default();
    for item in iter {
        counts.add(item?.status);
    }
    println!("{}: {} nodes", input.display(), counts.total());
    for st in schimmy_core::Status::ALL {
        println!("  {:<11} {}", st.as_str(), counts.get(st));
    }
    Ok(())
}
