use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

use ordered_index_bench::workload::{generate_uniform_keys, write_keys};
use ordered_index_bench::{
    run_benchmark, BatchCsvWriter, BenchConfig, ConfigOverrides, Key, Payload,
};

#[derive(Parser, Debug)]
#[command(
    name = "ordered-index-bench",
    version,
    about = "Batched lookup/update/insert throughput benchmark for ordered indexes"
)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the batched workload and print per-batch and cumulative throughput
    Run(RunArgs),
    /// Write a key file of uniformly random u64 keys
    Generate {
        /// Output path
        #[arg(long)]
        out: PathBuf,
        /// Number of keys to write
        #[arg(long)]
        count: usize,
        /// RNG seed
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Config file (TOML, YAML or JSON)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: ConfigOverrides,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Reports own stdout; logs go to stderr
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.cmd {
        Commands::Run(args) => run(args),
        Commands::Generate { out, count, seed } => {
            let keys = generate_uniform_keys(count, seed);
            write_keys(&out, &keys)?;
            info!(path = %out.display(), keys = count, "key file written");
            Ok(())
        }
    }
}

fn run(args: RunArgs) -> Result<()> {
    let mut config = BenchConfig::load(args.config.as_deref())?;
    config.apply_overrides(args.overrides);
    config.validate().context("Invalid configuration")?;
    info!(?config, "configuration resolved");

    let mut csv = config
        .batch_csv_path
        .as_deref()
        .map(BatchCsvWriter::create)
        .transpose()?;

    let index: BTreeMap<Key, Payload> = BTreeMap::new();
    let summary = run_benchmark(&config, index, |report| {
        println!("{report}");
        if let Some(csv) = csv.as_mut() {
            csv.write(report)?;
        }
        Ok(())
    })?;
    println!("{}", summary.report);

    if let Some(csv) = csv.as_mut() {
        csv.flush()?;
    }
    if let Some(path) = &config.results_path {
        summary.write_json(path)?;
        info!(path = %path.display(), "results written");
    }
    Ok(())
}
