//! Ordered Index Batch Benchmark
//!
//! Drives an ordered in-memory key-value index through a mixed workload in
//! fixed-size batches and reports per-batch and cumulative throughput plus
//! peak resident memory:
//! - keys are loaded once from a flat binary file
//! - each batch runs random lookups, random in-place updates, then appends the
//!   next slice of keys in file order
//! - lookups and updates only touch keys inserted by earlier batches
//!
//! # Architecture
//!
//! ```text
//! bench
//! ├── config       # Layered configuration (defaults, file, env, CLI)
//! ├── index        # OrderedIndex trait + BTreeMap implementation
//! ├── workload/    # Key file loading, key sampling, payload generation
//! ├── metrics/     # Timing, memory probe, aggregation and reports
//! └── runner/      # Bulk load, batch executor and workload driver
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::collections::BTreeMap;
//! use ordered_index_bench::{run_benchmark, BenchConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = BenchConfig::load(None)?;
//!     config.validate()?;
//!     let summary = run_benchmark(&config, BTreeMap::<u64, i32>::new(), |report| {
//!         println!("{report}");
//!         Ok(())
//!     })?;
//!     println!("{}", summary.report);
//!     Ok(())
//! }
//! ```

use anyhow::{Context, Result};
use tracing::info;

pub mod config;
pub mod error;
pub mod index;
pub mod metrics;
pub mod runner;
pub mod workload;

pub use config::{BenchConfig, ConfigOverrides};
pub use error::BenchError;
pub use index::{Key, OrderedIndex, Payload};
pub use metrics::{BatchCsvWriter, BatchMetrics, BatchReport, FinalReport, RunSummary};
pub use runner::WorkloadDriver;
pub use workload::{load_keys, KeyArray};

/// Load the key file named in `config` and run the full workload against `index`.
pub fn run_benchmark<I, F>(config: &BenchConfig, index: I, on_batch: F) -> Result<RunSummary>
where
    I: OrderedIndex,
    F: FnMut(&BatchReport) -> Result<()>,
{
    config.validate()?;

    let (keys, elapsed) = metrics::timed(|| load_keys(&config.keys_file, config.total_keys));
    let keys = keys.with_context(|| format!("Failed to load {} keys", config.total_keys))?;
    info!(
        path = %config.keys_file.display(),
        keys = keys.len(),
        bytes = keys.size_bytes(),
        elapsed_ms = elapsed.as_millis() as u64,
        "keys loaded"
    );

    let mut driver = WorkloadDriver::new(config.clone(), keys, index)?;
    driver.run_with(on_batch)?;
    Ok(driver.summary())
}
