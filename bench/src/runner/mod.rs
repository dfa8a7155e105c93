use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::{debug, info};

pub mod executor;
pub mod warmup;

pub use executor::BatchExecutor;
pub use warmup::bulk_load_initial;

use crate::config::BenchConfig;
use crate::index::OrderedIndex;
use crate::metrics::{BatchReport, FinalReport, RunSummary, StatsAggregator};
use crate::workload::{KeyArray, KeySampler, PayloadGenerator};

/// Payload stream seed offset, so payloads and key samples never share a sequence.
const PAYLOAD_SEED_OFFSET: u64 = 1;

/// Drives the whole workload: bulk load, then batches until every key is inserted.
pub struct WorkloadDriver<I: OrderedIndex> {
    config: BenchConfig,
    keys: KeyArray,
    index: I,
    cursor: usize,
    executor: BatchExecutor,
    stats: StatsAggregator,
    warmup_time: Duration,
}

impl<I: OrderedIndex> WorkloadDriver<I> {
    /// Build a driver and bulk load the configured initial keys into `index`.
    pub fn new(config: BenchConfig, keys: KeyArray, mut index: I) -> Result<Self> {
        config.validate()?;
        anyhow::ensure!(
            keys.len() == config.total_keys,
            "loaded {} keys but total_keys is {}",
            keys.len(),
            config.total_keys
        );

        let payload_seed = config.seed.map(|s| s.wrapping_add(PAYLOAD_SEED_OFFSET));
        let mut payloads = PayloadGenerator::new(payload_seed);
        let warmup_time =
            bulk_load_initial(&mut index, &keys[..config.initial_keys], &mut payloads);

        let executor = BatchExecutor::new(
            config.batch_shape(),
            KeySampler::new(config.seed),
            payloads,
        );

        Ok(Self {
            cursor: config.initial_keys,
            keys,
            index,
            executor,
            stats: StatsAggregator::new()?,
            warmup_time,
            config,
        })
    }

    /// Keys inserted so far; the boundary lookups and updates sample below.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub fn into_index(self) -> I {
        self.index
    }

    pub fn planned_batches(&self) -> usize {
        self.config.planned_batches()
    }

    /// Run every batch, handing each report to `on_batch`.
    pub fn run_with<F>(&mut self, mut on_batch: F) -> Result<FinalReport>
    where
        F: FnMut(&BatchReport) -> Result<()>,
    {
        let batches = self
            .executor
            .shape()
            .batches_between(self.cursor, self.config.total_keys);
        info!(
            index = self.index.name(),
            batches,
            start_cursor = self.cursor,
            total_keys = self.config.total_keys,
            "starting workload"
        );

        let progress = self.progress_bar(batches as u64);
        for _ in 0..batches {
            let report = self.run_batch()?;
            on_batch(&report)?;
            progress.inc(1);
        }
        progress.finish_and_clear();

        anyhow::ensure!(
            self.cursor == self.config.total_keys,
            "workload stopped at cursor {} of {}",
            self.cursor,
            self.config.total_keys
        );

        let report = self.stats.final_report();
        info!(
            batches = report.cumulative.batch_number,
            ops = report.cumulative.total_ops(),
            index_len = self.index.len(),
            "workload complete"
        );
        Ok(report)
    }

    /// Run a single batch and record it.
    pub fn run_batch(&mut self) -> Result<BatchReport> {
        let before = self.cursor;
        let metrics = self
            .executor
            .run_batch(&mut self.index, &self.keys, &mut self.cursor)
            .with_context(|| format!("batch starting at cursor {before} failed"))?;
        let report = self.stats.record_batch(metrics);
        debug!(
            batch = report.batch_number,
            cursor = self.cursor,
            inserted = metrics.insert_count,
            lookup_ns = metrics.lookup_duration.as_nanos() as u64,
            update_ns = metrics.update_duration.as_nanos() as u64,
            insert_ns = metrics.insert_duration.as_nanos() as u64,
            "batch done"
        );
        Ok(report)
    }

    /// Machine-readable summary of everything recorded so far.
    pub fn summary(&self) -> RunSummary {
        RunSummary::new(
            self.index.name(),
            &self.config,
            self.warmup_time,
            self.stats.final_report(),
        )
    }

    fn progress_bar(&self, batches: u64) -> ProgressBar {
        if !self.config.progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(batches);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} batches",
        ) {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}
