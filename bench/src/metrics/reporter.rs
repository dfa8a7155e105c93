use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use super::{
    as_nanos_u64, BatchMetrics, CumulativeMetrics, PeakMemory, Throughput, ThroughputSpread,
};
use crate::config::BenchConfig;
use crate::workload::BatchShape;

/// Rate rendered for reports; undefined rates print as `n/a`.
struct Rate(Option<f64>);

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(rate) => write!(f, "{:.0}", rate),
            None => f.write_str("n/a"),
        }
    }
}

fn rate_cell(rate: Option<f64>) -> String {
    rate.map(|r| format!("{:.0}", r)).unwrap_or_default()
}

/// Report emitted after every batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchReport {
    pub batch_number: u64,
    pub batch: BatchMetrics,
    pub cumulative: CumulativeMetrics,
    pub batch_throughput: Throughput,
    pub cumulative_throughput: Throughput,
    pub memory: PeakMemory,
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.batch_throughput;
        let c = &self.cumulative_throughput;
        writeln!(
            f,
            "Batch {}, cumulative ops: {}",
            self.batch_number,
            self.cumulative.total_ops()
        )?;
        writeln!(
            f,
            "\tbatch throughput:\t{} lookups/sec,\t{} updates/sec,\t{} inserts/sec,\t{} ops/sec",
            Rate(b.lookups),
            Rate(b.updates),
            Rate(b.inserts),
            Rate(b.total)
        )?;
        write!(
            f,
            "\tcumulative throughput:\t{} lookups/sec,\t{} updates/sec,\t{} inserts/sec,\t{} ops/sec,\tmemory usage: {}",
            Rate(c.lookups),
            Rate(c.updates),
            Rate(c.inserts),
            Rate(c.total),
            self.memory
        )
    }
}

/// End-of-run summary over all batches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FinalReport {
    #[serde(flatten)]
    pub cumulative: CumulativeMetrics,
    pub throughput: Throughput,
    pub batch_spread: Option<ThroughputSpread>,
    #[serde(rename = "peak_rss_kb", serialize_with = "serialize_kilobytes")]
    pub memory: PeakMemory,
}

fn serialize_kilobytes<S: serde::Serializer>(
    memory: &PeakMemory,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(memory.kilobytes)
}

impl fmt::Display for FinalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.cumulative;
        let t = &self.throughput;
        writeln!(
            f,
            "Cumulative stats: {} batches, {} ops ({} lookups, {} inserts, {} updates)",
            c.batch_number,
            c.total_ops(),
            c.total_lookups,
            c.total_inserts,
            c.total_updates
        )?;
        write!(
            f,
            "\tcumulative throughput:\t{} lookups/sec,\t{} inserts/sec,\t{} updates/sec,\t{} ops/sec",
            Rate(t.lookups),
            Rate(t.inserts),
            Rate(t.updates),
            Rate(t.total)
        )
    }
}

/// Machine-readable record of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub index: String,
    pub keys_file: String,
    pub total_keys: usize,
    pub initial_keys: usize,
    pub lookups_per_batch: usize,
    pub updates_per_batch: usize,
    pub inserts_per_batch: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub warmup_time_ns: u64,
    #[serde(flatten)]
    pub report: FinalReport,
}

impl RunSummary {
    pub fn new(
        index: &str,
        config: &BenchConfig,
        warmup: std::time::Duration,
        report: FinalReport,
    ) -> Self {
        let BatchShape {
            lookups,
            updates,
            inserts,
        } = config.batch_shape();
        Self {
            index: index.to_string(),
            keys_file: config.keys_file.display().to_string(),
            total_keys: config.total_keys,
            initial_keys: config.initial_keys,
            lookups_per_batch: lookups,
            updates_per_batch: updates,
            inserts_per_batch: inserts,
            seed: config.seed,
            warmup_time_ns: as_nanos_u64(warmup),
            report,
        }
    }

    /// Write the summary as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create results file {}", path.display()))?;
        let mut writer = io::BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).context("Failed to serialize results")?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

/// One CSV row per batch.
pub struct BatchCsvWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl BatchCsvWriter<File> {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create batch CSV {}", path.display()))?;
        Self::from_writer(file)
    }
}

impl<W: Write> BatchCsvWriter<W> {
    pub const HEADER: [&'static str; 14] = [
        "batch",
        "lookups",
        "updates",
        "inserts",
        "lookup_ns",
        "update_ns",
        "insert_ns",
        "lookups_per_sec",
        "updates_per_sec",
        "inserts_per_sec",
        "ops_per_sec",
        "cumulative_ops",
        "cumulative_ops_per_sec",
        "peak_rss_kb",
    ];

    pub fn from_writer(inner: W) -> Result<Self> {
        let mut writer = csv::Writer::from_writer(inner);
        writer.write_record(Self::HEADER)?;
        Ok(Self { writer })
    }

    pub fn write(&mut self, report: &BatchReport) -> Result<()> {
        let b = &report.batch;
        let t = &report.batch_throughput;
        self.writer.write_record([
            report.batch_number.to_string(),
            b.lookup_count.to_string(),
            b.update_count.to_string(),
            b.insert_count.to_string(),
            as_nanos_u64(b.lookup_duration).to_string(),
            as_nanos_u64(b.update_duration).to_string(),
            as_nanos_u64(b.insert_duration).to_string(),
            rate_cell(t.lookups),
            rate_cell(t.updates),
            rate_cell(t.inserts),
            rate_cell(t.total),
            report.cumulative.total_ops().to_string(),
            rate_cell(report.cumulative_throughput.total),
            report.memory.kilobytes.to_string(),
        ])?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush batch CSV: {}", e.error()))
    }
}
