use anyhow::Result;
use hdrhistogram::Histogram;
use serde::{Serialize, Serializer};
use std::time::Duration;
use tracing::warn;

pub mod memory;
pub mod reporter;
pub mod timer;

pub use memory::{peak_memory, PeakMemory};
pub use reporter::{BatchCsvWriter, BatchReport, FinalReport, RunSummary};
pub use timer::{as_nanos_u64, timed};

const NANOS_PER_SEC: f64 = 1e9;

/// Operations per second for `count` operations over `elapsed`.
///
/// `None` when either side is zero: a skipped phase has no defined rate.
pub fn ops_per_sec(count: u64, elapsed: Duration) -> Option<f64> {
    let nanos = elapsed.as_nanos();
    if count == 0 || nanos == 0 {
        return None;
    }
    Some(count as f64 / nanos as f64 * NANOS_PER_SEC)
}

fn serialize_nanos<S: Serializer>(
    duration: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(as_nanos_u64(*duration))
}

/// Counts and phase timings of a single batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchMetrics {
    pub lookup_count: u64,
    pub insert_count: u64,
    pub update_count: u64,
    pub lookup_duration: Duration,
    pub insert_duration: Duration,
    pub update_duration: Duration,
}

impl BatchMetrics {
    pub fn total_ops(&self) -> u64 {
        self.lookup_count + self.insert_count + self.update_count
    }

    pub fn total_duration(&self) -> Duration {
        self.lookup_duration + self.insert_duration + self.update_duration
    }
}

/// Running totals over every batch recorded so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CumulativeMetrics {
    pub total_lookups: u64,
    pub total_inserts: u64,
    pub total_updates: u64,
    #[serde(rename = "lookup_time_ns", serialize_with = "serialize_nanos")]
    pub total_lookup_time: Duration,
    #[serde(rename = "insert_time_ns", serialize_with = "serialize_nanos")]
    pub total_insert_time: Duration,
    #[serde(rename = "update_time_ns", serialize_with = "serialize_nanos")]
    pub total_update_time: Duration,
    #[serde(rename = "batches")]
    pub batch_number: u64,
}

impl CumulativeMetrics {
    /// Fold one batch into the totals.
    pub fn absorb(&mut self, batch: &BatchMetrics) {
        self.total_lookups += batch.lookup_count;
        self.total_inserts += batch.insert_count;
        self.total_updates += batch.update_count;
        self.total_lookup_time += batch.lookup_duration;
        self.total_insert_time += batch.insert_duration;
        self.total_update_time += batch.update_duration;
        self.batch_number += 1;
    }

    pub fn total_ops(&self) -> u64 {
        self.total_lookups + self.total_inserts + self.total_updates
    }

    pub fn total_time(&self) -> Duration {
        self.total_lookup_time + self.total_insert_time + self.total_update_time
    }
}

/// Throughput per operation kind, in operations per second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Throughput {
    pub lookups: Option<f64>,
    pub updates: Option<f64>,
    pub inserts: Option<f64>,
    pub total: Option<f64>,
}

impl Throughput {
    pub fn of_batch(batch: &BatchMetrics) -> Self {
        Self {
            lookups: ops_per_sec(batch.lookup_count, batch.lookup_duration),
            updates: ops_per_sec(batch.update_count, batch.update_duration),
            inserts: ops_per_sec(batch.insert_count, batch.insert_duration),
            total: ops_per_sec(batch.total_ops(), batch.total_duration()),
        }
    }

    pub fn of_cumulative(cumulative: &CumulativeMetrics) -> Self {
        Self {
            lookups: ops_per_sec(cumulative.total_lookups, cumulative.total_lookup_time),
            updates: ops_per_sec(cumulative.total_updates, cumulative.total_update_time),
            inserts: ops_per_sec(cumulative.total_inserts, cumulative.total_insert_time),
            total: ops_per_sec(cumulative.total_ops(), cumulative.total_time()),
        }
    }
}

/// Spread of whole-batch throughput across the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThroughputSpread {
    pub min: u64,
    pub p50: u64,
    pub p99: u64,
    pub max: u64,
}

/// Accumulates batch metrics and produces batch and final reports.
pub struct StatsAggregator {
    cumulative: CumulativeMetrics,
    batch_ops_per_sec: Histogram<u64>,
}

impl StatsAggregator {
    pub fn new() -> Result<Self> {
        Ok(Self {
            cumulative: CumulativeMetrics::default(),
            batch_ops_per_sec: Histogram::new(3)?,
        })
    }

    /// Record a finished batch and build its report.
    pub fn record_batch(&mut self, batch: BatchMetrics) -> BatchReport {
        self.cumulative.absorb(&batch);

        let batch_throughput = Throughput::of_batch(&batch);
        if let Some(rate) = batch_throughput.total {
            if let Err(e) = self.batch_ops_per_sec.record(rate.round() as u64) {
                warn!(
                    batch = self.cumulative.batch_number,
                    ops_per_sec = rate,
                    error = %e,
                    "batch throughput not recorded in histogram"
                );
            }
        }

        BatchReport {
            batch_number: self.cumulative.batch_number,
            batch,
            cumulative: self.cumulative,
            batch_throughput,
            cumulative_throughput: Throughput::of_cumulative(&self.cumulative),
            memory: peak_memory(),
        }
    }

    pub fn cumulative(&self) -> &CumulativeMetrics {
        &self.cumulative
    }

    /// Min/median/p99/max of whole-batch ops/sec, once any batch had a rate.
    pub fn batch_spread(&self) -> Option<ThroughputSpread> {
        if self.batch_ops_per_sec.is_empty() {
            return None;
        }
        Some(ThroughputSpread {
            min: self.batch_ops_per_sec.min(),
            p50: self.batch_ops_per_sec.value_at_quantile(0.50),
            p99: self.batch_ops_per_sec.value_at_quantile(0.99),
            max: self.batch_ops_per_sec.max(),
        })
    }

    pub fn final_report(&self) -> FinalReport {
        FinalReport {
            cumulative: self.cumulative,
            throughput: Throughput::of_cumulative(&self.cumulative),
            batch_spread: self.batch_spread(),
            memory: peak_memory(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(lookups: u64, updates: u64, inserts: u64, millis: u64) -> BatchMetrics {
        BatchMetrics {
            lookup_count: lookups,
            insert_count: inserts,
            update_count: updates,
            lookup_duration: Duration::from_millis(if lookups > 0 { millis } else { 0 }),
            insert_duration: Duration::from_millis(millis),
            update_duration: Duration::from_millis(if updates > 0 { millis } else { 0 }),
        }
    }

    #[test]
    fn test_ops_per_sec() {
        assert_eq!(ops_per_sec(500, Duration::from_millis(500)), Some(1_000.0));
        assert_eq!(ops_per_sec(3, Duration::from_nanos(1)), Some(3e9));
    }

    #[test]
    fn test_degenerate_rates_are_undefined() {
        assert_eq!(ops_per_sec(0, Duration::from_secs(1)), None);
        assert_eq!(ops_per_sec(10, Duration::ZERO), None);
        assert_eq!(ops_per_sec(0, Duration::ZERO), None);
    }

    #[test]
    fn test_skipped_phases_have_no_rate() {
        let first = batch(0, 0, 20, 4);
        let throughput = Throughput::of_batch(&first);
        assert_eq!(throughput.lookups, None);
        assert_eq!(throughput.updates, None);
        assert_eq!(throughput.inserts, Some(5_000.0));
        assert_eq!(throughput.total, Some(5_000.0));
    }

    #[test]
    fn test_cumulative_is_sum_of_batches() {
        let mut stats = StatsAggregator::new().unwrap();
        let batches = [batch(0, 0, 20, 1), batch(20, 5, 20, 2), batch(20, 5, 10, 3)];
        for b in batches {
            stats.record_batch(b);
        }

        let total = stats.cumulative();
        assert_eq!(total.batch_number, 3);
        assert_eq!(total.total_lookups, 40);
        assert_eq!(total.total_updates, 10);
        assert_eq!(total.total_inserts, 50);
        assert_eq!(total.total_insert_time, Duration::from_millis(6));
        assert_eq!(total.total_lookup_time, Duration::from_millis(5));
        assert_eq!(total.total_ops(), 100);
    }

    #[test]
    fn test_batch_report_numbers_follow_recording_order() {
        let mut stats = StatsAggregator::new().unwrap();
        let first = stats.record_batch(batch(0, 0, 20, 1));
        let second = stats.record_batch(batch(20, 5, 20, 1));
        assert_eq!(first.batch_number, 1);
        assert_eq!(second.batch_number, 2);
        assert_eq!(second.cumulative.total_inserts, 40);
        assert_eq!(second.batch.insert_count, 20);
    }

    #[test]
    fn test_rates_are_finite_and_non_negative() {
        let mut stats = StatsAggregator::new().unwrap();
        let report = stats.record_batch(batch(20, 5, 20, 3));
        let rates = [
            report.batch_throughput.lookups,
            report.batch_throughput.updates,
            report.batch_throughput.inserts,
            report.batch_throughput.total,
            report.cumulative_throughput.total,
        ];
        for rate in rates.into_iter().flatten() {
            assert!(rate.is_finite() && rate >= 0.0);
        }
    }

    #[test]
    fn test_batch_spread() {
        let mut stats = StatsAggregator::new().unwrap();
        assert!(stats.batch_spread().is_none());

        stats.record_batch(batch(0, 0, 1_000, 1)); // 1M ops/sec
        stats.record_batch(batch(0, 0, 2_000, 1)); // 2M ops/sec
        let spread = stats.batch_spread().unwrap();
        assert!(spread.min <= spread.p50 && spread.p50 <= spread.max);
        // 3 significant digits
        assert!((999_000..=1_001_000).contains(&spread.min));
        assert!((1_998_000..=2_002_000).contains(&spread.max));
    }

    #[test]
    fn test_extreme_batch_rate_still_produces_a_report() {
        let mut stats = StatsAggregator::new().unwrap();
        let report = stats.record_batch(BatchMetrics {
            insert_count: 1_000_000_000,
            insert_duration: Duration::from_nanos(1),
            ..BatchMetrics::default()
        });

        assert_eq!(report.batch_number, 1);
        assert_eq!(report.batch_throughput.inserts, Some(1e18));
        assert_eq!(stats.cumulative().total_inserts, 1_000_000_000);
        if let Some(spread) = stats.batch_spread() {
            assert!(spread.max >= spread.min);
        }
    }

    #[test]
    fn test_final_report_with_no_batches() {
        let stats = StatsAggregator::new().unwrap();
        let report = stats.final_report();
        assert_eq!(report.cumulative.batch_number, 0);
        assert_eq!(report.throughput, Throughput::default());
        assert!(report.batch_spread.is_none());
    }
}
