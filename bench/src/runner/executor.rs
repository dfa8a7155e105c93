use std::hint::black_box;
use std::time::Duration;

use crate::error::Result;
use crate::index::{Key, OrderedIndex};
use crate::metrics::{timed, BatchMetrics};
use crate::workload::{BatchShape, KeySampler, PayloadGenerator};

/// Runs one batch at a time against an index: lookups, then updates, then inserts.
pub struct BatchExecutor {
    shape: BatchShape,
    sampler: KeySampler,
    payloads: PayloadGenerator,
}

impl BatchExecutor {
    pub fn new(shape: BatchShape, sampler: KeySampler, payloads: PayloadGenerator) -> Self {
        Self {
            shape,
            sampler,
            payloads,
        }
    }

    pub fn shape(&self) -> BatchShape {
        self.shape
    }

    /// Run one batch and advance `cursor` past the keys it inserted.
    ///
    /// Lookups and updates only draw from `keys[..cursor]` as it stood when
    /// the batch started; both are skipped while nothing has been inserted.
    pub fn run_batch<I>(
        &mut self,
        index: &mut I,
        keys: &[Key],
        cursor: &mut usize,
    ) -> Result<BatchMetrics>
    where
        I: OrderedIndex + ?Sized,
    {
        let live = *cursor;
        let mut metrics = BatchMetrics::default();

        if live > 0 {
            let lookup_keys = self.sampler.sample(keys, live, self.shape.lookups)?;
            metrics.lookup_duration = lookup_phase(index, &lookup_keys);
            metrics.lookup_count = lookup_keys.len() as u64;

            let update_keys = self.sampler.sample(keys, live, self.shape.updates)?;
            metrics.update_duration = update_phase(index, &update_keys, &mut self.payloads);
            metrics.update_count = update_keys.len() as u64;
        }

        let inserts = self.shape.inserts_at(live, keys.len());
        let batch = &keys[live..live + inserts];
        metrics.insert_duration = insert_phase(index, batch, &mut self.payloads);
        metrics.insert_count = inserts as u64;
        *cursor = live + inserts;

        Ok(metrics)
    }
}

fn lookup_phase<I: OrderedIndex + ?Sized>(index: &mut I, keys: &[Key]) -> Duration {
    let ((), elapsed) = timed(|| {
        for &key in keys {
            let _ = black_box(index.get_payload(key));
        }
    });
    elapsed
}

fn update_phase<I: OrderedIndex + ?Sized>(
    index: &mut I,
    keys: &[Key],
    payloads: &mut PayloadGenerator,
) -> Duration {
    let ((), elapsed) = timed(|| {
        for &key in keys {
            // Absent keys are skipped
            if let Some(payload) = index.get_payload(key) {
                *payload = payloads.next_payload();
            }
        }
    });
    elapsed
}

fn insert_phase<I: OrderedIndex + ?Sized>(
    index: &mut I,
    keys: &[Key],
    payloads: &mut PayloadGenerator,
) -> Duration {
    let ((), elapsed) = timed(|| {
        for &key in keys {
            index.insert(key, payloads.next_payload());
        }
    });
    elapsed
}
