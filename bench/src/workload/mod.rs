//! Workload inputs: the key set and the random sources that drive each batch.

pub mod dataset;
pub mod generator;

pub use dataset::{generate_uniform_keys, load_keys, write_keys, KeyArray};
pub use generator::{seeded_rng, KeySampler, PayloadGenerator};

/// Operation counts for one batch, derived from the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchShape {
    /// Point lookups per batch.
    pub lookups: usize,
    /// In-place updates per batch.
    pub updates: usize,
    /// Upper bound on inserts per batch; the last batch may insert fewer.
    pub inserts: usize,
}

impl BatchShape {
    /// Inserts the batch starting at `cursor` will perform out of `total` keys.
    pub fn inserts_at(&self, cursor: usize, total: usize) -> usize {
        self.inserts.min(total.saturating_sub(cursor))
    }

    /// Batches needed to move the cursor from `start` to `total`.
    pub fn batches_between(&self, start: usize, total: usize) -> usize {
        if self.inserts == 0 {
            return 0;
        }
        total.saturating_sub(start).div_ceil(self.inserts)
    }
}
