use std::time::Duration;

use tracing::info;

use crate::index::{Key, OrderedIndex, Payload};
use crate::metrics::timed;
use crate::workload::PayloadGenerator;

/// Bulk load `keys` into the index before the timed batches start.
///
/// Entries are handed to [`OrderedIndex::bulk_load`] sorted by key, each with
/// a random payload. The elapsed time is returned for the run summary but is
/// never folded into batch throughput.
pub fn bulk_load_initial<I>(index: &mut I, keys: &[Key], payloads: &mut PayloadGenerator) -> Duration
where
    I: OrderedIndex + ?Sized,
{
    if keys.is_empty() {
        return Duration::ZERO;
    }

    let mut entries: Vec<(Key, Payload)> = keys
        .iter()
        .map(|&key| (key, payloads.next_payload()))
        .collect();
    entries.sort_unstable_by_key(|&(key, _)| key);

    let ((), elapsed) = timed(|| index.bulk_load(&entries));
    info!(
        keys = entries.len(),
        index_len = index.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        "bulk load complete"
    );
    elapsed
}
