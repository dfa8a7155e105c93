//! The index under test.
//!
//! The harness never looks inside the index. Everything it needs is the
//! [`OrderedIndex`] trait: insert a key, and get a mutable handle to a key's
//! payload (used for both lookups and in-place updates).

use std::collections::BTreeMap;

/// Fixed-width key type read from the key file.
pub type Key = u64;

/// Fixed-width payload stored alongside every key.
pub type Payload = i32;

/// Width in bytes of one key in the key file.
pub const KEY_WIDTH: usize = std::mem::size_of::<Key>();

/// Ordered key-value index driven by the workload.
pub trait OrderedIndex {
    /// Short name used in logs and the results file.
    fn name(&self) -> &str;

    /// Insert `key` with `payload`.
    fn insert(&mut self, key: Key, payload: Payload);

    /// Mutable reference to the payload stored under `key`, if present.
    fn get_payload(&mut self, key: Key) -> Option<&mut Payload>;

    /// Number of entries currently held.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load an initial set of entries, sorted by key.
    ///
    /// Indexes with a dedicated bulk-load path (learned indexes usually fit
    /// their models here) should override this.
    fn bulk_load(&mut self, entries: &[(Key, Payload)]) {
        for &(key, payload) in entries {
            self.insert(key, payload);
        }
    }
}

impl OrderedIndex for BTreeMap<Key, Payload> {
    fn name(&self) -> &str {
        "btree"
    }

    fn insert(&mut self, key: Key, payload: Payload) {
        BTreeMap::insert(self, key, payload);
    }

    fn get_payload(&mut self, key: Key) -> Option<&mut Payload> {
        self.get_mut(&key)
    }

    fn len(&self) -> usize {
        BTreeMap::len(self)
    }

    fn bulk_load(&mut self, entries: &[(Key, Payload)]) {
        self.extend(entries.iter().copied());
    }
}
