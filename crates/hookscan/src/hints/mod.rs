//! Hint cache: remembered match addresses keyed by pattern hash.

mod store;

pub use store::*;

use std::collections::HashMap;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

static GLOBAL_HINTS: Lazy<HintCache> = Lazy::new(HintCache::new);

/// Process-wide cache used by scanners built without an explicit one.
pub fn global() -> &'static HintCache {
    &GLOBAL_HINTS
}

/// Map from pattern hash to the address that pattern resolved to last time.
///
/// Never authoritative: a hinted address is re-verified against memory
/// before a scan trusts it, so a stale entry or a hash collision costs a
/// wasted check, nothing more. The lock is held for single lookups and
/// inserts, never across a scan.
#[derive(Debug, Default)]
pub struct HintCache {
    entries: RwLock<HashMap<u64, usize>>,
}

impl HintCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store or overwrite the hint for a pattern hash.
    pub fn record(&self, hash: u64, addr: usize) {
        self.entries.write().insert(hash, addr);
    }

    /// Address recorded for the hash, if any.
    pub fn lookup(&self, hash: u64) -> Option<usize> {
        self.entries.read().get(&hash).copied()
    }

    /// Bulk-insert entries, e.g. from a persisted store.
    pub fn seed<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (u64, usize)>,
    {
        self.entries.write().extend(entries);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Current entries sorted by hash, for persistence and inspection.
    pub fn snapshot(&self) -> Vec<(u64, usize)> {
        let mut entries: Vec<_> = self
            .entries
            .read()
            .iter()
            .map(|(&hash, &addr)| (hash, addr))
            .collect();
        entries.sort_unstable();
        entries
    }
}
