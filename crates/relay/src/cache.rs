//! Memoization of token → destination lookups
//!
//! Copy-on-write snapshot map: readers never lock, writers rebuild.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use tracing::debug;
use tunnelgate_core::{DestinationAddress, WireToken, DEFAULT_MAX_CACHE_ENTRIES};

type Snapshot = HashMap<WireToken, DestinationAddress>;

/// Process-wide token → address cache.
///
/// Reads are a single atomic load of the current immutable snapshot. Writes
/// take `writer`, build a fresh map from the current snapshot plus the new
/// entry and publish it with one atomic store, so readers never see a
/// half-updated map.
///
/// There is no per-entry eviction. Once the published snapshot holds
/// `max_entries` tokens, the next insert publishes a map containing only the
/// new entry.
pub struct AddressCache {
    snapshot: ArcSwap<Snapshot>,
    writer: Mutex<()>,
    max_entries: usize,
}

impl AddressCache {
    /// Create an empty cache with the default size limit
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_MAX_CACHE_ENTRIES)
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(HashMap::new()),
            writer: Mutex::new(()),
            max_entries,
        }
    }

    /// Look up a token without taking any lock
    pub fn lookup(&self, token: &[u8]) -> Option<DestinationAddress> {
        self.snapshot.load().get(token).cloned()
    }

    /// Record a successfully decoded token
    pub fn insert(&self, token: WireToken, address: DestinationAddress) {
        // The guard protects no data, so a poisoned lock is still usable
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let current = self.snapshot.load();
        let mut next = if current.len() < self.max_entries {
            Snapshot::clone(&current)
        } else {
            debug!(
                "Address cache reached {} entries, starting over",
                current.len()
            );
            HashMap::new()
        };
        next.insert(token, address);

        self.snapshot.store(Arc::new(next));
    }

    /// Number of entries in the current snapshot
    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.load().is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}

impl Default for AddressCache {
    fn default() -> Self {
        Self::new()
    }
}
