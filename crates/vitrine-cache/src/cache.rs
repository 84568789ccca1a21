//! Bounded cache table with recency-ordered eviction.
//!
//! Each entry carries a monotonic use tick; reads refresh it. An insert
//! that would exceed `max_entries` evicts the least-recently-used
//! entries in a single pass down to 90% of capacity, rather than one at
//! a time, so steady insert pressure does not churn through repeated
//! evictions.
//!
//! Thread ownership: a `CacheTable` is exclusively owned and mutated by
//! the consumer thread. The transform worker never touches it; results
//! arrive over the completion channel and the consumer performs the
//! insert.

use std::collections::HashMap;
use std::hash::Hash;

/// Eviction drains the table to this many percent of capacity.
const EVICT_TARGET_PERCENT: usize = 90;

struct Slot<V> {
    value: V,
    last_used: u64,
}

/// A bounded map with least-recently-used eviction.
pub struct CacheTable<K, V> {
    entries: HashMap<K, Slot<V>>,
    max_entries: usize,
    tick: u64,
}

impl<K: Hash + Eq + Clone, V> CacheTable<K, V> {
    /// Create a table holding at most `max_entries` entries.
    ///
    /// `max_entries` must be non-zero; the pipeline validates this via
    /// its configuration.
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        debug_assert!(max_entries > 0, "cache capacity must be non-zero");
        Self {
            entries: HashMap::new(),
            max_entries,
            tick: 0,
        }
    }

    /// Look up a value, refreshing its recency on a hit.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.tick += 1;
        let tick = self.tick;
        self.entries.get_mut(key).map(|slot| {
            slot.last_used = tick;
            &slot.value
        })
    }

    /// Look up a value without refreshing recency.
    #[must_use]
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|slot| &slot.value)
    }

    /// Insert a value, evicting least-recently-used entries first if
    /// the insert would exceed the bound.
    ///
    /// Inserting under an existing key replaces the value in place and
    /// never evicts. Returns the number of entries evicted.
    pub fn put(&mut self, key: K, value: V) -> usize {
        self.tick += 1;
        if let Some(slot) = self.entries.get_mut(&key) {
            slot.value = value;
            slot.last_used = self.tick;
            return 0;
        }

        let evicted = if self.entries.len() >= self.max_entries {
            self.evict_to_target()
        } else {
            0
        };

        self.entries.insert(
            key,
            Slot {
                value,
                last_used: self.tick,
            },
        );
        evicted
    }

    /// Remove every entry matching the predicate. Returns the number
    /// removed.
    pub fn remove_where(&mut self, mut predicate: impl FnMut(&K) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !predicate(key));
        before - self.entries.len()
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of entries currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The configured entry bound.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.max_entries
    }

    /// One-pass eviction down to the target occupancy, oldest first.
    fn evict_to_target(&mut self) -> usize {
        // Target is strictly below capacity so the pending insert fits.
        let target = (self.max_entries * EVICT_TARGET_PERCENT / 100).min(self.max_entries - 1);

        let mut by_age: Vec<(u64, K)> = self
            .entries
            .iter()
            .map(|(key, slot)| (slot.last_used, key.clone()))
            .collect();
        by_age.sort_unstable_by_key(|&(last_used, _)| last_used);

        let excess = self.entries.len().saturating_sub(target);
        for (_, key) in by_age.into_iter().take(excess) {
            self.entries.remove(&key);
        }
        excess
    }
}
