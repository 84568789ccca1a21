//! In-flight job tracking: at most one outstanding scale job per key.
//!
//! Replaces weak-reference "pending load" bookkeeping with a tracker
//! keyed purely by [`CacheKey`] value identity. An entry exists from
//! dispatch to completion; every path — success, worker failure, full
//! job queue, invalidation — releases it, so no entry is ever left
//! dangling.

use std::collections::HashMap;
use std::time::Instant;

use crate::key::CacheKey;

/// Bookkeeping for one dispatched scale job.
#[derive(Debug, Clone, Copy)]
pub struct InFlightEntry {
    /// When the job was handed to the transform worker.
    pub dispatched: Instant,
}

/// Set of keys with a dispatched but not yet completed scale job.
#[derive(Debug, Default)]
pub struct InFlightTracker {
    pending: HashMap<CacheKey, InFlightEntry>,
}

impl InFlightTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a key as in-flight.
    ///
    /// Returns `false` if a job for this key is already outstanding, in
    /// which case the caller must not dispatch a duplicate.
    pub fn try_begin(&mut self, key: CacheKey) -> bool {
        use std::collections::hash_map::Entry;
        match self.pending.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(InFlightEntry {
                    dispatched: Instant::now(),
                });
                true
            }
        }
    }

    /// Release a key. Idempotent: releasing an absent key is a no-op.
    ///
    /// Returns `true` if the key was actually outstanding, which lets
    /// the completion handler distinguish live results from stale ones
    /// discarded by an intervening invalidation.
    pub fn end(&mut self, key: &CacheKey) -> bool {
        self.pending.remove(key).is_some()
    }

    /// Returns `true` if a job for this key is outstanding.
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.pending.contains_key(key)
    }

    /// When the job for this key was dispatched, if it is outstanding.
    #[must_use]
    pub fn dispatched_at(&self, key: &CacheKey) -> Option<Instant> {
        self.pending.get(key).map(|entry| entry.dispatched)
    }

    /// Forget all outstanding jobs. Their results are discarded on
    /// arrival rather than cancelled.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Number of outstanding jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if no jobs are outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
