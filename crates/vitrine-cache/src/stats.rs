//! Counters describing cache behavior over the life of a pipeline.

use serde::{Deserialize, Serialize};

/// Monotonic counters maintained by the pipeline.
///
/// Strictly observational: nothing in the pipeline branches on these.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Payload requests answered straight from the payload cache.
    pub payload_hits: u64,
    /// Payload requests that had to compose a payload.
    pub payload_misses: u64,
    /// Payload compositions answered from the processed-image cache.
    pub image_hits: u64,
    /// Scale jobs handed to the worker.
    pub jobs_dispatched: u64,
    /// Scale jobs dropped because the job queue was full.
    pub jobs_abandoned: u64,
    /// Completions applied to the processed-image cache.
    pub completions_applied: u64,
    /// Completions discarded because their request was no longer
    /// outstanding.
    pub completions_discarded: u64,
    /// Entries evicted from the payload cache.
    pub payload_evictions: u64,
    /// Entries evicted from the processed-image cache.
    pub image_evictions: u64,
    /// Payloads removed by structural invalidation after a completion.
    pub payloads_invalidated: u64,
    /// Full-cache flushes (resize, model reset, hidden/low-memory).
    pub flushes: u64,
}

impl CacheStats {
    /// Total payload requests served.
    #[must_use]
    pub const fn payload_requests(&self) -> u64 {
        self.payload_hits + self.payload_misses
    }

    /// Payload hit rate in `[0, 1]`; zero before any request.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn payload_hit_rate(&self) -> f64 {
        let total = self.payload_requests();
        if total == 0 {
            0.0
        } else {
            self.payload_hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_is_zero_without_requests() {
        let stats = CacheStats::default();
        assert_eq!(stats.payload_requests(), 0);
        assert!((stats.payload_hit_rate() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn hit_rate_reflects_counters() {
        let stats = CacheStats {
            payload_hits: 3,
            payload_misses: 1,
            ..CacheStats::default()
        };
        assert_eq!(stats.payload_requests(), 4);
        assert!((stats.payload_hit_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn stats_serialize_as_flat_counters() {
        let stats = CacheStats {
            jobs_dispatched: 7,
            ..CacheStats::default()
        };
        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["jobs_dispatched"], 7);
        assert_eq!(json["payload_hits"], 0);
    }
}
