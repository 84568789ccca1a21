//! The render cache pipeline: the single consumer-side entry point.
//!
//! [`RenderCache`] owns all cache state — the rendered-payload cache,
//! the processed-image cache, the in-flight tracker and the worker
//! handle — and is driven from one thread. [`request_payload`]
//! answers every paint request immediately with the best payload
//! available right now; [`pump`] drains finished scale jobs between
//! paints. Neither ever blocks on the worker.
//!
//! [`request_payload`]: RenderCache::request_payload
//! [`pump`]: RenderCache::pump

use std::sync::Arc;

use crate::cache::CacheTable;
use crate::compose::{ComposeSource, RenderedPayload, compose};
use crate::inflight::InFlightTracker;
use crate::key::CacheKey;
use crate::stats::CacheStats;
use crate::types::{CacheError, ItemInputs, ProcessedImage, RenderCacheConfig, TargetSize};
use crate::worker::{DispatchOutcome, ScaleJob, TransformWorker, scale_target};

/// Asynchronous render cache for a scrollable gallery.
///
/// One instance per view. All methods take `&mut self`; the worker
/// thread never touches cache state and communicates only through the
/// bounded channels owned by the [`TransformWorker`] handle.
pub struct RenderCache {
    config: RenderCacheConfig,
    payloads: CacheTable<CacheKey, Arc<RenderedPayload>>,
    images: CacheTable<CacheKey, ProcessedImage>,
    inflight: InFlightTracker,
    worker: TransformWorker,
    current_target: Option<TargetSize>,
    stats: CacheStats,
}

impl RenderCache {
    /// Build a pipeline and spawn its worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidConfig`] for a zero capacity or
    /// queue depth, or [`CacheError::WorkerSpawn`] if the worker
    /// thread cannot be created.
    pub fn new(config: RenderCacheConfig) -> Result<Self, CacheError> {
        config.validate()?;
        let worker = TransformWorker::spawn(&config)?;
        Ok(Self {
            payloads: CacheTable::new(config.payload_capacity),
            images: CacheTable::new(config.image_capacity),
            inflight: InFlightTracker::new(),
            worker,
            current_target: None,
            stats: CacheStats::default(),
            config,
        })
    }

    /// Answer one paint request, always immediately.
    ///
    /// Returns the cached payload when one exists for the derived
    /// key. Otherwise composes a payload from the best available
    /// source — the cached processed image, the raw image as a
    /// stopgap, a loading placeholder while a job is in flight, or
    /// the error placeholder — caches it, and returns it. At most one
    /// scale job is dispatched per key.
    pub fn request_payload(&mut self, inputs: &ItemInputs) -> Arc<RenderedPayload> {
        let key = CacheKey::derive(inputs);
        if let Some(payload) = self.payloads.get(&key) {
            self.stats.payload_hits += 1;
            return Arc::clone(payload);
        }
        self.stats.payload_misses += 1;

        let payload = Arc::new(self.compose_miss(&key, inputs));
        let evicted = self.payloads.put(key, Arc::clone(&payload));
        self.stats.payload_evictions += to_u64(evicted);
        payload
    }

    /// Compose a payload for a key absent from the payload cache,
    /// dispatching a scale job when one is warranted.
    fn compose_miss(&mut self, key: &CacheKey, inputs: &ItemInputs) -> RenderedPayload {
        if let Some(processed) = self.images.get(key) {
            self.stats.image_hits += 1;
            return compose(inputs, ComposeSource::Processed(processed));
        }

        // A job for this key is already running; its completion will
        // invalidate this placeholder payload.
        if self.inflight.contains(key) {
            return compose(inputs, ComposeSource::Loading);
        }

        let Some(raw) = inputs.image.as_ref() else {
            return compose(inputs, ComposeSource::Error);
        };

        // A zero-dimension image is a decode failure: nothing to
        // scale, nothing to show but the error placeholder.
        if raw.pixels().width() == 0 || raw.pixels().height() == 0 {
            return compose(inputs, ComposeSource::Error);
        }

        if self.inflight.try_begin(key.clone()) {
            let pixels = raw.pixels();
            let job = ScaleJob {
                key: key.clone(),
                image: Arc::clone(pixels),
                target: scale_target(pixels.width(), pixels.height(), inputs.target),
            };
            match self.worker.dispatch(job) {
                DispatchOutcome::Queued => {
                    self.stats.jobs_dispatched += 1;
                }
                DispatchOutcome::Full | DispatchOutcome::Disconnected => {
                    // Release the claim so the next paint retries.
                    self.inflight.end(key);
                    self.stats.jobs_abandoned += 1;
                }
            }
        }
        compose(inputs, ComposeSource::Raw(raw.pixels()))
    }

    /// Drain finished scale jobs into the processed-image cache.
    ///
    /// Never blocks. Completions whose request is no longer
    /// outstanding (the tracker was cleared by a flush) are
    /// discarded. Applying a completion structurally invalidates
    /// every cached payload built on the same image dependency, in
    /// all selection states, so the next paint recomposes from the
    /// processed image.
    ///
    /// Returns the number of completions applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Some(done) = self.worker.try_complete() {
            if self.inflight.end(&done.key) {
                let invalidated = self
                    .payloads
                    .remove_where(|key| key.same_image_dependency(&done.key));
                self.stats.payloads_invalidated += to_u64(invalidated);
                // A key fully determines the scale target; an insert
                // under an existing key must be replacing an equal one.
                debug_assert!(
                    self.images
                        .peek(&done.key)
                        .is_none_or(|cached| cached.target == done.processed.target),
                    "completion target diverged from cached entry for its key",
                );
                let evicted = self.images.put(done.key, done.processed);
                self.stats.image_evictions += to_u64(evicted);
                self.stats.completions_applied += 1;
                applied += 1;
            } else {
                self.stats.completions_discarded += 1;
            }
        }
        applied
    }

    /// The view was resized. Flushes everything, since every cache
    /// key embeds the old cell size. A repeated notification with an
    /// unchanged size is a no-op.
    pub fn notify_resized(&mut self, target: TargetSize) {
        if self.current_target == Some(target) {
            return;
        }
        self.current_target = Some(target);
        self.flush();
    }

    /// The data source was reset; all cached identities are suspect.
    pub fn notify_model_reset(&mut self) {
        self.flush();
    }

    /// The view was hidden, or the host signalled memory pressure.
    ///
    /// Drops both caches but leaves the in-flight tracker intact, so
    /// results of jobs already running still land in the image cache.
    pub fn notify_hidden_or_low_memory(&mut self) {
        self.payloads.clear();
        self.images.clear();
        self.stats.flushes += 1;
    }

    fn flush(&mut self) {
        self.payloads.clear();
        self.images.clear();
        self.inflight.clear();
        self.stats.flushes += 1;
    }

    /// Snapshot of the counters.
    #[must_use]
    pub const fn stats(&self) -> CacheStats {
        self.stats
    }

    /// The configuration the pipeline was built with.
    #[must_use]
    pub const fn config(&self) -> &RenderCacheConfig {
        &self.config
    }

    /// Number of cached payloads.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        self.payloads.len()
    }

    /// Number of cached processed images.
    #[must_use]
    pub fn image_len(&self) -> usize {
        self.images.len()
    }

    /// Number of scale jobs currently outstanding.
    #[must_use]
    pub fn inflight_len(&self) -> usize {
        self.inflight.len()
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn to_u64(count: usize) -> u64 {
    count as u64
}
