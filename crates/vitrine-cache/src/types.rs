//! Shared types for the vitrine render-cache pipeline.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::key::ImageFingerprint;

/// Re-export `RgbaImage` so downstream crates can reference decoded
/// bitmaps without depending on `image` directly.
pub use image::RgbaImage;

/// Opaque, stable identity of a gallery item.
///
/// The data-source collaborator decides what this is (a database id, a
/// file path, a UUID); the cache only requires it to be stable for the
/// lifetime of the item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(String);

impl ItemId {
    /// Create a new item identity.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// A render target size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl TargetSize {
    /// Create a new target size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Length of the longest axis.
    #[must_use]
    pub const fn long_side(self) -> u32 {
        if self.width >= self.height {
            self.width
        } else {
            self.height
        }
    }

    /// Returns `true` if either axis is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A decoded raw image together with its value-based fingerprint.
///
/// The pixel data is shared read-only via `Arc`; the fingerprint is
/// stamped at construction and never derived from a memory address, so
/// a refreshed image under the same [`ItemId`] always produces a
/// different [`CacheKey`](crate::CacheKey).
#[derive(Debug, Clone)]
pub struct RawImage {
    pixels: Arc<RgbaImage>,
    fingerprint: ImageFingerprint,
}

impl RawImage {
    /// Wrap a decoded image, stamping a fresh generation fingerprint.
    ///
    /// This is the cheap constructor: call it once at decode time and
    /// keep the `RawImage` alive. Decoding the same bytes twice yields
    /// two distinct fingerprints; use
    /// [`with_content_fingerprint`](Self::with_content_fingerprint)
    /// when images are re-decoded between requests.
    #[must_use]
    pub fn new(image: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(image),
            fingerprint: ImageFingerprint::next_generation(),
        }
    }

    /// Wrap an already-shared image, stamping a fresh generation
    /// fingerprint.
    #[must_use]
    pub fn from_shared(pixels: Arc<RgbaImage>) -> Self {
        Self {
            pixels,
            fingerprint: ImageFingerprint::next_generation(),
        }
    }

    /// Wrap a decoded image, fingerprinting its pixel content.
    ///
    /// Hashes dimensions and raw bytes, so two images with identical
    /// content share a fingerprint regardless of when or where they
    /// were decoded. Costs one pass over the pixel data.
    #[must_use]
    pub fn with_content_fingerprint(image: RgbaImage) -> Self {
        let fingerprint = ImageFingerprint::content(&image);
        Self {
            pixels: Arc::new(image),
            fingerprint,
        }
    }

    /// Shared handle to the pixel data.
    #[must_use]
    pub const fn pixels(&self) -> &Arc<RgbaImage> {
        &self.pixels
    }

    /// The value-based fingerprint stamped at construction.
    #[must_use]
    pub const fn fingerprint(&self) -> ImageFingerprint {
        self.fingerprint
    }
}

/// Everything the cache needs to service one render request.
///
/// Owned by the caller and borrowed by the core for the duration of a
/// [`request_payload`](crate::RenderCache::request_payload) call.
#[derive(Debug, Clone)]
pub struct ItemInputs {
    /// Stable identity of the item.
    pub item: ItemId,
    /// Decoded raw image, or `None` when the data source has no image
    /// for this item (renders the error placeholder).
    pub image: Option<RawImage>,
    /// Display name, rendered as the primary label.
    pub label: String,
    /// Type/category text, rendered as the secondary label.
    pub kind: String,
    /// Size of the gallery cell this item is painted into.
    pub target: TargetSize,
    /// Whether the item is currently selected.
    pub selected: bool,
}

/// A scaled bitmap together with the target size it was scaled for.
///
/// Stored only under the [`CacheKey`](crate::CacheKey) it was computed
/// for.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    /// The scaled pixel data.
    pub image: Arc<RgbaImage>,
    /// The cell size the scale job was dispatched for.
    pub target: TargetSize,
}

/// Configuration for a [`RenderCache`](crate::RenderCache).
///
/// All parameters have defaults matching the reference gallery. Values
/// are validated by [`RenderCache::new`](crate::RenderCache::new);
/// capacities and queue depths must be non-zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderCacheConfig {
    /// Maximum number of entries in the rendered-payload cache.
    pub payload_capacity: usize,

    /// Maximum number of entries in the processed-image cache.
    pub image_capacity: usize,

    /// Depth of the bounded job queue in front of the transform worker.
    /// A full queue makes dispatch a no-op (the next paint retries);
    /// it never blocks the consumer.
    pub job_queue_depth: usize,

    /// Depth of the bounded completion queue. A full queue blocks the
    /// worker, never the consumer.
    pub completion_queue_depth: usize,

    /// Scale targets whose longest axis exceeds this threshold use a
    /// smoothing filter; smaller targets use the fastest filter.
    pub smooth_threshold: u32,
}

impl RenderCacheConfig {
    /// Default rendered-payload cache capacity.
    pub const DEFAULT_PAYLOAD_CAPACITY: usize = 200;
    /// Default processed-image cache capacity.
    pub const DEFAULT_IMAGE_CAPACITY: usize = 100;
    /// Default job queue depth.
    pub const DEFAULT_JOB_QUEUE_DEPTH: usize = 64;
    /// Default completion queue depth.
    pub const DEFAULT_COMPLETION_QUEUE_DEPTH: usize = 64;
    /// Default smooth/fast filter threshold in pixels.
    pub const DEFAULT_SMOOTH_THRESHOLD: u32 = 400;

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidConfig`] if any capacity or queue
    /// depth is zero.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.payload_capacity == 0 {
            return Err(CacheError::InvalidConfig(
                "payload_capacity must be non-zero".to_owned(),
            ));
        }
        if self.image_capacity == 0 {
            return Err(CacheError::InvalidConfig(
                "image_capacity must be non-zero".to_owned(),
            ));
        }
        if self.job_queue_depth == 0 {
            return Err(CacheError::InvalidConfig(
                "job_queue_depth must be non-zero".to_owned(),
            ));
        }
        if self.completion_queue_depth == 0 {
            return Err(CacheError::InvalidConfig(
                "completion_queue_depth must be non-zero".to_owned(),
            ));
        }
        Ok(())
    }
}

impl Default for RenderCacheConfig {
    fn default() -> Self {
        Self {
            payload_capacity: Self::DEFAULT_PAYLOAD_CAPACITY,
            image_capacity: Self::DEFAULT_IMAGE_CAPACITY,
            job_queue_depth: Self::DEFAULT_JOB_QUEUE_DEPTH,
            completion_queue_depth: Self::DEFAULT_COMPLETION_QUEUE_DEPTH,
            smooth_threshold: Self::DEFAULT_SMOOTH_THRESHOLD,
        }
    }
}

/// Errors that can occur when constructing a render cache.
///
/// Render requests themselves never fail: decode and scale problems
/// are absorbed into placeholder payloads.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The configuration is invalid.
    #[error("invalid render cache configuration: {0}")]
    InvalidConfig(String),

    /// The transform worker thread could not be spawned.
    #[error("failed to spawn transform worker thread: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // --- ItemId tests ---

    #[test]
    fn item_id_round_trips_string() {
        let id = ItemId::new("model-42");
        assert_eq!(id.as_str(), "model-42");
        assert_eq!(id.to_string(), "model-42");
    }

    #[test]
    fn item_id_equality() {
        assert_eq!(ItemId::from("a"), ItemId::new("a"));
        assert_ne!(ItemId::from("a"), ItemId::from("b"));
    }

    // --- TargetSize tests ---

    #[test]
    fn target_size_long_side() {
        assert_eq!(TargetSize::new(300, 400).long_side(), 400);
        assert_eq!(TargetSize::new(400, 300).long_side(), 400);
        assert_eq!(TargetSize::new(128, 128).long_side(), 128);
    }

    #[test]
    fn target_size_empty() {
        assert!(TargetSize::new(0, 400).is_empty());
        assert!(TargetSize::new(300, 0).is_empty());
        assert!(!TargetSize::new(1, 1).is_empty());
    }

    // --- RawImage tests ---

    #[test]
    fn raw_image_generations_are_distinct() {
        let a = RawImage::new(RgbaImage::new(2, 2));
        let b = RawImage::new(RgbaImage::new(2, 2));
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn raw_image_clone_shares_pixels_and_fingerprint() {
        let a = RawImage::new(RgbaImage::new(2, 2));
        let b = a.clone();
        assert!(Arc::ptr_eq(a.pixels(), b.pixels()));
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn content_fingerprint_matches_for_identical_pixels() {
        let img = RgbaImage::from_pixel(3, 3, image::Rgba([9, 9, 9, 255]));
        let a = RawImage::with_content_fingerprint(img.clone());
        let b = RawImage::with_content_fingerprint(img);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    // --- RenderCacheConfig tests ---

    #[test]
    fn config_defaults_are_valid() {
        let config = RenderCacheConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.payload_capacity, 200);
        assert_eq!(config.image_capacity, 100);
        assert_eq!(config.smooth_threshold, 400);
    }

    #[test]
    fn config_rejects_zero_capacities() {
        for mutate in [
            (|c: &mut RenderCacheConfig| c.payload_capacity = 0) as fn(&mut RenderCacheConfig),
            |c| c.image_capacity = 0,
            |c| c.job_queue_depth = 0,
            |c| c.completion_queue_depth = 0,
        ] {
            let mut config = RenderCacheConfig::default();
            mutate(&mut config);
            assert!(matches!(
                config.validate(),
                Err(CacheError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn config_serde_round_trip() {
        let config = RenderCacheConfig {
            payload_capacity: 10,
            image_capacity: 5,
            job_queue_depth: 8,
            completion_queue_depth: 8,
            smooth_threshold: 256,
        };
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: RenderCacheConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn invalid_config_error_display() {
        let err = CacheError::InvalidConfig("payload_capacity must be non-zero".to_owned());
        assert_eq!(
            err.to_string(),
            "invalid render cache configuration: payload_capacity must be non-zero",
        );
    }
}
