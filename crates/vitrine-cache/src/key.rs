//! Identity derivation: stable cache keys for render requests.
//!
//! A [`CacheKey`] is a pure function of (item identity, raw-image
//! fingerprint, target size, selection flag). Two requests with equal
//! keys request an identical output, and a changed raw image — even
//! under the same item identity, e.g. after a data refresh — always
//! changes the key. Fingerprints are value-based (content hash or
//! decode-time generation id), never a memory address, which is what
//! prevents stale-image aliasing after a refresh.

use std::hash::Hasher;
use std::sync::atomic::{AtomicU64, Ordering};

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::types::{ItemId, ItemInputs, TargetSize};

/// Process-global counter for generation fingerprints.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(0);

/// High bit separates the generation-id space from the content-hash
/// space, so the two constructors can never alias each other.
const GENERATION_TAG: u64 = 1 << 63;

/// Value-based identity of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageFingerprint(u64);

impl ImageFingerprint {
    /// Fingerprint an image by hashing its dimensions and pixel bytes
    /// with SipHash-1-3.
    ///
    /// Deterministic across processes: identical pixel content always
    /// yields an identical fingerprint.
    #[must_use]
    pub fn content(image: &RgbaImage) -> Self {
        let mut hasher = siphasher::sip::SipHasher13::new();
        hasher.write_u32(image.width());
        hasher.write_u32(image.height());
        hasher.write(image.as_raw());
        Self(hasher.finish() & !GENERATION_TAG)
    }

    /// Draw a fresh generation fingerprint from the process-global
    /// counter.
    ///
    /// Intended to be stamped once at decode time; every call returns a
    /// distinct value.
    #[must_use]
    pub fn next_generation() -> Self {
        Self(NEXT_GENERATION.fetch_add(1, Ordering::Relaxed) | GENERATION_TAG)
    }
}

/// Derived identity used to index both the processed-image cache and
/// the rendered-payload cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Stable item identity.
    pub item: ItemId,
    /// Fingerprint of the raw image, or `None` when the item has no
    /// image.
    pub fingerprint: Option<ImageFingerprint>,
    /// Target cell size the output is rendered for.
    pub target: TargetSize,
    /// Selection state the output is rendered for.
    pub selected: bool,
}

impl CacheKey {
    /// Derive the cache key for a render request.
    ///
    /// Pure and deterministic: identical inputs always yield an
    /// identical key.
    #[must_use]
    pub fn derive(inputs: &ItemInputs) -> Self {
        Self {
            item: inputs.item.clone(),
            fingerprint: inputs.image.as_ref().map(crate::RawImage::fingerprint),
            target: inputs.target,
            selected: inputs.selected,
        }
    }

    /// Returns `true` if `other` depends on the same processed image:
    /// same item, same raw-image fingerprint, same target size,
    /// regardless of selection state.
    ///
    /// Used for structural invalidation when a scale job completes.
    #[must_use]
    pub fn same_image_dependency(&self, other: &Self) -> bool {
        self.item == other.item
            && self.fingerprint == other.fingerprint
            && self.target == other.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RawImage;

    fn inputs(id: &str, image: Option<RawImage>, selected: bool) -> ItemInputs {
        ItemInputs {
            item: ItemId::from(id),
            image,
            label: "name".to_owned(),
            kind: "type".to_owned(),
            target: TargetSize::new(300, 400),
            selected,
        }
    }

    // --- Fingerprint tests ---

    #[test]
    fn content_fingerprint_is_deterministic() {
        let img = RgbaImage::from_pixel(4, 4, image::Rgba([1, 2, 3, 255]));
        assert_eq!(
            ImageFingerprint::content(&img),
            ImageFingerprint::content(&img.clone()),
        );
    }

    #[test]
    fn content_fingerprint_changes_with_pixels() {
        let a = RgbaImage::from_pixel(4, 4, image::Rgba([1, 2, 3, 255]));
        let b = RgbaImage::from_pixel(4, 4, image::Rgba([1, 2, 4, 255]));
        assert_ne!(ImageFingerprint::content(&a), ImageFingerprint::content(&b));
    }

    #[test]
    fn content_fingerprint_changes_with_dimensions() {
        // Same byte count, different shape.
        let a = RgbaImage::new(2, 8);
        let b = RgbaImage::new(8, 2);
        assert_ne!(ImageFingerprint::content(&a), ImageFingerprint::content(&b));
    }

    #[test]
    fn generation_fingerprints_never_repeat() {
        let a = ImageFingerprint::next_generation();
        let b = ImageFingerprint::next_generation();
        assert_ne!(a, b);
    }

    #[test]
    fn generation_and_content_spaces_are_disjoint() {
        let img = RgbaImage::new(1, 1);
        let content = ImageFingerprint::content(&img);
        let generation = ImageFingerprint::next_generation();
        assert_ne!(content, generation);
        assert_ne!(content.0 & GENERATION_TAG, GENERATION_TAG);
        assert_eq!(generation.0 & GENERATION_TAG, GENERATION_TAG);
    }

    // --- CacheKey tests ---

    #[test]
    fn derive_is_deterministic() {
        let raw = RawImage::new(RgbaImage::new(8, 8));
        let a = CacheKey::derive(&inputs("A", Some(raw.clone()), false));
        let b = CacheKey::derive(&inputs("A", Some(raw), false));
        assert_eq!(a, b);
    }

    #[test]
    fn refreshed_image_changes_key() {
        // Same item id, re-decoded image: the generation fingerprint
        // differs, so the key must differ.
        let before = CacheKey::derive(&inputs(
            "A",
            Some(RawImage::new(RgbaImage::new(8, 8))),
            false,
        ));
        let after = CacheKey::derive(&inputs(
            "A",
            Some(RawImage::new(RgbaImage::new(8, 8))),
            false,
        ));
        assert_ne!(before, after);
    }

    #[test]
    fn selection_changes_key() {
        let raw = RawImage::new(RgbaImage::new(8, 8));
        let unselected = CacheKey::derive(&inputs("A", Some(raw.clone()), false));
        let selected = CacheKey::derive(&inputs("A", Some(raw), true));
        assert_ne!(unselected, selected);
    }

    #[test]
    fn absent_image_derives_none_fingerprint() {
        let key = CacheKey::derive(&inputs("A", None, false));
        assert_eq!(key.fingerprint, None);
    }

    #[test]
    fn same_image_dependency_ignores_selection() {
        let raw = RawImage::new(RgbaImage::new(8, 8));
        let unselected = CacheKey::derive(&inputs("A", Some(raw.clone()), false));
        let selected = CacheKey::derive(&inputs("A", Some(raw), true));
        assert!(unselected.same_image_dependency(&selected));
    }

    #[test]
    fn same_image_dependency_requires_same_target() {
        let raw = RawImage::new(RgbaImage::new(8, 8));
        let mut a = inputs("A", Some(raw.clone()), false);
        let mut b = inputs("A", Some(raw), false);
        a.target = TargetSize::new(300, 400);
        b.target = TargetSize::new(450, 650);
        assert!(!CacheKey::derive(&a).same_image_dependency(&CacheKey::derive(&b)));
    }
}
