//! vitrine-cache: Asynchronous render cache for a scrollable image
//! gallery.
//!
//! A gallery view paints hundreds of cells while scrolling, but
//! scaling a raw image to its cell is too slow for the paint path.
//! This crate keeps painting non-blocking by splitting the work:
//!
//! - [`RenderCache::request_payload`] always answers immediately,
//!   from the rendered-payload cache or by composing a payload from
//!   the best image available right now (processed image, raw
//!   stopgap, loading placeholder, error placeholder).
//! - A single background thread scales images; jobs and completions
//!   flow through bounded channels that never block the caller.
//! - [`RenderCache::pump`] drains completed jobs between paints and
//!   invalidates the stopgap payloads they supersede.
//!
//! Cache identity is value-based: a [`CacheKey`] derives from the
//! item id, the raw image's [`ImageFingerprint`], the cell size and
//! the selection state, so a refreshed image or a resized view can
//! never serve stale pixels.
//!
//! This crate does **no I/O** -- it operates on decoded in-memory
//! images. Decoding and data-source interaction belong to the host
//! application.

pub mod cache;
pub mod compose;
pub mod inflight;
pub mod key;
pub mod pipeline;
pub mod stats;
pub mod types;
pub mod worker;

pub use compose::{
    BorderStyle, ComposeSource, LabelBlock, LabelPlacement, PayloadSource, Region,
    RenderedPayload, compose,
};
pub use key::{CacheKey, ImageFingerprint};
pub use pipeline::RenderCache;
pub use stats::CacheStats;
pub use types::{
    CacheError, ItemId, ItemInputs, ProcessedImage, RawImage, RenderCacheConfig, RgbaImage,
    TargetSize,
};
