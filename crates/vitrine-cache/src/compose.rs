//! Render composition: build a display-ready payload from whatever
//! image is available right now.
//!
//! [`compose`] is a pure, synchronous function — no I/O, no shared
//! scratch surface. It takes the request inputs plus the best
//! currently-available image source and returns an owned
//! [`RenderedPayload`]: a background-filled canvas with the image
//! blitted in and the border drawn, alongside the structured label
//! block and the style that produced it.
//!
//! Layout follows the reference gallery: a margin of 2.5% of the cell
//! width, real images top-aligned and placeholders centered, a 3px
//! gradient outline for selected items and a 1px plain outline
//! otherwise.

use std::sync::{Arc, OnceLock};

use image::{Rgba, RgbaImage, imageops};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};

use crate::types::{ItemInputs, ProcessedImage, TargetSize};

/// Cell background fill.
pub const BACKGROUND: [u8; 4] = [0x31, 0x32, 0x44, 0xFF];
/// Loading placeholder fill; also the unselected border color.
pub const MUTED: [u8; 4] = [0x45, 0x47, 0x5A, 0xFF];
/// Selection gradient start.
pub const GRADIENT_FROM: [u8; 4] = [0x89, 0xB4, 0xFA, 0xFF];
/// Selection gradient end.
pub const GRADIENT_TO: [u8; 4] = [0x74, 0xC7, 0xEC, 0xFF];
/// Foreground used for the error placeholder cross.
pub const FOREGROUND: [u8; 4] = [0xCD, 0xD6, 0xF4, 0xFF];

/// Margin as a fraction of the cell width.
const MARGIN_RATIO: f32 = 0.025;
/// Loading placeholder edge length in pixels.
const LOADING_PLACEHOLDER_SIDE: u32 = 200;
/// Labels go below the image while it occupies at most this fraction
/// of the cell height, beside it otherwise.
const LABEL_BELOW_MAX_IMAGE_SHARE: f64 = 0.7;
/// Border width when selected.
const SELECTED_BORDER_WIDTH: u32 = 3;
/// Border width when not selected.
const PLAIN_BORDER_WIDTH: u32 = 1;

/// The image the composer was given to work with.
pub enum ComposeSource<'a> {
    /// A cached processed image at the right scale.
    Processed(&'a ProcessedImage),
    /// The raw, unscaled image as a stopgap while a scale job runs.
    Raw(&'a Arc<RgbaImage>),
    /// No image yet; a scale job is in flight.
    Loading,
    /// The item has no usable image.
    Error,
}

/// Which image source a payload was built from.
///
/// Payloads built from [`Raw`](Self::Raw) or [`Loading`](Self::Loading)
/// are upgraded to [`Processed`](Self::Processed) once the scale job
/// lands and the payload is rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadSource {
    /// Built from the cached processed image.
    Processed,
    /// Built from the raw unscaled image.
    Raw,
    /// Built from the loading placeholder.
    Loading,
    /// Built from the error placeholder.
    Error,
}

impl ComposeSource<'_> {
    const fn kind(&self) -> PayloadSource {
        match self {
            Self::Processed(_) => PayloadSource::Processed,
            Self::Raw(_) => PayloadSource::Raw,
            Self::Loading => PayloadSource::Loading,
            Self::Error => PayloadSource::Error,
        }
    }
}

/// A rectangular region in cell coordinates.
///
/// Coordinates are signed: a raw image wider than the cell blits at a
/// negative x and is clipped by the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Left edge.
    pub x: i64,
    /// Top edge.
    pub y: i64,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Where the label block sits relative to the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelPlacement {
    /// In the band under the image.
    Below,
    /// To the right of the image.
    Beside,
}

/// The text block of a payload: name and type plus computed layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelBlock {
    /// Primary label (item name).
    pub name: String,
    /// Secondary label (item type/category).
    pub kind: String,
    /// Placement relative to the image.
    pub placement: LabelPlacement,
    /// Region reserved for the text.
    pub region: Region,
}

/// Outline style of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BorderStyle {
    /// Thin solid outline (unselected).
    Plain {
        /// Outline color.
        color: [u8; 4],
        /// Outline width in pixels.
        width: u32,
    },
    /// Gradient outline (selected).
    Gradient {
        /// Color at the top-left.
        from: [u8; 4],
        /// Color at the bottom-right.
        to: [u8; 4],
        /// Outline width in pixels.
        width: u32,
    },
}

/// A display-ready composite for one gallery cell.
///
/// Valid only for the cache key it was built under; never mutated in
/// place, only replaced.
#[derive(Debug, Clone)]
pub struct RenderedPayload {
    /// The composed bitmap at the cell size.
    pub canvas: RgbaImage,
    /// Where the image landed on the canvas.
    pub image_region: Region,
    /// The text block.
    pub label: LabelBlock,
    /// The outline drawn on the canvas.
    pub border: BorderStyle,
    /// Which image source the canvas was built from.
    pub source: PayloadSource,
    /// The cell size this payload was composed for.
    pub target: TargetSize,
}

/// Build a payload from the request inputs and the best available
/// image source.
#[must_use]
pub fn compose(inputs: &ItemInputs, source: ComposeSource<'_>) -> RenderedPayload {
    let cell = inputs.target;
    let mut canvas = RgbaImage::from_pixel(cell.width, cell.height, Rgba(BACKGROUND));
    let margin = margin_for(cell.width);

    let kind = source.kind();
    let error_image;
    let (display, top_aligned): (&RgbaImage, bool) = match source {
        ComposeSource::Processed(processed) => (processed.image.as_ref(), true),
        ComposeSource::Raw(raw) => (raw.as_ref(), true),
        ComposeSource::Loading => (loading_placeholder(), false),
        ComposeSource::Error => {
            error_image = error_placeholder((cell.width / 2).max(1));
            (&error_image, false)
        }
    };

    let image_region = blit(&mut canvas, display, margin, top_aligned);
    let label = layout_label(inputs, cell, margin, image_region);
    let border = border_style(inputs.selected);
    draw_border(&mut canvas, cell, margin, border);

    RenderedPayload {
        canvas,
        image_region,
        label,
        border,
        source: kind,
        target: cell,
    }
}

/// Margin in pixels for a cell of the given width, at least 1.
#[must_use]
pub fn margin_for(cell_width: u32) -> u32 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let margin = (cell_width as f32 * MARGIN_RATIO) as u32;
    margin.max(1)
}

/// Copy `image` onto `canvas`, horizontally centered, either
/// top-aligned under the margin or vertically centered. Oversized
/// images are clipped by the canvas.
fn blit(canvas: &mut RgbaImage, image: &RgbaImage, margin: u32, top_aligned: bool) -> Region {
    let x = (i64::from(canvas.width()) - i64::from(image.width())) / 2;
    let y = if top_aligned {
        i64::from(margin)
    } else {
        (i64::from(canvas.height()) - i64::from(image.height())) / 2
    };
    imageops::overlay(canvas, image, x, y);
    Region {
        x,
        y,
        width: image.width(),
        height: image.height(),
    }
}

/// Lay the label block out below or beside the image depending on the
/// vertical space the image takes up.
fn layout_label(
    inputs: &ItemInputs,
    cell: TargetSize,
    margin: u32,
    image_region: Region,
) -> LabelBlock {
    let image_share = if cell.height == 0 {
        1.0
    } else {
        f64::from(image_region.height) / f64::from(cell.height)
    };

    let inner_right = i64::from(cell.width) - i64::from(margin);
    let inner_bottom = i64::from(cell.height) - i64::from(margin);

    let (placement, region) = if image_share <= LABEL_BELOW_MAX_IMAGE_SHARE {
        let top = image_region.y + i64::from(image_region.height);
        let region = Region {
            x: i64::from(margin),
            y: top,
            width: cell.width.saturating_sub(margin * 2),
            height: clamp_extent(inner_bottom - top),
        };
        (LabelPlacement::Below, region)
    } else {
        let left = image_region.x + i64::from(image_region.width);
        let region = Region {
            x: left,
            y: image_region.y,
            width: clamp_extent(inner_right - left),
            height: image_region.height,
        };
        (LabelPlacement::Beside, region)
    };

    LabelBlock {
        name: inputs.label.clone(),
        kind: inputs.kind.clone(),
        placement,
        region,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_extent(extent: i64) -> u32 {
    extent.clamp(0, i64::from(u32::MAX)) as u32
}

/// Outline style for the given selection state.
#[must_use]
pub const fn border_style(selected: bool) -> BorderStyle {
    if selected {
        BorderStyle::Gradient {
            from: GRADIENT_FROM,
            to: GRADIENT_TO,
            width: SELECTED_BORDER_WIDTH,
        }
    } else {
        BorderStyle::Plain {
            color: MUTED,
            width: PLAIN_BORDER_WIDTH,
        }
    }
}

/// Draw the outline at the margin inset. Cells too small for the inset
/// get no border.
fn draw_border(canvas: &mut RgbaImage, cell: TargetSize, margin: u32, border: BorderStyle) {
    let Some(inner_width) = cell.width.checked_sub(margin * 2).filter(|&w| w > 0) else {
        return;
    };
    let Some(inner_height) = cell.height.checked_sub(margin * 2).filter(|&h| h > 0) else {
        return;
    };

    match border {
        BorderStyle::Plain { color, width } => {
            for ring in 0..width.min(inner_width / 2).max(1) {
                #[allow(clippy::cast_possible_wrap)]
                let rect = Rect::at((margin + ring) as i32, (margin + ring) as i32).of_size(
                    inner_width.saturating_sub(ring * 2).max(1),
                    inner_height.saturating_sub(ring * 2).max(1),
                );
                draw_hollow_rect_mut(canvas, rect, Rgba(color));
            }
        }
        BorderStyle::Gradient { from, to, width } => {
            draw_gradient_border(canvas, margin, inner_width, inner_height, from, to, width);
        }
    }
}

/// Hollow rectangle rings with the color interpolated from the
/// top-left corner to the bottom-right corner.
fn draw_gradient_border(
    canvas: &mut RgbaImage,
    margin: u32,
    inner_width: u32,
    inner_height: u32,
    from: [u8; 4],
    to: [u8; 4],
    width: u32,
) {
    let span = (f64::from(inner_width) + f64::from(inner_height)).max(1.0);
    let mut paint = |x: u32, y: u32| {
        let t = (f64::from(x - margin) + f64::from(y - margin)) / span;
        canvas.put_pixel(x, y, Rgba(lerp_color(from, to, t)));
    };

    for ring in 0..width.min(inner_width / 2).max(1) {
        let left = margin + ring;
        let top = margin + ring;
        let right = margin + inner_width.saturating_sub(ring + 1);
        let bottom = margin + inner_height.saturating_sub(ring + 1);
        if right <= left || bottom <= top {
            break;
        }
        for x in left..=right {
            paint(x, top);
            paint(x, bottom);
        }
        for y in top..=bottom {
            paint(left, y);
            paint(right, y);
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lerp_color(from: [u8; 4], to: [u8; 4], t: f64) -> [u8; 4] {
    let t = t.clamp(0.0, 1.0);
    let mut out = [0_u8; 4];
    for (slot, (&a, &b)) in out.iter_mut().zip(from.iter().zip(to.iter())) {
        *slot = f64::from(a).mul_add(1.0 - t, f64::from(b) * t).round() as u8;
    }
    out
}

/// The shared loading placeholder: a muted solid square.
fn loading_placeholder() -> &'static RgbaImage {
    static PLACEHOLDER: OnceLock<RgbaImage> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        RgbaImage::from_pixel(
            LOADING_PLACEHOLDER_SIDE,
            LOADING_PLACEHOLDER_SIDE,
            Rgba(MUTED),
        )
    })
}

/// The error placeholder: a muted square with a drawn cross, sized for
/// the requesting cell.
fn error_placeholder(side: u32) -> RgbaImage {
    let mut image = RgbaImage::from_pixel(side, side, Rgba(MUTED));
    #[allow(clippy::cast_precision_loss)]
    let far = (side.saturating_sub(1)) as f32;
    let inset = far * 0.25;
    draw_line_segment_mut(
        &mut image,
        (inset, inset),
        (far - inset, far - inset),
        Rgba(FOREGROUND),
    );
    draw_line_segment_mut(
        &mut image,
        (far - inset, inset),
        (inset, far - inset),
        Rgba(FOREGROUND),
    );
    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ItemId;

    fn inputs(selected: bool) -> ItemInputs {
        ItemInputs {
            item: ItemId::from("A"),
            image: None,
            label: "name".to_owned(),
            kind: "type".to_owned(),
            target: TargetSize::new(300, 400),
            selected,
        }
    }

    fn small_image(width: u32, height: u32) -> Arc<RgbaImage> {
        Arc::new(RgbaImage::from_pixel(
            width,
            height,
            image::Rgba([200, 100, 50, 255]),
        ))
    }

    // --- Source selection bookkeeping ---

    #[test]
    fn processed_source_is_recorded() {
        let processed = ProcessedImage {
            image: small_image(100, 150),
            target: TargetSize::new(300, 400),
        };
        let payload = compose(&inputs(false), ComposeSource::Processed(&processed));
        assert_eq!(payload.source, PayloadSource::Processed);
        assert_eq!(payload.image_region.width, 100);
        assert_eq!(payload.image_region.height, 150);
    }

    #[test]
    fn raw_source_is_recorded() {
        let raw = small_image(60, 60);
        let payload = compose(&inputs(false), ComposeSource::Raw(&raw));
        assert_eq!(payload.source, PayloadSource::Raw);
    }

    #[test]
    fn loading_source_uses_placeholder() {
        let payload = compose(&inputs(false), ComposeSource::Loading);
        assert_eq!(payload.source, PayloadSource::Loading);
        assert_eq!(payload.image_region.width, 200);
        assert_eq!(payload.image_region.height, 200);
    }

    #[test]
    fn error_source_sizes_placeholder_to_half_cell_width() {
        let payload = compose(&inputs(false), ComposeSource::Error);
        assert_eq!(payload.source, PayloadSource::Error);
        assert_eq!(payload.image_region.width, 150);
        assert_eq!(payload.image_region.height, 150);
    }

    // --- Canvas and layout ---

    #[test]
    fn canvas_matches_cell_size() {
        let payload = compose(&inputs(false), ComposeSource::Loading);
        assert_eq!(payload.canvas.width(), 300);
        assert_eq!(payload.canvas.height(), 400);
        assert_eq!(payload.target, TargetSize::new(300, 400));
    }

    #[test]
    fn real_image_is_top_aligned_placeholder_centered() {
        let raw = small_image(60, 60);
        let real = compose(&inputs(false), ComposeSource::Raw(&raw));
        assert_eq!(real.image_region.y, i64::from(margin_for(300)));

        let loading = compose(&inputs(false), ComposeSource::Loading);
        assert_eq!(loading.image_region.y, (400 - 200) / 2);
    }

    #[test]
    fn image_is_horizontally_centered() {
        let raw = small_image(100, 100);
        let payload = compose(&inputs(false), ComposeSource::Raw(&raw));
        assert_eq!(payload.image_region.x, (300 - 100) / 2);
    }

    #[test]
    fn short_image_puts_label_below() {
        let raw = small_image(100, 100); // 25% of cell height
        let payload = compose(&inputs(false), ComposeSource::Raw(&raw));
        assert_eq!(payload.label.placement, LabelPlacement::Below);
        assert_eq!(
            payload.label.region.y,
            payload.image_region.y + i64::from(payload.image_region.height),
        );
        assert_eq!(payload.label.name, "name");
        assert_eq!(payload.label.kind, "type");
    }

    #[test]
    fn tall_image_puts_label_beside() {
        let raw = small_image(100, 390); // ~98% of cell height
        let payload = compose(&inputs(false), ComposeSource::Raw(&raw));
        assert_eq!(payload.label.placement, LabelPlacement::Beside);
        assert_eq!(
            payload.label.region.x,
            payload.image_region.x + i64::from(payload.image_region.width),
        );
    }

    #[test]
    fn oversized_raw_image_clips_without_panicking() {
        let raw = small_image(900, 1200);
        let payload = compose(&inputs(false), ComposeSource::Raw(&raw));
        assert!(payload.image_region.x < 0);
        assert_eq!(payload.canvas.width(), 300);
    }

    #[test]
    fn zero_sized_cell_composes_empty_canvas() {
        let mut zero = inputs(false);
        zero.target = TargetSize::new(0, 0);
        let payload = compose(&zero, ComposeSource::Error);
        assert_eq!(payload.canvas.width(), 0);
        assert_eq!(payload.canvas.height(), 0);
    }

    // --- Borders ---

    #[test]
    fn unselected_payload_has_plain_border() {
        let payload = compose(&inputs(false), ComposeSource::Loading);
        assert_eq!(
            payload.border,
            BorderStyle::Plain {
                color: MUTED,
                width: 1,
            },
        );
        // The border pixel at the margin inset carries the muted color.
        let margin = margin_for(300);
        assert_eq!(payload.canvas.get_pixel(margin, margin).0, MUTED);
    }

    #[test]
    fn selected_payload_has_gradient_border() {
        let payload = compose(&inputs(true), ComposeSource::Loading);
        assert_eq!(
            payload.border,
            BorderStyle::Gradient {
                from: GRADIENT_FROM,
                to: GRADIENT_TO,
                width: 3,
            },
        );
        // Top-left border pixel is at the gradient start.
        let margin = margin_for(300);
        assert_eq!(payload.canvas.get_pixel(margin, margin).0, GRADIENT_FROM);
    }

    #[test]
    fn gradient_progresses_along_the_diagonal() {
        let payload = compose(&inputs(true), ComposeSource::Loading);
        let margin = margin_for(300);
        let near = payload.canvas.get_pixel(margin, margin).0;
        let far = payload
            .canvas
            .get_pixel(300 - margin - 1, 400 - margin - 1)
            .0;
        assert_eq!(near, GRADIENT_FROM);
        assert_eq!(far, GRADIENT_TO);
    }

    // --- Purity ---

    #[test]
    fn compose_is_deterministic() {
        let raw = small_image(80, 80);
        let a = compose(&inputs(true), ComposeSource::Raw(&raw));
        let b = compose(&inputs(true), ComposeSource::Raw(&raw));
        assert_eq!(a.canvas.as_raw(), b.canvas.as_raw());
        assert_eq!(a.image_region, b.image_region);
        assert_eq!(a.label, b.label);
    }
}
