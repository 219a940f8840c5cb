//! Pixel-level mask utilities.
//!
//! Everything here is a pure function over [`RgbaImage`] bitmaps. A mask is
//! an RGBA bitmap whose alpha channel carries membership (0 = background,
//! 255 = foreground); its RGB channels are ignored by every function except
//! where noted.
//!
//! # Transport format
//!
//! [`serialize_mask_bytes`] extracts one alpha byte per pixel in row-major
//! order. [`encode_mask_text`] wraps those bytes in standard base64 for JSON
//! payloads, and [`decode_mask_text`] is its inverse.

mod feather;

pub use feather::feather;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{Rgba, RgbaImage, imageops};

use crate::{ClickmaskError, Result};

/// Tint applied over removed (background) regions by [`render_overlay`]: red at ~31% opacity.
pub const OVERLAY_TINT: Rgba<u8> = Rgba([255, 0, 0, 80]);

/// Light checkerboard cell (#ffffff).
pub const CHECKER_LIGHT: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Dark checkerboard cell (#cccccc).
pub const CHECKER_DARK: Rgba<u8> = Rgba([204, 204, 204, 255]);

/// Default checkerboard cell size in pixels.
pub const DEFAULT_CHECKER_CELL: u32 = 10;

/// Copy `source` RGB and take alpha from `mask` at the same coordinate.
///
/// # Panics
///
/// Panics if the two bitmaps differ in size. Callers are expected to decode
/// masks at the canvas size; this function never resamples.
#[must_use = "returns the composited bitmap"]
pub fn composite_preview(source: &RgbaImage, mask: &RgbaImage) -> RgbaImage {
    assert_eq!(
        source.dimensions(),
        mask.dimensions(),
        "source and mask must have identical dimensions"
    );

    let mut out = source.clone();
    for (dst, m) in out.pixels_mut().zip(mask.pixels()) {
        dst.0[3] = m.0[3];
    }
    out
}

/// Highlight layer: [`OVERLAY_TINT`] where the mask is background, fully
/// transparent where it is not.
#[must_use = "returns the overlay bitmap"]
pub fn render_overlay(mask: &RgbaImage) -> RgbaImage {
    let mut overlay = RgbaImage::new(mask.width(), mask.height());
    for (dst, m) in overlay.pixels_mut().zip(mask.pixels()) {
        if m.0[3] == 0 {
            *dst = OVERLAY_TINT;
        }
    }
    overlay
}

/// Alpha channel as one byte per pixel, row-major (`width * height` bytes).
pub fn serialize_mask_bytes(mask: &RgbaImage) -> Vec<u8> {
    mask.pixels().map(|p| p.0[3]).collect()
}

/// Base64 text form of [`serialize_mask_bytes`].
pub fn encode_mask_text(mask: &RgbaImage) -> String {
    STANDARD.encode(serialize_mask_bytes(mask))
}

/// Decode the base64 text form back into alpha bytes.
///
/// Fails if the text is not valid base64 or does not hold exactly
/// `width * height` bytes.
pub fn decode_mask_text(text: &str, width: u32, height: u32) -> Result<Vec<u8>> {
    let bytes = STANDARD
        .decode(text.trim())
        .map_err(|e| ClickmaskError::InvalidInput(format!("mask is not valid base64: {e}")))?;

    let expected = width as usize * height as usize;
    if bytes.len() != expected {
        return Err(ClickmaskError::InvalidInput(format!(
            "mask holds {} bytes, expected {} for {}x{}",
            bytes.len(),
            expected,
            width,
            height
        )));
    }
    Ok(bytes)
}

/// Rebuild a mask bitmap (white RGB) from alpha bytes.
pub fn mask_from_bytes(bytes: &[u8], width: u32, height: u32) -> Result<RgbaImage> {
    let expected = width as usize * height as usize;
    if bytes.len() != expected {
        return Err(ClickmaskError::InvalidInput(format!(
            "mask holds {} bytes, expected {} for {}x{}",
            bytes.len(),
            expected,
            width,
            height
        )));
    }
    Ok(RgbaImage::from_fn(width, height, |x, y| {
        Rgba([255, 255, 255, bytes[(y * width + x) as usize]])
    }))
}

/// Fill a new bitmap with a two-tone checkerboard.
///
/// Cell (0, 0) is [`CHECKER_LIGHT`]. A `cell_size` of zero is treated as one.
#[must_use = "returns the checkerboard bitmap"]
pub fn draw_checkerboard(width: u32, height: u32, cell_size: u32) -> RgbaImage {
    let mut canvas = RgbaImage::new(width, height);
    draw_checkerboard_into(&mut canvas, cell_size);
    canvas
}

/// Overwrite every pixel of `canvas` with the checkerboard pattern.
pub fn draw_checkerboard_into(canvas: &mut RgbaImage, cell_size: u32) {
    let cell = cell_size.max(1);
    for (x, y, px) in canvas.enumerate_pixels_mut() {
        *px = if (x / cell + y / cell) % 2 == 0 {
            CHECKER_LIGHT
        } else {
            CHECKER_DARK
        };
    }
}

/// What the editor shows: the masked source over a checkerboard.
///
/// # Panics
///
/// Panics if `source` and `mask` differ in size (see [`composite_preview`]).
#[must_use = "returns the preview bitmap"]
pub fn render_masked_preview(source: &RgbaImage, mask: &RgbaImage, cell_size: u32) -> RgbaImage {
    let composite = composite_preview(source, mask);
    let mut canvas = draw_checkerboard(source.width(), source.height(), cell_size);
    imageops::overlay(&mut canvas, &composite, 0, 0);
    canvas
}

/// Number of pixels with non-zero alpha.
pub fn foreground_pixel_count(mask: &RgbaImage) -> usize {
    mask.pixels().filter(|p| p.0[3] > 0).count()
}
