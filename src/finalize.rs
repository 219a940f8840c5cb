//! Applying a preview-sized mask to the full-resolution original.
//!
//! The interactive session works on a downscaled canvas. Once the user is
//! happy with the selection, the mask is stretched back over the original
//! image, optionally softened, and used as its alpha channel.

use std::io::Cursor;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageFormat, RgbaImage};
use tracing::debug;

use crate::mask::{decode_mask_text, feather};
use crate::{ClickmaskError, Result};

/// Gaussian sigma per unit of feather radius.
const FEATHER_SIGMA_SCALE: f32 = 0.75;

/// Soften a canvas-sized mask before it is encoded for application.
///
/// First of the two feather stages: the radius is rounded to whole canvas
/// pixels here, and [`apply_mask_to_original`] blurs again at full
/// resolution with the same radius. Non-positive radii return a copy.
pub fn feather_canvas_mask(mask: &RgbaImage, feather_radius: f32) -> RgbaImage {
    feather(mask, feather_radius.round() as i32)
}

/// Cut `original` out with a mask given as row-major alpha bytes.
///
/// The mask is resized to the original's dimensions with nearest-neighbour
/// sampling, blurred with `sigma = feather_radius * 0.75` when the radius is
/// positive, then multiplied into the original's alpha.
pub fn apply_mask_to_original(
    original: &DynamicImage,
    mask_bytes: &[u8],
    mask_width: u32,
    mask_height: u32,
    feather_radius: f32,
) -> Result<RgbaImage> {
    if mask_width == 0 || mask_height == 0 {
        return Err(ClickmaskError::InvalidInput(format!(
            "mask must be non-empty, got {mask_width}x{mask_height}"
        )));
    }
    let expected = mask_width as usize * mask_height as usize;
    let mask = GrayImage::from_raw(mask_width, mask_height, mask_bytes.to_vec())
        .filter(|_| mask_bytes.len() == expected)
        .ok_or_else(|| {
            ClickmaskError::InvalidInput(format!(
                "mask holds {} bytes, expected {expected} for {mask_width}x{mask_height}",
                mask_bytes.len()
            ))
        })?;

    let mut out = original.to_rgba8();
    let (width, height) = out.dimensions();
    let mut alpha = imageops::resize(&mask, width, height, FilterType::Nearest);
    if feather_radius > 0.0 {
        alpha = imageops::blur(&alpha, feather_radius * FEATHER_SIGMA_SCALE);
    }
    debug!(width, height, feather_radius, "applying mask to original");

    for (px, m) in out.pixels_mut().zip(alpha.pixels()) {
        px.0[3] = ((u16::from(px.0[3]) * u16::from(m.0[0]) + 127) / 255) as u8;
    }
    Ok(out)
}

/// [`apply_mask_to_original`] with the mask in its base64 text form.
pub fn apply_mask_text(
    original: &DynamicImage,
    mask_text: &str,
    mask_width: u32,
    mask_height: u32,
    feather_radius: f32,
) -> Result<RgbaImage> {
    let bytes = decode_mask_text(mask_text, mask_width, mask_height)?;
    apply_mask_to_original(original, &bytes, mask_width, mask_height, feather_radius)
}

/// Crop away fully transparent borders.
///
/// An image with no visible pixel is returned unchanged.
pub fn trim_transparent(image: &RgbaImage) -> RgbaImage {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, px) in image.enumerate_pixels() {
        if px.0[3] == 0 {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }

    match bounds {
        Some((x0, y0, x1, y1)) => {
            imageops::crop_imm(image, x0, y0, x1 - x0 + 1, y1 - y0 + 1).to_image()
        }
        None => image.clone(),
    }
}

/// Encode as PNG.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn original(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([40, 80, 120, 255])))
    }

    fn left_half_mask(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, _| {
            Rgba([255, 255, 255, if x < width / 2 { 255 } else { 0 }])
        })
    }

    #[test]
    fn canvas_feather_rounds_radius() {
        let mask = left_half_mask(12, 6);
        assert_eq!(feather_canvas_mask(&mask, 2.4), feather(&mask, 2));
        assert_eq!(feather_canvas_mask(&mask, 0.0), mask);
        assert_eq!(feather_canvas_mask(&mask, 0.4), mask);
    }

    #[test]
    fn two_stage_feather_softens_the_cut_edge() {
        let mask = left_half_mask(40, 4);
        let softened = feather_canvas_mask(&mask, 2.0);
        assert!(softened.pixels().any(|p| p.0[3] > 0 && p.0[3] < 255));

        let text = crate::mask::encode_mask_text(&softened);
        let out = apply_mask_text(&original(40, 4), &text, 40, 4, 2.0).unwrap();
        let edge = out.get_pixel(20, 2).0[3];
        assert!(edge > 0 && edge < 255, "edge alpha {edge}");
        assert!(out.get_pixel(2, 2).0[3] > 200);
        assert!(out.get_pixel(37, 2).0[3] < 55);
    }

    #[test]
    fn mask_is_stretched_to_original_size() {
        // 2x1 mask: left kept, right removed.
        let out = apply_mask_to_original(&original(8, 4), &[255, 0], 2, 1, 0.0).unwrap();
        assert_eq!(out.dimensions(), (8, 4));
        assert_eq!(*out.get_pixel(1, 2), Rgba([40, 80, 120, 255]));
        assert_eq!(out.get_pixel(6, 2).0[3], 0);
    }

    #[test]
    fn existing_transparency_is_preserved() {
        let src = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 0])));
        let out = apply_mask_to_original(&src, &[255; 4], 2, 2, 0.0).unwrap();
        assert!(out.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn feathering_softens_the_edge() {
        let mut bytes = vec![0u8; 16 * 16];
        for y in 0..16 {
            for x in 0..8 {
                bytes[y * 16 + x] = 255;
            }
        }
        let out = apply_mask_to_original(&original(16, 16), &bytes, 16, 16, 2.0).unwrap();
        let edge = out.get_pixel(8, 8).0[3];
        assert!(edge > 0 && edge < 255, "edge alpha was {edge}");
    }

    #[test]
    fn wrong_mask_length_is_rejected() {
        let err = apply_mask_to_original(&original(4, 4), &[255; 3], 2, 2, 0.0).unwrap_err();
        assert!(matches!(err, ClickmaskError::InvalidInput(_)));
    }

    #[test]
    fn mask_text_is_decoded_first() {
        let text = crate::mask::encode_mask_text(&RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255])));
        let out = apply_mask_text(&original(3, 3), &text, 1, 1, 0.0).unwrap();
        assert!(out.pixels().all(|p| p.0[3] == 255));
    }

    #[test]
    fn trims_to_visible_bounds() {
        let mut img = RgbaImage::new(10, 10);
        img.put_pixel(3, 4, Rgba([9, 9, 9, 255]));
        img.put_pixel(6, 5, Rgba([9, 9, 9, 10]));
        let trimmed = trim_transparent(&img);
        assert_eq!(trimmed.dimensions(), (4, 2));
        assert_eq!(trimmed.get_pixel(0, 0).0[3], 255);
    }

    #[test]
    fn fully_transparent_is_not_trimmed() {
        let img = RgbaImage::new(5, 3);
        assert_eq!(trim_transparent(&img).dimensions(), (5, 3));
    }

    #[test]
    fn png_round_trips_dimensions() {
        let png = encode_png(&RgbaImage::new(7, 2)).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (7, 2));
    }
}
