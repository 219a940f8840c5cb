//! Edge feathering by repeated box blur.
//!
//! Three box-blur passes approximate a Gaussian. The window is clipped at
//! the bitmap border: pixels outside the bitmap are left out of the average
//! instead of counting as zero, so masks touching the border do not fade
//! toward it.

use image::{Rgba, RgbaImage};

const PASSES: usize = 3;

/// Soften the alpha channel of `mask` with a blur of the given radius.
///
/// A non-positive radius returns an exact copy. Otherwise the output has
/// white RGB and the blurred alpha; callers that need colour re-composite it
/// with [`composite_preview`](super::composite_preview).
#[must_use = "returns the feathered mask"]
pub fn feather(mask: &RgbaImage, radius: i32) -> RgbaImage {
    if radius <= 0 {
        return mask.clone();
    }

    let (w, h) = (mask.width() as usize, mask.height() as usize);
    let mut alpha: Vec<f32> = mask.pixels().map(|p| f32::from(p.0[3])).collect();
    let mut scratch = vec![0.0f32; alpha.len()];
    let r = radius as usize;

    for _ in 0..PASSES {
        box_blur_pass(&mut alpha, &mut scratch, w, h, r);
    }

    RgbaImage::from_fn(mask.width(), mask.height(), |x, y| {
        let a = alpha[y as usize * w + x as usize].round().clamp(0.0, 255.0);
        Rgba([255, 255, 255, a as u8])
    })
}

/// One clipped square-window average, done as a horizontal then a vertical
/// 1D average.
///
/// The clipped window is a rectangle whose width depends only on `x` and
/// height only on `y`, so the separable form equals the 2D average.
fn box_blur_pass(buf: &mut [f32], scratch: &mut [f32], w: usize, h: usize, r: usize) {
    let mut prefix = vec![0.0f64; w.max(h) + 1];

    for y in 0..h {
        let row = &buf[y * w..(y + 1) * w];
        for (i, v) in row.iter().enumerate() {
            prefix[i + 1] = prefix[i] + f64::from(*v);
        }
        for x in 0..w {
            let lo = x.saturating_sub(r);
            let hi = (x + r).min(w - 1);
            scratch[y * w + x] = ((prefix[hi + 1] - prefix[lo]) / (hi - lo + 1) as f64) as f32;
        }
    }

    for x in 0..w {
        for y in 0..h {
            prefix[y + 1] = prefix[y] + f64::from(scratch[y * w + x]);
        }
        for y in 0..h {
            let lo = y.saturating_sub(r);
            let hi = (y + r).min(h - 1);
            buf[y * w + x] = ((prefix[hi + 1] - prefix[lo]) / (hi - lo + 1) as f64) as f32;
        }
    }
}
