//! Runtime-independent prompt and mask tensor helpers.
//!
//! These cover the numeric contract of a SAM-style prompt decoder: prompts
//! go in as pixel coordinates in a square model input space, masks come out
//! as low-resolution logits that are thresholded at zero.

use image::{Rgba, RgbaImage};

use crate::types::PointPrompt;
use crate::{ClickmaskError, Result};

/// Side of the square model input space, in pixels.
pub const MODEL_INPUT_SIZE: f32 = 1024.0;

/// Side of the low-resolution logit mask the decoder emits.
pub const LOW_RES_MASK_SIZE: usize = 256;

/// Score reported when the model has no confidence output.
pub const FALLBACK_SCORE: f32 = 0.9;

/// Flattened prompt tensors ready to feed a decoder.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTensors {
    /// `[N, 2]` row-major `(x, y)` pairs in model input space.
    pub coords: Vec<f32>,
    /// `[N]` labels, 1 = foreground, 0 = background.
    pub labels: Vec<f32>,
    /// Number of points `N` (always at least 1).
    pub len: usize,
}

/// Map normalized prompts into model input space.
///
/// An empty prompt list becomes a single foreground point at the center,
/// which is how automatic segmentation is expressed to the model.
pub fn prompt_tensors(points: &[PointPrompt]) -> PromptTensors {
    if points.is_empty() {
        let center = MODEL_INPUT_SIZE / 2.0;
        return PromptTensors {
            coords: vec![center, center],
            labels: vec![1.0],
            len: 1,
        };
    }

    let mut coords = Vec::with_capacity(points.len() * 2);
    let mut labels = Vec::with_capacity(points.len());
    for p in points {
        coords.push(p.x * MODEL_INPUT_SIZE);
        coords.push(p.y * MODEL_INPUT_SIZE);
        labels.push(p.label.model_value());
    }

    PromptTensors {
        coords,
        labels,
        len: points.len(),
    }
}

/// Trailing `(height, width)` of a mask tensor, defaulting to the
/// low-resolution size when the shape is too short or has zero extents.
fn plane_dims(dims: &[usize]) -> (usize, usize) {
    let pick = |i: Option<usize>| {
        i.and_then(|i| dims.get(i).copied())
            .filter(|&d| d > 0)
            .unwrap_or(LOW_RES_MASK_SIZE)
    };
    let n = dims.len();
    (pick(n.checked_sub(2)), pick(n.checked_sub(1)))
}

/// Resample a logit plane to `width x height` with nearest-neighbour lookup
/// and threshold it at zero.
///
/// Foreground pixels get alpha 255, the rest alpha 0; RGB is white.
/// Indices past the end of `data` count as background.
pub fn mask_from_logits(data: &[f32], dims: &[usize], width: u32, height: u32) -> RgbaImage {
    let (mask_h, mask_w) = plane_dims(dims);

    RgbaImage::from_fn(width, height, |x, y| {
        let src_x = ((f64::from(x) / f64::from(width)) * mask_w as f64).floor() as usize;
        let src_y = ((f64::from(y) / f64::from(height)) * mask_h as f64).floor() as usize;
        let idx = src_y.min(mask_h - 1) * mask_w + src_x.min(mask_w - 1);
        let logit = data.get(idx).copied().unwrap_or(f32::NEG_INFINITY);
        Rgba([255, 255, 255, if logit > 0.0 { 255 } else { 0 }])
    })
}

/// Pick the mask channel to display from a `[.., K, H, W]` output.
///
/// With several candidates the highest-scoring one wins; ties keep the
/// first. Without a score output the first channel is used with
/// [`FALLBACK_SCORE`]. The returned score is clamped into `[0, 1]`.
pub fn select_best_mask<'a>(
    dims: &[usize],
    data: &'a [f32],
    scores: Option<&[f32]>,
) -> Result<(&'a [f32], f32)> {
    let (h, w) = plane_dims(dims);
    let plane = h * w;
    let channels = if dims.len() >= 3 {
        dims[dims.len() - 3].max(1)
    } else {
        1
    };

    if data.len() < plane {
        return Err(ClickmaskError::Inference(format!(
            "mask output holds {} values, expected at least {}",
            data.len(),
            plane
        )));
    }

    let (best, score) = match scores.filter(|s| !s.is_empty()) {
        Some(scores) => scores
            .iter()
            .take(channels)
            .copied()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |acc, (i, s)| {
                if s > acc.1 { (i, s) } else { acc }
            }),
        None => (0, FALLBACK_SCORE),
    };

    let start = best * plane;
    let slice = data.get(start..start + plane).ok_or_else(|| {
        ClickmaskError::Inference(format!(
            "mask channel {best} out of range for {} values",
            data.len()
        ))
    })?;

    let score = if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 };
    Ok((slice, score))
}
