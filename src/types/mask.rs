//! Decoder output.

use image::RgbaImage;

/// A decoded mask plus the model's confidence in it.
///
/// Alpha carries membership: 0 = background, 255 = foreground, anything in
/// between is a feathered edge. RGB is white.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskOutput {
    pub mask: RgbaImage,
    /// Confidence in `[0, 1]`.
    pub score: f32,
}

impl MaskOutput {
    pub fn new(mask: RgbaImage, score: f32) -> Self {
        Self {
            mask,
            score: score.clamp(0.0, 1.0),
        }
    }

    pub fn width(&self) -> u32 {
        self.mask.width()
    }

    pub fn height(&self) -> u32 {
        self.mask.height()
    }
}
