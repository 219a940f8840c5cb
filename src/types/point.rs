//! Point prompts (user clicks).

use serde::{Deserialize, Serialize};

/// Whether a click includes or excludes the region under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointLabel {
    /// Keep: the point lies on the object.
    Foreground,
    /// Remove: the point lies on the background.
    Background,
}

impl PointLabel {
    /// Label value the decoder model expects (1 = foreground, 0 = background).
    pub fn model_value(self) -> f32 {
        match self {
            Self::Foreground => 1.0,
            Self::Background => 0.0,
        }
    }
}

/// A single click, in coordinates normalized to `[0, 1]` over the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointPrompt {
    pub x: f32,
    pub y: f32,
    pub label: PointLabel,
}

impl PointPrompt {
    /// Create a prompt from normalized coordinates, clamped into `[0, 1]`.
    pub fn new(x: f32, y: f32, label: PointLabel) -> Self {
        Self {
            x: x.clamp(0.0, 1.0),
            y: y.clamp(0.0, 1.0),
            label,
        }
    }

    /// Foreground prompt at normalized `(x, y)`.
    pub fn foreground(x: f32, y: f32) -> Self {
        Self::new(x, y, PointLabel::Foreground)
    }

    /// Background prompt at normalized `(x, y)`.
    pub fn background(x: f32, y: f32) -> Self {
        Self::new(x, y, PointLabel::Background)
    }

    /// Convert a click in canvas pixels to a normalized prompt.
    ///
    /// Clicks outside the canvas are clamped to its edge. A zero-sized
    /// canvas maps everything to the origin.
    pub fn from_canvas(px: f32, py: f32, width: u32, height: u32, label: PointLabel) -> Self {
        let nx = if width == 0 { 0.0 } else { px / width as f32 };
        let ny = if height == 0 { 0.0 } else { py / height as f32 };
        Self::new(nx, ny, label)
    }

    pub fn is_foreground(&self) -> bool {
        self.label == PointLabel::Foreground
    }
}
