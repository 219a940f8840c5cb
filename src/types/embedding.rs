//! Image embedding tensor produced by the encoder.

use serde::{Deserialize, Serialize};

use crate::{ClickmaskError, Result};

/// Shape assumed when the encode service omits one (`[batch, channels, h, w]`).
pub const DEFAULT_EMBEDDING_SHAPE: [usize; 4] = [1, 256, 64, 64];

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Encoder output for one source image.
///
/// The buffer is flat and row-major over `shape`. Construction validates
/// that the two agree, so downstream code can index without checks.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    data: Vec<f32>,
    shape: Vec<usize>,
    image_size: ImageSize,
}

impl Embedding {
    /// Create an embedding, checking `data.len()` against the shape.
    pub fn new(data: Vec<f32>, shape: Vec<usize>, image_size: ImageSize) -> Result<Self> {
        if shape.is_empty() {
            return Err(ClickmaskError::MalformedResponse(
                "embedding shape is empty".to_string(),
            ));
        }
        let expected = shape
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
            .ok_or_else(|| {
                ClickmaskError::MalformedResponse(format!("embedding shape {shape:?} overflows"))
            })?;
        if expected != data.len() {
            return Err(ClickmaskError::MalformedResponse(format!(
                "embedding has {} values but shape {:?} needs {}",
                data.len(),
                shape,
                expected
            )));
        }
        Ok(Self {
            data,
            shape,
            image_size,
        })
    }

    /// Flat tensor values.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Tensor shape, e.g. `[1, 256, 64, 64]`.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Image dimensions the embedding was computed against, as declared by the server.
    pub fn image_size(&self) -> ImageSize {
        self.image_size
    }

    /// Number of scalar values.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
