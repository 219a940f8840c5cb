//! Mask decoding: embedding + point prompts → mask bitmap.
//!
//! [`MaskDecoder`] is the seam between the interactive session and whatever
//! runtime evaluates the prompt decoder. The ONNX Runtime implementation,
//! [`OnnxDecoder`], is behind the `local-inference` feature; the numeric
//! prompt/mask conventions it relies on live in [`tensors`] and are usable
//! without it.

mod device;
mod source;
pub mod tensors;

#[cfg(feature = "local-inference")]
mod onnx;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

pub use device::Device;
pub use source::{ModelSource, default_cache_dir};
pub use tensors::{
    FALLBACK_SCORE, LOW_RES_MASK_SIZE, MODEL_INPUT_SIZE, PromptTensors, mask_from_logits,
    prompt_tensors, select_best_mask,
};

#[cfg(feature = "local-inference")]
pub use onnx::OnnxDecoder;

use crate::types::{Embedding, MaskOutput, PointPrompt};
use crate::{ClickmaskError, Result};

/// A prompt decoder that turns an image embedding plus clicks into a mask.
///
/// Implementations load lazily: [`initialize`](Self::initialize) must succeed
/// before [`predict`](Self::predict) or [`auto_segment`](Self::auto_segment)
/// will do any work, and [`dispose`](Self::dispose) returns the decoder to
/// the unloaded state.
#[async_trait]
pub trait MaskDecoder: Send + Sync {
    /// Name for logging.
    fn name(&self) -> &str;

    /// Load the model. Returns at once when already loaded; a call made while
    /// another load is running waits for it and shares its outcome.
    ///
    /// `Ok(())` means the decoder is ready. Failures, including a
    /// [`dispose`](Self::dispose) that lands mid-load, are reported as
    /// [`ClickmaskError::ModelLoad`].
    async fn initialize(&self) -> Result<()>;

    fn is_ready(&self) -> bool;

    /// Decode a mask at `width x height` for the given prompts.
    ///
    /// Fails with [`ClickmaskError::DecoderNotReady`] before initialization
    /// or after disposal, and with [`ClickmaskError::InvalidInput`] for a
    /// zero-sized target.
    async fn predict(
        &self,
        embedding: Arc<Embedding>,
        points: &[PointPrompt],
        width: u32,
        height: u32,
    ) -> Result<MaskOutput>;

    /// Segment the most salient object with no user prompts.
    ///
    /// The default sends an empty prompt list, which [`prompt_tensors`]
    /// turns into a single foreground point at the center of the image.
    async fn auto_segment(
        &self,
        embedding: Arc<Embedding>,
        width: u32,
        height: u32,
    ) -> Result<MaskOutput> {
        self.predict(embedding, &[], width, height).await
    }

    /// Release model resources. Safe to call more than once.
    fn dispose(&self);
}

/// Reject zero-sized decode targets.
pub fn check_target(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(ClickmaskError::InvalidInput(format!(
            "mask target must be non-empty, got {width}x{height}"
        )));
    }
    Ok(())
}

/// Settings for a local decoder.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    pub source: ModelSource,
    pub device: Device,
    /// ONNX Runtime intra-op thread count; runtime default when `None`.
    pub intra_threads: Option<usize>,
    /// Where URL sources are downloaded to.
    pub cache_dir: PathBuf,
}

impl DecoderConfig {
    pub fn new(source: ModelSource) -> Self {
        Self {
            source,
            device: Device::default(),
            intra_threads: None,
            cache_dir: default_cache_dir(),
        }
    }

    pub fn device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.intra_threads = Some(threads);
        self
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }
}
