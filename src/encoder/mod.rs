//! Image encoding: source image bytes → embedding.
//!
//! The encoder is the heavy half of the model and runs remotely; the crate
//! only talks to it. [`HttpEncoder`] is the production client.

mod http;

use async_trait::async_trait;

pub use http::{DEFAULT_ENCODE_PATH, HttpEncoder, HttpEncoderConfig};

use crate::Result;
use crate::types::Embedding;

/// Produces the image embedding a [`MaskDecoder`](crate::decoder::MaskDecoder) consumes.
#[async_trait]
pub trait EmbeddingEncoder: Send + Sync {
    /// Name for logging.
    fn name(&self) -> &str;

    /// Encode one source image (PNG, JPEG or WebP bytes).
    ///
    /// Every failure here is terminal for the session that requested it.
    async fn encode(&self, image: Vec<u8>) -> Result<Embedding>;
}
