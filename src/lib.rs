//! Clickmask - interactive click-to-select object segmentation
//!
//! This crate drives a two-stage SAM-style model for background removal: a
//! heavy image encoder reached over HTTP once per image, and a light prompt
//! decoder run locally on every click. [`SegmentationSession`] keeps the
//! interactive state (points, undo history, current mask) consistent while
//! clicks arrive faster than decodes complete.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use clickmask::decoder::{DecoderConfig, ModelSource, OnnxDecoder};
//! use clickmask::encoder::HttpEncoder;
//! use clickmask::{ChannelEvents, PointPrompt, SegmentationSession, SessionEvent};
//!
//! #[tokio::main]
//! async fn main() -> clickmask::Result<()> {
//!     let encoder = Arc::new(HttpEncoder::with_base_url("http://localhost:3000"));
//!     let decoder = Arc::new(OnnxDecoder::new(DecoderConfig::new(ModelSource::local(
//!         "models/sam2_tiny_decoder.onnx",
//!     ))));
//!     let (events, mut rx) = ChannelEvents::new();
//!     let session = SegmentationSession::with_events(encoder, decoder, Arc::new(events));
//!
//!     session.encode_image(std::fs::read("photo.jpg")?).await;
//!     while !(session.encoder_status().is_ready() && session.decoder_status().is_ready()) {
//!         if let Some(SessionEvent::Error(e)) = rx.recv().await {
//!             eprintln!("{e}");
//!             return Ok(());
//!         }
//!     }
//!
//!     session.auto_segment(512, 384).await;
//!     if let Some(mask) = session.add_point(PointPrompt::foreground(0.5, 0.4), 512, 384).await {
//!         println!("score {:.2}", mask.score);
//!     }
//!     Ok(())
//! }
//! ```

pub mod canvas;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod finalize;
pub mod mask;
pub mod session;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use decoder::MaskDecoder;
pub use encoder::EmbeddingEncoder;
pub use error::{ClickmaskError, ErrorKind, Result};
pub use session::{
    ChannelEvents, NoopEvents, SegmentationSession, SessionError, SessionEvent, SessionEvents,
};
pub use types::{
    DEFAULT_EMBEDDING_SHAPE, Embedding, ImageSize, MaskOutput, PointLabel, PointPrompt, Status,
};
