//! Public types for the Clickmask API.

mod embedding;
mod mask;
mod point;
mod status;

pub use embedding::{DEFAULT_EMBEDDING_SHAPE, Embedding, ImageSize};
pub use mask::MaskOutput;
pub use point::{PointLabel, PointPrompt};
pub use status::Status;
