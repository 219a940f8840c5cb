//! Clickmask error types

use serde::{Deserialize, Serialize};

/// Clickmask error types
#[derive(Debug, thiserror::Error)]
pub enum ClickmaskError {
    // Encoder/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// The encode service answered, but rejected the request.
    #[error("encoder rejected request ({status}): {message}")]
    Api { status: u16, message: String },

    /// The encode service answered without usable embedding data.
    #[error("malformed encoder response: {0}")]
    MalformedResponse(String),

    // Decoder errors
    #[error("failed to load decoder model: {0}")]
    ModelLoad(String),

    #[error("decoder is not initialized")]
    DecoderNotReady,

    #[error("inference failed: {0}")]
    Inference(String),

    // Data errors
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Which part of the segmentation workflow an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The decoder model could not be loaded.
    ModelLoad,
    /// The encode request failed or returned unusable data.
    Encode,
    /// A single decode (predict/auto) failed.
    Inference,
    /// Anything else: bad input, configuration, local I/O.
    Other,
}

impl ErrorKind {
    /// Terminal kinds end the session; the user has to start over with a new image.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::ModelLoad | Self::Encode)
    }
}

impl ClickmaskError {
    /// Classify this error into the session error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Http(_) | Self::Api { .. } | Self::MalformedResponse(_) => ErrorKind::Encode,
            Self::ModelLoad(_) => ErrorKind::ModelLoad,
            Self::DecoderNotReady | Self::Inference(_) => ErrorKind::Inference,
            Self::InvalidInput(_)
            | Self::Json(_)
            | Self::Image(_)
            | Self::Io(_)
            | Self::Configuration(_) => ErrorKind::Other,
        }
    }

    /// Whether this error ends the segmentation session.
    pub fn is_terminal(&self) -> bool {
        self.kind().is_terminal()
    }
}

impl From<reqwest::Error> for ClickmaskError {
    fn from(err: reqwest::Error) -> Self {
        ClickmaskError::Http(err.to_string())
    }
}

/// Result type alias for Clickmask operations
pub type Result<T> = std::result::Result<T, ClickmaskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_errors_are_terminal() {
        assert!(ClickmaskError::Http("reset".into()).is_terminal());
        assert!(
            ClickmaskError::Api {
                status: 413,
                message: "too large".into()
            }
            .is_terminal()
        );
        assert!(ClickmaskError::MalformedResponse("empty".into()).is_terminal());
    }

    #[test]
    fn model_load_is_terminal() {
        let err = ClickmaskError::ModelLoad("missing webgpu".into());
        assert_eq!(err.kind(), ErrorKind::ModelLoad);
        assert!(err.is_terminal());
    }

    #[test]
    fn inference_errors_are_recoverable() {
        assert!(!ClickmaskError::Inference("nan".into()).is_terminal());
        assert!(!ClickmaskError::DecoderNotReady.is_terminal());
    }

    #[test]
    fn other_errors_are_not_terminal() {
        let err = ClickmaskError::InvalidInput("zero width".into());
        assert_eq!(err.kind(), ErrorKind::Other);
        assert!(!err.is_terminal());
    }
}
