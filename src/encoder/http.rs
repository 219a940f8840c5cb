//! HTTP client for a remote SAM image-encode endpoint.
//!
//! The endpoint takes a multipart upload with the image in field `image` and
//! answers with JSON:
//!
//! ```json
//! { "success": true, "embeddingData": [..] | "<base64 f32 LE>",
//!   "shape": [1, 256, 64, 64], "imageSize": { "width": 512, "height": 384 } }
//! ```
//!
//! Failures are `{ "success": false, "error": "..." }`. The body decides
//! success, not the HTTP status.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use super::EmbeddingEncoder;
use crate::types::{DEFAULT_EMBEDDING_SHAPE, Embedding, ImageSize};
use crate::{ClickmaskError, Result};

/// Path of the encode endpoint under the base URL.
pub const DEFAULT_ENCODE_PATH: &str = "/api/sam2/encode";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection settings for [`HttpEncoder`].
#[derive(Debug, Clone)]
pub struct HttpEncoderConfig {
    pub base_url: String,
    pub path: String,
    pub timeout: Duration,
    /// Sent as `Authorization: Bearer <key>` when set.
    pub api_key: Option<String>,
}

impl HttpEncoderConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            path: DEFAULT_ENCODE_PATH.to_string(),
            timeout: DEFAULT_TIMEOUT,
            api_key: None,
        }
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    fn url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if self.path.starts_with('/') {
            format!("{base}{}", self.path)
        } else {
            format!("{base}/{}", self.path)
        }
    }
}

/// Encoder client that uploads images to a remote service.
///
/// One request per call; retries are left to the caller.
#[derive(Clone)]
pub struct HttpEncoder {
    http: Client,
    config: HttpEncoderConfig,
}

impl HttpEncoder {
    pub fn new(config: HttpEncoderConfig) -> Self {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("failed to build HTTP client");

        Self { http, config }
    }

    /// Client with default settings against `base_url` (also used with wiremock).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self::new(HttpEncoderConfig::new(base_url))
    }

    pub fn config(&self) -> &HttpEncoderConfig {
        &self.config
    }
}

#[async_trait]
impl EmbeddingEncoder for HttpEncoder {
    fn name(&self) -> &str {
        "http"
    }

    async fn encode(&self, image: Vec<u8>) -> Result<Embedding> {
        let (mime, ext) = sniff_format(&image);
        let header_size = header_dimensions(&image);
        let url = self.config.url();
        debug!(%url, bytes = image.len(), mime, "uploading image for encoding");

        let part = Part::bytes(image)
            .file_name(format!("image.{ext}"))
            .mime_str(mime)?;
        let form = Form::new().part("image", part);

        let mut request = self.http.post(&url).multipart(form);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        let parsed: EncodeResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(e) if status.is_success() => {
                return Err(ClickmaskError::MalformedResponse(format!(
                    "response is not valid JSON: {e}"
                )));
            }
            Err(_) => {
                return Err(ClickmaskError::Api {
                    status: status.as_u16(),
                    message: status_message(status),
                });
            }
        };

        let embedding = parsed.into_embedding(status, header_size)?;
        debug!(
            shape = ?embedding.shape(),
            width = embedding.image_size().width,
            height = embedding.image_size().height,
            "image encoded"
        );
        Ok(embedding)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EncodeResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    embedding_data: Option<EmbeddingData>,
    #[serde(default)]
    shape: Option<Vec<usize>>,
    #[serde(default)]
    image_size: Option<ImageSize>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EmbeddingData {
    Values(Vec<f32>),
    Base64(String),
}

impl EmbeddingData {
    fn into_values(self) -> Result<Vec<f32>> {
        match self {
            Self::Values(values) => Ok(values),
            Self::Base64(text) => decode_f32_le(&text),
        }
    }
}

impl EncodeResponse {
    fn into_embedding(self, status: StatusCode, header_size: Option<ImageSize>) -> Result<Embedding> {
        if !self.success {
            return Err(match self.error {
                Some(message) => ClickmaskError::Api {
                    status: status.as_u16(),
                    message,
                },
                None if !status.is_success() => ClickmaskError::Api {
                    status: status.as_u16(),
                    message: status_message(status),
                },
                None => ClickmaskError::MalformedResponse(
                    "response does not report success".to_string(),
                ),
            });
        }

        let data = self
            .embedding_data
            .ok_or_else(|| ClickmaskError::MalformedResponse("missing embeddingData".to_string()))?
            .into_values()?;
        if data.is_empty() {
            return Err(ClickmaskError::MalformedResponse(
                "embeddingData is empty".to_string(),
            ));
        }

        let shape = self
            .shape
            .unwrap_or_else(|| DEFAULT_EMBEDDING_SHAPE.to_vec());

        let image_size = match (self.image_size, header_size) {
            (Some(declared), Some(uploaded)) if declared != uploaded => {
                warn!(?declared, ?uploaded, "server image size differs from upload");
                declared
            }
            (Some(declared), _) => declared,
            (None, Some(uploaded)) => uploaded,
            (None, None) => {
                return Err(ClickmaskError::MalformedResponse(
                    "missing imageSize and the upload has no readable dimensions".to_string(),
                ));
            }
        };

        Embedding::new(data, shape, image_size)
    }
}

fn status_message(status: StatusCode) -> String {
    format!(
        "encode request failed with HTTP {}",
        status.canonical_reason().map_or_else(
            || status.as_u16().to_string(),
            |reason| format!("{} {reason}", status.as_u16())
        )
    )
}

/// Decode base64 text holding little-endian `f32` values.
fn decode_f32_le(text: &str) -> Result<Vec<f32>> {
    let bytes = STANDARD
        .decode(text.trim())
        .map_err(|e| ClickmaskError::MalformedResponse(format!("embeddingData is not base64: {e}")))?;
    if bytes.len() % 4 != 0 {
        return Err(ClickmaskError::MalformedResponse(format!(
            "embeddingData holds {} bytes, not a whole number of f32 values",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// MIME type and file extension for the upload.
fn sniff_format(bytes: &[u8]) -> (&'static str, &'static str) {
    match image::guess_format(bytes) {
        Ok(format) => (
            format.to_mime_type(),
            format.extensions_str().first().copied().unwrap_or("bin"),
        ),
        Err(_) => ("application/octet-stream", "bin"),
    }
}

/// Dimensions from the image header, without decoding pixels.
fn header_dimensions(bytes: &[u8]) -> Option<ImageSize> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
        .map(|(w, h)| ImageSize::new(w, h))
}
