//! Decoder model source and download logic.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::{ClickmaskError, Result};

/// File name used when a URL has no usable last path segment.
const DEFAULT_MODEL_FILE: &str = "decoder.onnx";

/// Where the decoder model comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// A model file already on disk.
    Local {
        path: PathBuf,
    },

    /// An HTTP(S) URL, downloaded once into the cache directory.
    Url {
        url: String,
    },
}

impl ModelSource {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self::Local { path: path.into() }
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self::Url { url: url.into() }
    }

    /// Interpret a config value: anything starting with `http://` or
    /// `https://` is a URL, everything else a local path.
    pub fn parse(value: &str) -> Self {
        if value.starts_with("http://") || value.starts_with("https://") {
            Self::url(value)
        } else {
            Self::local(value)
        }
    }

    /// Name for logging.
    pub fn display_name(&self) -> String {
        match self {
            Self::Local { path } => path.display().to_string(),
            Self::Url { url } => url.clone(),
        }
    }

    /// Resolve the model to a local file, downloading it if needed.
    ///
    /// Local sources must exist. URL sources are cached under `cache_dir` by
    /// their file name; an existing cached file is reused without a request.
    pub async fn resolve(&self, cache_dir: &Path) -> Result<PathBuf> {
        match self {
            Self::Local { path } => {
                if !path.exists() {
                    return Err(ClickmaskError::ModelLoad(format!(
                        "local model path does not exist: {}",
                        path.display()
                    )));
                }
                Ok(path.clone())
            }
            Self::Url { url } => {
                let target = cache_dir.join(cache_file_name(url));
                if target.exists() {
                    debug!(path = %target.display(), "using cached decoder model");
                    return Ok(target);
                }
                download(url, &target).await?;
                Ok(target)
            }
        }
    }
}

/// Default cache directory for downloaded models.
///
/// `CLICKMASK_CACHE_DIR` overrides the platform cache location.
pub fn default_cache_dir() -> PathBuf {
    std::env::var("CLICKMASK_CACHE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from(".cache"))
                .join("clickmask")
                .join("models")
        })
}

fn cache_file_name(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let after_scheme = without_query
        .split_once("://")
        .map_or(without_query, |(_, rest)| rest);
    after_scheme
        .split_once('/')
        .and_then(|(_, path)| path.rsplit('/').next())
        .filter(|name| !name.is_empty())
        .map_or_else(|| DEFAULT_MODEL_FILE.to_string(), str::to_string)
}

async fn download(url: &str, target: &Path) -> Result<()> {
    info!(%url, path = %target.display(), "downloading decoder model");

    let response = reqwest::get(url)
        .await
        .map_err(|e| ClickmaskError::ModelLoad(format!("failed to download {url}: {e}")))?;
    let status = response.status();
    if !status.is_success() {
        return Err(ClickmaskError::ModelLoad(format!(
            "failed to download {url}: HTTP {status}"
        )));
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ClickmaskError::ModelLoad(format!("failed to read {url}: {e}")))?;

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    // Write beside the target and rename so a partial download is never reused.
    let partial = target.with_extension("part");
    tokio::fs::write(&partial, &bytes).await?;
    tokio::fs::rename(&partial, target).await?;

    debug!(bytes = bytes.len(), "decoder model cached");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_distinguishes_urls_and_paths() {
        assert_eq!(
            ModelSource::parse("https://example.com/m/decoder.onnx"),
            ModelSource::url("https://example.com/m/decoder.onnx")
        );
        assert_eq!(
            ModelSource::parse("models/decoder.onnx"),
            ModelSource::local("models/decoder.onnx")
        );
    }

    #[test]
    fn cache_file_name_uses_last_segment() {
        assert_eq!(
            cache_file_name("https://host/a/sam2_tiny_decoder.onnx?download=1"),
            "sam2_tiny_decoder.onnx"
        );
        assert_eq!(cache_file_name("https://host/"), DEFAULT_MODEL_FILE);
        assert_eq!(cache_file_name("https://host"), DEFAULT_MODEL_FILE);
    }

    #[tokio::test]
    async fn missing_local_model_is_load_error() {
        let source = ModelSource::local("/definitely/not/here.onnx");
        let err = source.resolve(Path::new("/tmp")).await.unwrap_err();
        assert!(matches!(err, ClickmaskError::ModelLoad(_)));
    }

    #[tokio::test]
    async fn cached_url_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cached.onnx"), b"model").unwrap();
        let source = ModelSource::url("http://127.0.0.1:9/cached.onnx");
        let path = source.resolve(dir.path()).await.unwrap();
        assert_eq!(path, dir.path().join("cached.onnx"));
    }
}
