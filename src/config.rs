//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.clickmask/config.toml` (user)
//! 3. `/etc/clickmask/config.toml` (system)
//!
//! The encoder API key is never stored in the file; it is read from the
//! environment variable named by `encoder.api_key_env`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::canvas::DEFAULT_MAX_DIMENSION;
use crate::decoder::{DecoderConfig, Device, ModelSource, default_cache_dir};
use crate::encoder::{DEFAULT_ENCODE_PATH, HttpEncoderConfig};
use crate::mask::DEFAULT_CHECKER_CELL;
use crate::{ClickmaskError, Result};

/// Environment variable holding the encoder API key unless configured otherwise.
pub const DEFAULT_API_KEY_ENV: &str = "CLICKMASK_ENCODER_API_KEY";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub encoder: EncoderSettings,
    #[serde(default)]
    pub decoder: DecoderSettings,
    #[serde(default)]
    pub canvas: CanvasSettings,
    #[serde(default)]
    pub output: OutputSettings,
}

/// Remote encode endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct EncoderSettings {
    /// Service base URL (default: http://localhost:3000).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Endpoint path (default: /api/sam2/encode).
    #[serde(default = "default_encode_path")]
    pub path: String,
    /// Request timeout in seconds (default: 60).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Name of the environment variable with the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            path: default_encode_path(),
            timeout_secs: default_timeout(),
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_encode_path() -> String {
    DEFAULT_ENCODE_PATH.to_string()
}

fn default_timeout() -> u64 {
    60
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

impl EncoderSettings {
    /// API key from the configured environment variable, if set and non-empty.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    pub fn to_encoder_config(&self) -> HttpEncoderConfig {
        let config = HttpEncoderConfig::new(&self.base_url)
            .path(&self.path)
            .timeout(Duration::from_secs(self.timeout_secs));
        match self.api_key() {
            Some(key) => config.api_key(key),
            None => config,
        }
    }
}

/// Local decoder model.
#[derive(Debug, Clone, Deserialize)]
pub struct DecoderSettings {
    /// Model file path or HTTP(S) URL.
    #[serde(default)]
    pub model: Option<String>,
    /// "cpu", "cuda" or "cuda:<id>" (default: "cpu").
    #[serde(default = "default_device")]
    pub device: String,
    #[serde(default)]
    pub intra_threads: Option<usize>,
    /// Directory for model downloads.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for DecoderSettings {
    fn default() -> Self {
        Self {
            model: None,
            device: default_device(),
            intra_threads: None,
            cache_dir: None,
        }
    }
}

fn default_device() -> String {
    "cpu".to_string()
}

impl DecoderSettings {
    /// Build a decoder config. Fails when no model is configured.
    pub fn to_decoder_config(&self) -> Result<DecoderConfig> {
        let model = self.model.as_deref().ok_or_else(|| {
            ClickmaskError::Configuration("decoder.model is not set".to_string())
        })?;
        let device: Device = self.device.parse()?;

        let mut config = DecoderConfig::new(ModelSource::parse(model))
            .device(device)
            .cache_dir(self.cache_dir.clone().unwrap_or_else(default_cache_dir));
        if let Some(threads) = self.intra_threads {
            config = config.intra_threads(threads);
        }
        Ok(config)
    }
}

/// Interactive preview canvas.
#[derive(Debug, Clone, Deserialize)]
pub struct CanvasSettings {
    /// Longest preview side in pixels (default: 512).
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
    #[serde(default = "default_checker_cell")]
    pub checker_cell_size: u32,
}

impl Default for CanvasSettings {
    fn default() -> Self {
        Self {
            max_dimension: default_max_dimension(),
            checker_cell_size: default_checker_cell(),
        }
    }
}

fn default_max_dimension() -> u32 {
    DEFAULT_MAX_DIMENSION
}

fn default_checker_cell() -> u32 {
    DEFAULT_CHECKER_CELL
}

/// Final cut-out.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputSettings {
    /// Edge feather radius in original pixels; 0 disables (default: 0).
    #[serde(default)]
    pub feather_radius: f32,
    /// Crop fully transparent borders (default: true).
    #[serde(default = "default_trim")]
    pub trim: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            feather_radius: 0.0,
            trim: default_trim(),
        }
    }
}

fn default_trim() -> bool {
    true
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.clickmask/config.toml`
    /// 3. `/etc/clickmask/config.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?.ok_or_else(|| {
            ClickmaskError::Configuration(
                "No config file found. Create ~/.clickmask/config.toml or /etc/clickmask/config.toml"
                    .to_string(),
            )
        })?;
        Self::load_from_file(&path)
    }

    /// Like [`load`](Self::load), but falls back to defaults when no file
    /// exists. An explicit path must still exist.
    pub fn load_or_default(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ClickmaskError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            ClickmaskError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(ClickmaskError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".clickmask").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        let system_config = PathBuf::from("/etc/clickmask/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.encoder.base_url, "http://localhost:3000");
        assert_eq!(config.encoder.path, "/api/sam2/encode");
        assert_eq!(config.encoder.timeout_secs, 60);
        assert_eq!(config.canvas.max_dimension, 512);
        assert_eq!(config.output.feather_radius, 0.0);
        assert!(config.output.trim);
    }

    #[test]
    fn parse_partial_config_keeps_defaults() {
        let toml = r#"
            [encoder]
            base_url = "https://segment.example.com"

            [decoder]
            model = "/models/sam2_tiny_decoder.onnx"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.encoder.base_url, "https://segment.example.com");
        assert_eq!(config.encoder.timeout_secs, 60);
        assert_eq!(config.decoder.device, "cpu");
        assert_eq!(config.canvas.checker_cell_size, 10);
    }

    #[test]
    fn decoder_config_requires_model() {
        let err = DecoderSettings::default().to_decoder_config().unwrap_err();
        assert!(matches!(err, ClickmaskError::Configuration(_)));
    }

    #[test]
    fn decoder_config_from_url() {
        let settings = DecoderSettings {
            model: Some("https://cdn.example.com/decoder.onnx".into()),
            intra_threads: Some(4),
            cache_dir: Some(PathBuf::from("/tmp/cm")),
            ..Default::default()
        };
        let config = settings.to_decoder_config().unwrap();
        assert_eq!(config.source, ModelSource::url("https://cdn.example.com/decoder.onnx"));
        assert_eq!(config.intra_threads, Some(4));
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/cm"));
    }

    #[test]
    fn encoder_config_carries_timeout_and_path() {
        let settings = EncoderSettings {
            path: "/encode".into(),
            timeout_secs: 5,
            api_key_env: "CLICKMASK_TEST_UNSET_KEY_VAR".into(),
            ..Default::default()
        };
        let config = settings.to_encoder_config();
        assert_eq!(config.path, "/encode");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(config.api_key.is_none());
    }

    #[test]
    fn missing_explicit_path_is_error() {
        let err = Config::load_or_default(Some(Path::new("/no/such/clickmask.toml"))).unwrap_err();
        assert!(matches!(err, ClickmaskError::Configuration(_)));
    }
}
