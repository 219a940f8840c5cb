//! Compute device for local decoding.

use std::str::FromStr;

use crate::ClickmaskError;

/// Where the decoder runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    #[default]
    Cpu,

    /// CUDA GPU execution.
    #[cfg(feature = "cuda")]
    Cuda {
        /// GPU device ID (0-indexed).
        device_id: u32,
    },
}

impl Device {
    pub fn cpu() -> Self {
        Self::Cpu
    }

    #[cfg(feature = "cuda")]
    pub fn cuda(device_id: u32) -> Self {
        Self::Cuda { device_id }
    }

    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cpu => "CPU",
            #[cfg(feature = "cuda")]
            Self::Cuda { .. } => "CUDA",
        }
    }
}

/// Parses config values: `cpu`, `cuda` or `cuda:<id>`.
impl FromStr for Device {
    type Err = ClickmaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        if lower == "cpu" {
            return Ok(Self::Cpu);
        }
        if lower == "cuda" || lower.starts_with("cuda:") {
            return cuda_from_str(&lower);
        }
        Err(ClickmaskError::Configuration(format!("unknown device: {s}")))
    }
}

#[cfg(feature = "cuda")]
fn cuda_from_str(s: &str) -> crate::Result<Device> {
    let id = match s.strip_prefix("cuda:") {
        Some(id) => id
            .parse()
            .map_err(|e| ClickmaskError::Configuration(format!("invalid CUDA device id: {e}")))?,
        None => 0,
    };
    Ok(Device::Cuda { device_id: id })
}

#[cfg(not(feature = "cuda"))]
fn cuda_from_str(_s: &str) -> crate::Result<Device> {
    Err(ClickmaskError::Configuration(
        "CUDA requested but clickmask was built without the `cuda` feature".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_cpu() {
        assert_eq!(Device::default(), Device::Cpu);
        assert_eq!(Device::cpu().name(), "CPU");
    }

    #[test]
    fn parses_cpu_case_insensitively() {
        assert_eq!(" CPU ".parse::<Device>().unwrap(), Device::Cpu);
    }

    #[test]
    fn rejects_unknown_device() {
        assert!("tpu".parse::<Device>().is_err());
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn cuda_without_feature_is_config_error() {
        let err = "cuda:1".parse::<Device>().unwrap_err();
        assert!(matches!(err, ClickmaskError::Configuration(_)));
    }

    #[cfg(feature = "cuda")]
    #[test]
    fn parses_cuda_with_id() {
        assert_eq!("cuda:1".parse::<Device>().unwrap(), Device::cuda(1));
        assert_eq!("cuda".parse::<Device>().unwrap().name(), "CUDA");
    }
}
