use crate::error::{Error, Result};
use candle_core::Device;
use std::fmt;
use std::str::FromStr;

/// Where loaded tensors are placed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DevicePolicy {
    /// CUDA device 0 when available, CPU otherwise.
    #[default]
    Auto,
    Cpu,
    Cuda(usize),
}

impl DevicePolicy {
    pub fn device(&self) -> Result<Device> {
        match self {
            Self::Cpu => Ok(Device::Cpu),
            Self::Auto => Device::cuda_if_available(0).map_err(|e| {
                Error::ConfigError(format!("Failed to open CUDA device: {}", e))
            }),
            Self::Cuda(ordinal) => Device::new_cuda(*ordinal).map_err(|e| {
                Error::ConfigError(format!("Failed to initialize CUDA device: {}", e))
            }),
        }
    }
}

impl FromStr for DevicePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda(0)),
            s if s.starts_with("cuda:") => {
                let ordinal = s["cuda:".len()..]
                    .parse::<usize>()
                    .map_err(|_| Error::InvalidInput(format!("Invalid CUDA device: {}", s)))?;
                Ok(Self::Cuda(ordinal))
            }
            _ => Err(Error::InvalidInput(format!("Unknown device: {}", s))),
        }
    }
}

impl fmt::Display for DevicePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda(ordinal) => write!(f, "cuda:{}", ordinal),
        }
    }
}
