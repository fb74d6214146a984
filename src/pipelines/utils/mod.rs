//! Where a classifier runs.
//!
//! Builders carry a [`DeviceRequest`] and resolve it only when `build()` runs,
//! so a config file can name the device as text (`"auto"`, `"cpu"`, `"cuda"`,
//! `"cuda:1"`) without touching the GPU at parse time.

use crate::core::ModelOptions;
use candle_core::Device;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Default)]
pub enum DeviceRequest {
    /// CUDA device 0 when the crate is built with CUDA and one is present, else CPU.
    #[default]
    Auto,
    Cpu,
    Cuda(usize),
    Explicit(Device),
}

impl DeviceRequest {
    pub fn resolve(self) -> anyhow::Result<Device> {
        let device = match self {
            DeviceRequest::Auto => Device::cuda_if_available(0)?,
            DeviceRequest::Cpu => Device::Cpu,
            DeviceRequest::Cuda(index) => Device::new_cuda(index)?,
            DeviceRequest::Explicit(device) => device,
        };
        tracing::debug!(device = ?device.location(), "classifier device resolved");
        Ok(device)
    }
}

impl FromStr for DeviceRequest {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(DeviceRequest::Auto),
            "cpu" => Ok(DeviceRequest::Cpu),
            "cuda" | "gpu" => Ok(DeviceRequest::Cuda(0)),
            other => match other.strip_prefix("cuda:").map(str::parse::<usize>) {
                Some(Ok(index)) => Ok(DeviceRequest::Cuda(index)),
                _ => anyhow::bail!("Unknown device {s:?}, expected auto, cpu, cuda or cuda:<index>"),
            },
        }
    }
}

impl fmt::Display for DeviceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceRequest::Auto => write!(f, "auto"),
            DeviceRequest::Cpu => write!(f, "cpu"),
            DeviceRequest::Cuda(index) => write!(f, "cuda:{index}"),
            DeviceRequest::Explicit(device) => write!(f, "{:?}", device.location()),
        }
    }
}

/// Builder methods for picking the device.
pub trait DeviceSelectable: Sized {
    fn device_request_mut(&mut self) -> &mut DeviceRequest;

    fn device_request(mut self, request: DeviceRequest) -> Self {
        *self.device_request_mut() = request;
        self
    }

    fn cpu(self) -> Self {
        self.device_request(DeviceRequest::Cpu)
    }

    fn cuda_device(self, index: usize) -> Self {
        self.device_request(DeviceRequest::Cuda(index))
    }

    fn device(self, device: Device) -> Self {
        self.device_request(DeviceRequest::Explicit(device))
    }
}

/// Key under which loaded weights are shared: the same artifact on another
/// device is a separate entry.
pub fn build_cache_key<O: ModelOptions>(options: &O, device: &Device) -> String {
    format!("{}@{:?}", options.cache_key(), device.location())
}
