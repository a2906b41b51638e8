//! Compute device selection
//!
//! The device is picked once at startup and handed to the loader as a plain
//! value. Priority: unified-memory GPU (Metal), discrete GPU (CUDA), CPU.

use candle_core::Device;
use std::fmt;

use crate::errors::{EngineError, Result};

/// The three device tiers the engine can bind to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeDevice {
    Metal,
    Cuda,
    Cpu,
}

impl ComputeDevice {
    /// Fixed probing order
    pub const PRIORITY: [ComputeDevice; 3] =
        [ComputeDevice::Metal, ComputeDevice::Cuda, ComputeDevice::Cpu];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComputeDevice::Metal => "metal",
            ComputeDevice::Cuda => "cuda",
            ComputeDevice::Cpu => "cpu",
        }
    }

    /// Whether this build and machine can offer the device
    pub fn is_available(&self) -> bool {
        match self {
            ComputeDevice::Metal => candle_core::utils::metal_is_available(),
            ComputeDevice::Cuda => candle_core::utils::cuda_is_available(),
            ComputeDevice::Cpu => true,
        }
    }

    fn open(&self) -> candle_core::Result<Device> {
        match self {
            ComputeDevice::Metal => Device::new_metal(0),
            ComputeDevice::Cuda => Device::new_cuda(0),
            ComputeDevice::Cpu => Ok(Device::Cpu),
        }
    }
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bound device together with the tier it came from
#[derive(Debug, Clone)]
pub struct DeviceSelection {
    kind: ComputeDevice,
    device: Device,
}

impl DeviceSelection {
    /// Probe the tiers in priority order and keep the first one that opens.
    ///
    /// A GPU that reports available but fails to initialise is skipped.
    pub fn detect() -> Self {
        for kind in ComputeDevice::PRIORITY {
            if !kind.is_available() {
                continue;
            }
            if let Ok(device) = kind.open() {
                return Self { kind, device };
            }
        }
        Self::cpu()
    }

    /// Bind to a specific tier, failing if it cannot be opened
    pub fn force(kind: ComputeDevice) -> Result<Self> {
        let device = kind.open().map_err(|source| EngineError::DeviceUnavailable {
            device: kind.to_string(),
            source,
        })?;
        Ok(Self { kind, device })
    }

    pub fn cpu() -> Self {
        Self {
            kind: ComputeDevice::Cpu,
            device: Device::Cpu,
        }
    }

    pub fn kind(&self) -> ComputeDevice {
        self.kind
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_always_available() {
        assert!(ComputeDevice::Cpu.is_available());
        let selection = DeviceSelection::force(ComputeDevice::Cpu).unwrap();
        assert_eq!(selection.kind(), ComputeDevice::Cpu);
        assert!(selection.device().is_cpu());
    }

    #[test]
    fn test_priority_ends_with_cpu() {
        assert_eq!(ComputeDevice::PRIORITY[0], ComputeDevice::Metal);
        assert_eq!(ComputeDevice::PRIORITY[2], ComputeDevice::Cpu);
    }

    #[test]
    fn test_detect_returns_available_device() {
        let selection = DeviceSelection::detect();
        assert!(selection.kind().is_available());
    }

    #[test]
    fn test_display() {
        assert_eq!(ComputeDevice::Cuda.to_string(), "cuda");
    }
}
