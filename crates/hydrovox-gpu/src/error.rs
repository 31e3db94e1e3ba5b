//! GPU error types.

use thiserror::Error;

/// Errors that can occur while setting up or running compute work.
#[derive(Error, Debug)]
pub enum GpuError {
    /// No graphics adapter could be found.
    #[error("failed to find a graphics adapter")]
    AdapterCreationFailed,

    /// The adapter cannot run compute shaders.
    #[error("adapter '{0}' does not support compute shaders")]
    ComputeUnsupported(String),

    /// Failed to create wgpu device.
    #[error("failed to create graphics device: {0}")]
    DeviceCreationFailed(#[from] wgpu::RequestDeviceError),

    /// A buffer exceeds the device's storage binding limit.
    #[error("buffer '{label}' needs {size} bytes, device limit is {limit}")]
    BufferTooLarge {
        label: &'static str,
        size: u64,
        limit: u64,
    },

    /// Host data does not match the buffers uploaded at prepare time.
    #[error("data size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// The device reported a validation or out-of-memory error.
    #[error("device error: {0}")]
    Device(String),

    /// Waiting on the device failed.
    #[error("device poll failed: {0}")]
    Poll(String),

    /// Reading results back to the host failed.
    #[error("buffer map failed: {0}")]
    MapFailed(String),
}

/// A specialized Result type for GPU operations.
pub type GpuResult<T> = std::result::Result<T, GpuError>;
