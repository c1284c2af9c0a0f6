//! Error types for ground_gpu

use ground_3d::SceneError;
use thiserror::Error;

/// Errors raised by the wgpu backend
#[derive(Error, Debug)]
pub enum GpuError {
    /// No adapter matched the request
    #[error("no suitable GPU adapter found")]
    AdapterNotFound,

    /// The adapter refused the device request
    #[error("failed to request GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    /// Mapping a read-back buffer failed
    #[error("failed to map read-back buffer: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    /// The map callback was dropped before it reported
    #[error("read-back channel closed")]
    ChannelClosed,

    /// Read-back requested before anything was drawn to the target
    #[error("no {0} frame has been rendered")]
    NoFrame(&'static str),

    /// Pixel coordinates outside the target
    #[error("pixel ({x}, {y}) outside the {width}x{height} target")]
    OutOfBounds { x: u32, y: u32, width: u32, height: u32 },

    /// wgpu rejected a shader module or pipeline
    #[error("GPU validation failed: {0}")]
    Validation(String),

    /// Frame protocol misuse
    #[error("{0}")]
    Frame(&'static str),
}

impl From<GpuError> for SceneError {
    fn from(err: GpuError) -> Self {
        match err {
            GpuError::BufferMap(_) | GpuError::ChannelClosed | GpuError::NoFrame(_) | GpuError::OutOfBounds { .. } => {
                SceneError::ReadBack(err.to_string())
            }
            _ => SceneError::Backend(err.to_string()),
        }
    }
}

/// Result type for ground_gpu operations
pub type Result<T> = std::result::Result<T, GpuError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_error_conversion() {
        let err: SceneError = GpuError::NoFrame("picking").into();
        assert!(matches!(err, SceneError::ReadBack(ref msg) if msg.contains("picking")));

        let err: SceneError = GpuError::AdapterNotFound.into();
        assert!(matches!(err, SceneError::Backend(_)));
    }
}
