use thiserror::Error;

/// Everything that can go wrong while building or driving a fluid pipeline.
#[derive(Debug, Error)]
pub enum FluidError {
    #[error("cannot allocate {label} field at {width}x{height}: {reason}")]
    Allocation {
        label: &'static str,
        width: u32,
        height: u32,
        reason: String,
    },

    #[error("viewport {width}x{height} has no area")]
    EmptyViewport { width: u32, height: u32 },

    #[error("expected {expected} texels for {width}x{height} field, got {actual}")]
    TexelCount {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("invalid parameter update: {0}")]
    Params(#[from] serde_json::Error),

    #[cfg(feature = "gpu")]
    #[error("no suitable GPU adapter found")]
    NoAdapter,

    #[cfg(feature = "gpu")]
    #[error("failed to request GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[cfg(feature = "gpu")]
    #[error("field readback failed: {0}")]
    Readback(#[from] wgpu::BufferAsyncError),

    #[cfg(feature = "gpu")]
    #[error("field readback was dropped before completion")]
    ReadbackCancelled,
}
