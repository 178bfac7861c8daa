use thiserror::Error;

pub type Result<T, E = ResampleError> = std::result::Result<T, E>;

/// Library error type for resampling operations.
#[derive(Debug, Error)]
pub enum ResampleError {
    /// The adapter lacks a capability the kernels need, or the image exceeds
    /// the device limits.
    #[error("gpu compute unsupported: {0}")]
    Unsupported(String),

    /// No GPU context could be acquired.
    #[error("gpu device unavailable")]
    DeviceUnavailable,

    #[error("failed to compile kernel {kernel}: {message}")]
    PipelineCompile {
        kernel: &'static str,
        message: String,
    },

    #[error("gpu dispatch failed: {0}")]
    Dispatch(String),

    #[error("gpu readback failed: {0}")]
    Readback(String),

    /// The input bytes are not a decodable raster image.
    #[error("failed to decode image")]
    Decode(#[source] image::ImageError),

    #[error("invalid data url: {0}")]
    DataUrl(String),

    #[error("failed to encode image")]
    Encode(#[source] image::ImageError),

    /// CPU resize failure from the convolution resizer.
    #[error("cpu resize failed: {0}")]
    Resize(String),

    #[error("invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("resampling cancelled")]
    Cancelled,
}

impl ResampleError {
    /// Errors that are returned to the caller as-is rather than handed to the
    /// next stage of the fallback chain.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Decode(_) | Self::DataUrl(_) | Self::InvalidDimensions { .. } | Self::Cancelled
        )
    }
}
