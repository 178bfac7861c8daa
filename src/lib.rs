pub mod codec;
pub mod config;
pub mod error;
pub mod resampler;
pub mod gpu {
    pub mod context;
    pub mod dispatch;
    pub mod kernels;
    pub mod pipeline;
    pub mod resources;
}
pub mod processing {
    pub mod color;
    pub mod cpu;
    pub mod layout;
}
pub mod tasks {
    pub mod frame_renderer;
    pub mod playback;
}

pub use config_model::{
    ColorAdjustment, ConfigOverride, OptimizationConfig, Preset, UpscaleAlgorithm,
};
pub use error::{ResampleError, Result};
pub use resampler::{ResampleAlgorithm, ResampleRequest, Resampler, UpscaleOptions};
