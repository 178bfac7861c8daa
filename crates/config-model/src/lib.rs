use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow, ensure};
use serde::{Deserialize, Serialize};

pub use optimization::{ConfigOverride, OptimizationConfig, Preset, UpscaleAlgorithm};
pub use playback::ColorAdjustment;

mod optimization {
    use super::*;

    /// Interpolation used when enlarging an image.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
    #[serde(rename_all = "kebab-case")]
    pub enum UpscaleAlgorithm {
        Bicubic,
        #[serde(alias = "super-resolution")]
        Superres,
        Lanczos,
    }

    impl UpscaleAlgorithm {
        pub const ALL: [UpscaleAlgorithm; 3] = [Self::Bicubic, Self::Superres, Self::Lanczos];

        pub fn name(self) -> &'static str {
            match self {
                Self::Bicubic => "bicubic",
                Self::Superres => "superres",
                Self::Lanczos => "lanczos",
            }
        }
    }

    impl fmt::Display for UpscaleAlgorithm {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.name())
        }
    }

    impl FromStr for UpscaleAlgorithm {
        type Err = anyhow::Error;

        fn from_str(s: &str) -> Result<Self> {
            match s.trim().to_ascii_lowercase().as_str() {
                "bicubic" => Ok(Self::Bicubic),
                "superres" | "super-resolution" => Ok(Self::Superres),
                "lanczos" => Ok(Self::Lanczos),
                other => Err(anyhow!("unknown upscale algorithm '{other}'")),
            }
        }
    }

    /// Quality/cost trade-off applied when preparing images for generative APIs
    /// and when enhancing them for display.
    #[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
    #[serde(rename_all = "kebab-case", deny_unknown_fields)]
    pub struct OptimizationConfig {
        /// Longest side, in pixels, an image may have before it is uploaded.
        pub max_input_dimension: u32,
        /// Longest side, in pixels, images are enlarged to for display.
        pub target_output_dimension: u32,
        /// Lossy encoder quality in `[0, 1]`.
        pub compression_quality: f32,
        pub enable_upscaling: bool,
        pub upscale_algorithm: UpscaleAlgorithm,
        /// Unsharp strength in `[0, 1]` used by the enlarging kernels.
        pub sharpening_intensity: f32,
        /// Enables the local contrast boost of the super-resolution kernel.
        pub edge_enhancement: bool,
    }

    static PRESETS: [OptimizationConfig; 4] = [
        OptimizationConfig {
            max_input_dimension: 512,
            target_output_dimension: 1024,
            compression_quality: 0.6,
            enable_upscaling: true,
            upscale_algorithm: UpscaleAlgorithm::Bicubic,
            sharpening_intensity: 0.3,
            edge_enhancement: false,
        },
        OptimizationConfig {
            max_input_dimension: 768,
            target_output_dimension: 1536,
            compression_quality: 0.75,
            enable_upscaling: true,
            upscale_algorithm: UpscaleAlgorithm::Bicubic,
            sharpening_intensity: 0.4,
            edge_enhancement: true,
        },
        OptimizationConfig {
            max_input_dimension: 1024,
            target_output_dimension: 2048,
            compression_quality: 0.85,
            enable_upscaling: true,
            upscale_algorithm: UpscaleAlgorithm::Superres,
            sharpening_intensity: 0.5,
            edge_enhancement: true,
        },
        OptimizationConfig {
            max_input_dimension: 1536,
            target_output_dimension: 2048,
            compression_quality: 0.92,
            enable_upscaling: true,
            upscale_algorithm: UpscaleAlgorithm::Lanczos,
            sharpening_intensity: 0.35,
            edge_enhancement: true,
        },
    ];

    /// Named, read-only optimization presets.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
    #[serde(rename_all = "kebab-case")]
    pub enum Preset {
        Ultra,
        High,
        #[default]
        Balanced,
        Quality,
    }

    impl Preset {
        pub const ALL: [Preset; 4] = [Self::Ultra, Self::High, Self::Balanced, Self::Quality];

        pub fn name(self) -> &'static str {
            match self {
                Self::Ultra => "ultra",
                Self::High => "high",
                Self::Balanced => "balanced",
                Self::Quality => "quality",
            }
        }

        pub fn config(self) -> &'static OptimizationConfig {
            let idx = match self {
                Self::Ultra => 0,
                Self::High => 1,
                Self::Balanced => 2,
                Self::Quality => 3,
            };
            &PRESETS[idx]
        }
    }

    impl fmt::Display for Preset {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.name())
        }
    }

    impl FromStr for Preset {
        type Err = anyhow::Error;

        fn from_str(s: &str) -> Result<Self> {
            let wanted = s.trim().to_ascii_lowercase();
            Self::ALL
                .into_iter()
                .find(|preset| preset.name() == wanted)
                .ok_or_else(|| anyhow!("unknown preset '{}'", s.trim()))
        }
    }

    impl Default for OptimizationConfig {
        fn default() -> Self {
            Preset::default().config().clone()
        }
    }

    impl OptimizationConfig {
        pub fn validate(&self) -> Result<()> {
            ensure!(
                self.max_input_dimension > 0,
                "max-input-dimension must be positive"
            );
            ensure!(
                self.target_output_dimension > 0,
                "target-output-dimension must be positive"
            );
            ensure!(
                self.compression_quality.is_finite()
                    && (0.0..=1.0).contains(&self.compression_quality),
                "compression-quality must be within [0, 1]"
            );
            ensure!(
                self.sharpening_intensity.is_finite()
                    && (0.0..=1.0).contains(&self.sharpening_intensity),
                "sharpening-intensity must be within [0, 1]"
            );
            Ok(())
        }

        /// Returns a copy with every field present in `partial` replaced.
        pub fn merged(&self, partial: &ConfigOverride) -> Self {
            Self {
                max_input_dimension: partial
                    .max_input_dimension
                    .unwrap_or(self.max_input_dimension),
                target_output_dimension: partial
                    .target_output_dimension
                    .unwrap_or(self.target_output_dimension),
                compression_quality: partial
                    .compression_quality
                    .unwrap_or(self.compression_quality),
                enable_upscaling: partial.enable_upscaling.unwrap_or(self.enable_upscaling),
                upscale_algorithm: partial.upscale_algorithm.unwrap_or(self.upscale_algorithm),
                sharpening_intensity: partial
                    .sharpening_intensity
                    .unwrap_or(self.sharpening_intensity),
                edge_enhancement: partial.edge_enhancement.unwrap_or(self.edge_enhancement),
            }
        }
    }

    /// Partial update for the active [`OptimizationConfig`]; absent fields keep
    /// their current value.
    #[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
    #[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
    pub struct ConfigOverride {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub max_input_dimension: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub target_output_dimension: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub compression_quality: Option<f32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub enable_upscaling: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub upscale_algorithm: Option<UpscaleAlgorithm>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub sharpening_intensity: Option<f32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub edge_enhancement: Option<bool>,
    }

    impl ConfigOverride {
        pub fn is_empty(&self) -> bool {
            self == &Self::default()
        }
    }
}

mod playback {
    use super::*;

    /// Per-frame colour adjustment shared by the GPU pass and the CSS-style
    /// fallback. `1.0` is neutral for brightness, contrast and saturation.
    #[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
    #[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
    pub struct ColorAdjustment {
        pub brightness: f32,
        pub contrast: f32,
        pub saturation: f32,
        /// Fixed-radius sharpen amount; only the GPU path honours it.
        pub sharpen: f32,
    }

    impl Default for ColorAdjustment {
        fn default() -> Self {
            Self {
                brightness: 1.0,
                contrast: 1.0,
                saturation: 1.0,
                sharpen: 0.0,
            }
        }
    }

    impl ColorAdjustment {
        const MAX_FACTOR: f32 = 4.0;

        pub fn is_neutral(&self) -> bool {
            self == &Self::default()
        }

        pub fn validate(&self) -> Result<()> {
            for (field, value) in [
                ("brightness", self.brightness),
                ("contrast", self.contrast),
                ("saturation", self.saturation),
            ] {
                ensure!(
                    value.is_finite() && (0.0..=Self::MAX_FACTOR).contains(&value),
                    "playback.{} must be within [0, {}]",
                    field,
                    Self::MAX_FACTOR
                );
            }
            ensure!(
                self.sharpen.is_finite() && (0.0..=1.0).contains(&self.sharpen),
                "playback.sharpen must be within [0, 1]"
            );
            Ok(())
        }
    }
}
