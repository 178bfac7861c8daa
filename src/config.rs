use std::path::Path;
use std::sync::{PoisonError, RwLock};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use tracing::debug;

use crate::gpu::context::ContextConfig;

pub use config_model::{
    ColorAdjustment, ConfigOverride, OptimizationConfig, Preset, UpscaleAlgorithm,
};

/// Edge-strength threshold at which the super-resolution contrast boost starts.
pub const DEFAULT_EDGE_THRESHOLD: f32 = 0.15;

/// Which engines the resampler may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResampleBackend {
    /// GPU compute when available, CPU resize otherwise.
    #[default]
    Auto,
    /// Never touch the GPU.
    Cpu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PowerPreference {
    #[default]
    HighPerformance,
    LowPower,
    None,
}

impl From<PowerPreference> for wgpu::PowerPreference {
    fn from(value: PowerPreference) -> Self {
        match value {
            PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
            PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
            PowerPreference::None => wgpu::PowerPreference::None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct GpuSettings {
    pub power_preference: PowerPreference,
    /// Request a software adapter (useful on headless hosts).
    pub force_fallback_adapter: bool,
}

/// On-disk configuration for the CLI and embedding services.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    pub backend: ResampleBackend,
    /// Preset the active optimization config starts from.
    pub preset: Preset,
    /// Field-level overrides applied on top of `preset`.
    pub overrides: ConfigOverride,
    pub gpu: GpuSettings,
    /// Default colour adjustment for frame playback.
    pub playback: ColorAdjustment,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        self.optimization()?;
        self.playback
            .validate()
            .context("invalid playback adjustment")?;
        Ok(self)
    }

    /// The preset merged with `overrides`.
    pub fn optimization(&self) -> Result<OptimizationConfig> {
        let merged = self.preset.config().merged(&self.overrides);
        merged
            .validate()
            .with_context(|| format!("overrides on preset '{}' are out of range", self.preset))?;
        Ok(merged)
    }

    pub fn context_config(&self) -> ContextConfig {
        ContextConfig {
            power_preference: self.gpu.power_preference.into(),
            force_fallback_adapter: self.gpu.force_fallback_adapter,
        }
    }
}

/// Process-wide active [`OptimizationConfig`]. Starts from the balanced preset
/// and is never written back to disk.
#[derive(Debug)]
pub struct ConfigStore {
    active: RwLock<OptimizationConfig>,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(Preset::default().config().clone())
    }
}

impl ConfigStore {
    pub fn new(initial: OptimizationConfig) -> Self {
        Self {
            active: RwLock::new(initial),
        }
    }

    /// Returns a copy of the active config.
    pub fn get_config(&self) -> OptimizationConfig {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Merges `partial` into the active config. An out-of-range result is
    /// rejected and the previous config stays active.
    pub fn set_config(&self, partial: &ConfigOverride) -> Result<OptimizationConfig> {
        let mut guard = self.active.write().unwrap_or_else(PoisonError::into_inner);
        let merged = guard.merged(partial);
        merged
            .validate()
            .context("rejected optimization override")?;
        *guard = merged.clone();
        debug!(config = ?merged, "optimization config updated");
        Ok(merged)
    }

    pub fn apply_preset(&self, preset: Preset) -> OptimizationConfig {
        let config = preset.config().clone();
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = config.clone();
        debug!(%preset, "optimization preset applied");
        config
    }

    pub fn get_preset(name: &str) -> Result<&'static OptimizationConfig> {
        let preset: Preset = name
            .parse()
            .map_err(|err| anyhow!("{err}; expected one of ultra, high, balanced, quality"))?;
        Ok(preset.config())
    }
}
