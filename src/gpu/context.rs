use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::{Context, Result, ensure};
use tokio::sync::{Mutex, OnceCell};
use tracing::{info, warn};

use super::resources::{ResourceCounts, ResourceLedger};
use crate::error::ResampleError;

const STORAGE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Adapter selection knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextConfig {
    pub power_preference: wgpu::PowerPreference,
    pub force_fallback_adapter: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
        }
    }
}

/// Lazily acquires one [`GpuContext`] and remembers the outcome.
///
/// Concurrent first callers share a single in-flight acquisition. Once the
/// device is found to be unavailable no further attempts are made for the
/// lifetime of the manager.
#[derive(Debug)]
pub struct GpuContextManager {
    config: ContextConfig,
    cell: OnceCell<Option<Arc<GpuContext>>>,
    available: AtomicBool,
    attempts: AtomicUsize,
}

impl GpuContextManager {
    pub fn new(config: ContextConfig) -> Self {
        Self {
            config,
            cell: OnceCell::new(),
            available: AtomicBool::new(false),
            attempts: AtomicUsize::new(0),
        }
    }

    /// A manager already resolved to "unavailable".
    pub fn disabled() -> Self {
        Self {
            config: ContextConfig::default(),
            cell: OnceCell::new_with(Some(None)),
            available: AtomicBool::new(false),
            attempts: AtomicUsize::new(0),
        }
    }

    pub async fn acquire(&self) -> Option<Arc<GpuContext>> {
        self.cell
            .get_or_init(|| async {
                self.attempts.fetch_add(1, Ordering::AcqRel);
                match GpuContext::create(&self.config).await {
                    Ok(ctx) => {
                        info!(
                            adapter = %ctx.adapter_info.name,
                            backend = ?ctx.adapter_info.backend,
                            "gpu compute context ready"
                        );
                        self.available.store(true, Ordering::Release);
                        Some(Arc::new(ctx))
                    }
                    Err(err) => {
                        warn!("gpu compute unavailable, using cpu resize: {err:#}");
                        None
                    }
                }
            })
            .await
            .clone()
    }

    /// Last known availability; `false` until an acquisition has succeeded.
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    /// Number of real adapter/device requests made so far.
    pub fn acquisition_attempts(&self) -> usize {
        self.attempts.load(Ordering::Acquire)
    }

    /// Live scoped GPU handles, or `None` before a context exists.
    pub fn live_resources(&self) -> Option<ResourceCounts> {
        self.cell
            .get()
            .and_then(|ctx| ctx.as_ref())
            .map(|ctx| ctx.ledger.counts())
    }
}

/// Device, queue and the objects every kernel dispatch shares.
#[derive(Debug)]
pub struct GpuContext {
    pub adapter_info: wgpu::AdapterInfo,
    pub(crate) device: wgpu::Device,
    pub(crate) queue: wgpu::Queue,
    pub(crate) limits: wgpu::Limits,
    pub(crate) bind_layout: wgpu::BindGroupLayout,
    pub(crate) pipeline_layout: wgpu::PipelineLayout,
    pub(crate) sampler: wgpu::Sampler,
    pub(crate) ledger: Arc<ResourceLedger>,
    /// Serializes error scopes and submissions on the device.
    pub(crate) submission: Mutex<()>,
}

impl GpuContext {
    async fn create(config: &ContextConfig) -> Result<Self> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: config.power_preference,
                compatible_surface: None,
                force_fallback_adapter: config.force_fallback_adapter,
            })
            .await
            .context("request wgpu adapter")?;

        let downlevel = adapter.get_downlevel_capabilities();
        ensure!(
            downlevel
                .flags
                .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS),
            "adapter does not support compute shaders"
        );
        let limits = adapter.limits();
        ensure!(
            limits.max_storage_textures_per_shader_stage > 0,
            "adapter exposes no storage textures to compute shaders"
        );
        let format_features = adapter.get_texture_format_features(STORAGE_FORMAT);
        ensure!(
            format_features
                .allowed_usages
                .contains(wgpu::TextureUsages::STORAGE_BINDING),
            "adapter cannot write {STORAGE_FORMAT:?} storage textures"
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("resampler-device"),
                required_features: wgpu::Features::empty(),
                required_limits: limits.clone(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::default(),
            })
            .await
            .context("request wgpu device")?;
        device.on_uncaptured_error(Box::new(|err| {
            warn!(error = %err, "uncaptured wgpu error");
        }));

        let bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("resample-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: STORAGE_FORMAT,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("resample-pipeline-layout"),
            bind_group_layouts: &[&bind_layout],
            push_constant_ranges: &[],
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("resample-linear-clamp"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Ok(Self {
            adapter_info: adapter.get_info(),
            device,
            queue,
            limits,
            bind_layout,
            pipeline_layout,
            sampler,
            ledger: Arc::new(ResourceLedger::default()),
            submission: Mutex::new(()),
        })
    }

    /// Rejects sizes the device cannot hold as a single 2D texture.
    pub fn ensure_fits(&self, width: u32, height: u32) -> Result<(), ResampleError> {
        if width == 0 || height == 0 {
            return Err(ResampleError::InvalidDimensions { width, height });
        }
        let max = self.limits.max_texture_dimension_2d;
        if width > max || height > max {
            return Err(ResampleError::Unsupported(format!(
                "{width}x{height} exceeds the device texture limit of {max}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::task::JoinSet;

    #[tokio::test]
    async fn disabled_manager_never_attempts_acquisition() {
        let manager = GpuContextManager::disabled();
        assert!(manager.acquire().await.is_none());
        assert!(manager.acquire().await.is_none());
        assert!(!manager.is_available());
        assert_eq!(manager.acquisition_attempts(), 0);
        assert_eq!(manager.live_resources(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_use_is_coalesced() {
        let manager = Arc::new(GpuContextManager::new(ContextConfig::default()));
        let mut tasks = JoinSet::new();
        for _ in 0..8 {
            let manager = Arc::clone(&manager);
            tasks.spawn(async move { manager.acquire().await.is_some() });
        }
        let mut outcomes = Vec::new();
        while let Some(res) = tasks.join_next().await {
            outcomes.push(res.unwrap());
        }
        assert_eq!(manager.acquisition_attempts(), 1);
        assert!(outcomes.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(manager.is_available(), outcomes[0]);

        // A resolved manager does not retry.
        manager.acquire().await;
        assert_eq!(manager.acquisition_attempts(), 1);
    }
}
