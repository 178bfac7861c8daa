use std::borrow::Cow;
use std::sync::Arc;

use anyhow::Context;
use image::RgbaImage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec;
use crate::config::{
    ColorAdjustment, ConfigStore, Configuration, DEFAULT_EDGE_THRESHOLD, OptimizationConfig,
    ResampleBackend, UpscaleAlgorithm,
};
use crate::error::{ResampleError, Result};
use crate::gpu::context::{ContextConfig, GpuContextManager};
use crate::gpu::dispatch;
use crate::gpu::kernels::{KernelId, ResampleUniforms};
use crate::gpu::pipeline::PipelineCache;
use crate::processing::{cpu, layout};
use crate::tasks::frame_renderer::{FramePresenter, FrameRenderer};

/// Interpolation requested for a single resample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResampleAlgorithm {
    BoxDownscale,
    Bicubic,
    Lanczos,
    SuperRes,
}

impl ResampleAlgorithm {
    pub fn kernel(self) -> KernelId {
        match self {
            Self::BoxDownscale => KernelId::BoxDownscale,
            Self::Bicubic => KernelId::BicubicUpscale,
            Self::Lanczos => KernelId::LanczosUpscale,
            Self::SuperRes => KernelId::SuperResUpscale,
        }
    }
}

impl From<UpscaleAlgorithm> for ResampleAlgorithm {
    fn from(value: UpscaleAlgorithm) -> Self {
        match value {
            UpscaleAlgorithm::Bicubic => Self::Bicubic,
            UpscaleAlgorithm::Superres => Self::SuperRes,
            UpscaleAlgorithm::Lanczos => Self::Lanczos,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ResampleRequest<'a> {
    pub source: &'a RgbaImage,
    pub target_width: u32,
    pub target_height: u32,
    pub algorithm: ResampleAlgorithm,
    pub sharpening: f32,
    pub edge_threshold: f32,
}

impl<'a> ResampleRequest<'a> {
    pub fn downscale(source: &'a RgbaImage, target_width: u32, target_height: u32) -> Self {
        Self {
            source,
            target_width,
            target_height,
            algorithm: ResampleAlgorithm::BoxDownscale,
            sharpening: 0.0,
            edge_threshold: 1.0,
        }
    }

    fn target(&self) -> (u32, u32) {
        (self.target_width, self.target_height)
    }
}

/// How an image is enlarged for display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpscaleOptions {
    /// Longest side of the result.
    pub target_dimension: u32,
    pub algorithm: UpscaleAlgorithm,
    pub sharpening: f32,
    pub edge_enhancement: bool,
}

impl UpscaleOptions {
    /// Plain bicubic enlargement without sharpening.
    pub fn bicubic(target_dimension: u32) -> Self {
        Self {
            target_dimension,
            algorithm: UpscaleAlgorithm::Bicubic,
            sharpening: 0.0,
            edge_enhancement: false,
        }
    }

    pub fn from_config(config: &OptimizationConfig) -> Self {
        Self {
            target_dimension: config.target_output_dimension,
            algorithm: config.upscale_algorithm,
            sharpening: config.sharpening_intensity,
            edge_enhancement: config.edge_enhancement,
        }
    }

    /// Threshold handed to the super-resolution kernel; `1.0` keeps the
    /// contrast boost off.
    pub fn edge_threshold(&self) -> f32 {
        if self.edge_enhancement {
            DEFAULT_EDGE_THRESHOLD
        } else {
            1.0
        }
    }
}

/// Shrinks and enlarges images on the GPU, degrading to CPU resizing and
/// finally to the untouched input.
#[derive(Debug)]
pub struct Resampler {
    gpu: Arc<GpuContextManager>,
    pipelines: Arc<PipelineCache>,
    config: ConfigStore,
    backend: ResampleBackend,
    /// Starting adjustment for frame renderers created by this resampler.
    playback: ColorAdjustment,
}

impl Resampler {
    pub fn new(
        gpu: Arc<GpuContextManager>,
        pipelines: Arc<PipelineCache>,
        backend: ResampleBackend,
    ) -> Self {
        Self {
            gpu,
            pipelines,
            config: ConfigStore::default(),
            backend,
            playback: ColorAdjustment::default(),
        }
    }

    /// Auto backend on the default adapter.
    pub fn with_defaults() -> Self {
        Self::new(
            Arc::new(GpuContextManager::new(ContextConfig::default())),
            Arc::new(PipelineCache::new()),
            ResampleBackend::Auto,
        )
    }

    /// Never touches the GPU.
    pub fn cpu_only() -> Self {
        Self::new(
            Arc::new(GpuContextManager::disabled()),
            Arc::new(PipelineCache::new()),
            ResampleBackend::Cpu,
        )
    }

    pub fn from_configuration(cfg: &Configuration) -> anyhow::Result<Self> {
        let gpu = match cfg.backend {
            ResampleBackend::Auto => GpuContextManager::new(cfg.context_config()),
            ResampleBackend::Cpu => GpuContextManager::disabled(),
        };
        let optimization = cfg
            .optimization()
            .context("resolving optimization config")?;
        cfg.playback
            .validate()
            .context("invalid playback adjustment")?;
        Ok(Self {
            gpu: Arc::new(gpu),
            pipelines: Arc::new(PipelineCache::new()),
            config: ConfigStore::new(optimization),
            backend: cfg.backend,
            playback: cfg.playback,
        })
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn gpu(&self) -> &Arc<GpuContextManager> {
        &self.gpu
    }

    pub fn pipelines(&self) -> &Arc<PipelineCache> {
        &self.pipelines
    }

    pub fn backend(&self) -> ResampleBackend {
        self.backend
    }

    pub fn playback_adjustment(&self) -> ColorAdjustment {
        self.playback
    }

    /// Shrinks encoded image bytes so the longest side is at most
    /// `max_dimension`, re-encoding as JPEG at `quality`. Images that already
    /// fit are returned as the original bytes.
    pub async fn downscale<'a>(
        &self,
        bytes: &'a [u8],
        max_dimension: u32,
        quality: f32,
    ) -> Result<Cow<'a, [u8]>> {
        self.downscale_with_cancel(bytes, max_dimension, quality, &CancellationToken::new())
            .await
    }

    pub async fn downscale_with_cancel<'a>(
        &self,
        bytes: &'a [u8],
        max_dimension: u32,
        quality: f32,
        cancel: &CancellationToken,
    ) -> Result<Cow<'a, [u8]>> {
        let image = codec::decode(bytes)?;
        let resized = self.downscale_image(&image, max_dimension, cancel).await?;
        let Cow::Owned(resized) = resized else {
            return Ok(Cow::Borrowed(bytes));
        };
        match codec::encode_jpeg(&resized, quality) {
            Ok(encoded) => {
                info!(
                    from_width = image.width(),
                    from_height = image.height(),
                    to_width = resized.width(),
                    to_height = resized.height(),
                    bytes_in = bytes.len(),
                    bytes_out = encoded.len(),
                    "downscaled image"
                );
                Ok(Cow::Owned(encoded))
            }
            Err(err) => {
                warn!(error = %err, "re-encoding failed, keeping original bytes");
                Ok(Cow::Borrowed(bytes))
            }
        }
    }

    /// Pixel-level downscale; borrowed when no resize was needed or every
    /// engine failed.
    pub async fn downscale_image<'a>(
        &self,
        image: &'a RgbaImage,
        max_dimension: u32,
        cancel: &CancellationToken,
    ) -> Result<Cow<'a, RgbaImage>> {
        if max_dimension == 0 {
            return Err(ResampleError::InvalidDimensions {
                width: 0,
                height: 0,
            });
        }
        let Some((w, h)) = layout::downscale_target(image.width(), image.height(), max_dimension)
        else {
            debug!(
                width = image.width(),
                height = image.height(),
                max_dimension,
                "image already within limit"
            );
            return Ok(Cow::Borrowed(image));
        };
        self.resample(ResampleRequest::downscale(image, w, h), cancel)
            .await
    }

    /// Enlarges encoded image bytes with bicubic interpolation.
    pub async fn upscale(&self, bytes: &[u8], target_dimension: u32) -> Result<RgbaImage> {
        let options = UpscaleOptions::bicubic(target_dimension);
        self.upscale_decoded(bytes, &options).await
    }

    /// Enlarges encoded image bytes with the active config's algorithm and
    /// sharpening.
    pub async fn enhance(&self, bytes: &[u8], target_dimension: u32) -> Result<RgbaImage> {
        let options = UpscaleOptions {
            target_dimension,
            ..UpscaleOptions::from_config(&self.config.get_config())
        };
        self.upscale_decoded(bytes, &options).await
    }

    async fn upscale_decoded(&self, bytes: &[u8], options: &UpscaleOptions) -> Result<RgbaImage> {
        let image = codec::decode(bytes)?;
        if layout::upscale_target(image.width(), image.height(), options.target_dimension)
            .is_none()
        {
            return Ok(image);
        }
        let upscaled = self
            .upscale_image(&image, options, &CancellationToken::new())
            .await?;
        Ok(upscaled.into_owned())
    }

    /// Pixel-level upscale; borrowed when the image is already large enough
    /// or every engine failed.
    pub async fn upscale_image<'a>(
        &self,
        image: &'a RgbaImage,
        options: &UpscaleOptions,
        cancel: &CancellationToken,
    ) -> Result<Cow<'a, RgbaImage>> {
        if options.target_dimension == 0 {
            return Err(ResampleError::InvalidDimensions {
                width: 0,
                height: 0,
            });
        }
        let Some((w, h)) =
            layout::upscale_target(image.width(), image.height(), options.target_dimension)
        else {
            return Ok(Cow::Borrowed(image));
        };
        let request = ResampleRequest {
            source: image,
            target_width: w,
            target_height: h,
            algorithm: options.algorithm.into(),
            sharpening: options.sharpening,
            edge_threshold: options.edge_threshold(),
        };
        self.resample(request, cancel).await
    }

    /// Shrinks bytes for upload using the active config's input limit and
    /// compression quality.
    pub async fn prepare_for_upload<'a>(&self, bytes: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        let cfg = self.config.get_config();
        self.downscale(bytes, cfg.max_input_dimension, cfg.compression_quality)
            .await
    }

    /// Enlarges bytes for display according to the active config. With
    /// upscaling disabled the decoded image is returned unchanged.
    pub async fn enhance_for_display(&self, bytes: &[u8]) -> Result<RgbaImage> {
        let cfg = self.config.get_config();
        if !cfg.enable_upscaling {
            return codec::decode(bytes);
        }
        self.upscale_decoded(bytes, &UpscaleOptions::from_config(&cfg))
            .await
    }

    /// Runs `request` on the GPU, then the CPU, then gives back the source.
    pub async fn resample<'a>(
        &self,
        request: ResampleRequest<'a>,
        cancel: &CancellationToken,
    ) -> Result<Cow<'a, RgbaImage>> {
        let (w, h) = request.target();
        if w == 0 || h == 0 {
            return Err(ResampleError::InvalidDimensions {
                width: w,
                height: h,
            });
        }
        if cancel.is_cancelled() {
            return Err(ResampleError::Cancelled);
        }
        if request.source.dimensions() == (w, h) {
            return Ok(Cow::Borrowed(request.source));
        }

        if self.backend == ResampleBackend::Auto {
            match self.resample_gpu(&request, cancel).await {
                Ok(image) => return Ok(Cow::Owned(image)),
                Err(err) if err.is_terminal() => return Err(err),
                Err(ResampleError::DeviceUnavailable) => {
                    debug!("gpu unavailable, resampling on cpu");
                }
                Err(err) => {
                    warn!(
                        error = %err,
                        algorithm = ?request.algorithm,
                        "gpu resample failed, falling back to cpu"
                    );
                }
            }
        }

        cpu_or_original(request.source, resample_cpu(&request, cancel))
    }

    async fn resample_gpu(
        &self,
        request: &ResampleRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<RgbaImage> {
        let ctx = self
            .gpu
            .acquire()
            .await
            .ok_or(ResampleError::DeviceUnavailable)?;
        let kernel = self
            .pipelines
            .get_or_compile(&ctx, request.algorithm.kernel())
            .await?;
        let uniforms = ResampleUniforms::new(
            request.source.dimensions(),
            request.target(),
            request.sharpening,
            request.edge_threshold,
        );
        dispatch::run_kernel(
            &ctx,
            &kernel,
            request.source,
            request.target(),
            bytemuck::bytes_of(&uniforms),
            cancel,
        )
        .await
    }

    /// Compiles every kernel ahead of first use. Returns the number of kernels
    /// ready.
    pub async fn warm_up(&self) -> Result<usize> {
        let ctx = self
            .gpu
            .acquire()
            .await
            .ok_or(ResampleError::DeviceUnavailable)?;
        let mut ready = 0;
        for id in KernelId::ALL {
            match self.pipelines.get_or_compile(&ctx, id).await {
                Ok(_) => ready += 1,
                Err(err) => warn!(kernel = id.label(), error = %err, "warm-up compile failed"),
            }
        }
        Ok(ready)
    }

    pub fn downscale_blocking<'a>(
        &self,
        bytes: &'a [u8],
        max_dimension: u32,
        quality: f32,
    ) -> Result<Cow<'a, [u8]>> {
        pollster::block_on(self.downscale(bytes, max_dimension, quality))
    }

    pub fn upscale_blocking(&self, bytes: &[u8], target_dimension: u32) -> Result<RgbaImage> {
        pollster::block_on(self.upscale(bytes, target_dimension))
    }

    pub fn prepare_for_upload_blocking<'a>(&self, bytes: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        pollster::block_on(self.prepare_for_upload(bytes))
    }

    /// A frame renderer sharing this resampler's device and pipelines,
    /// starting from the configured playback adjustment.
    pub fn frame_renderer<P: FramePresenter>(&self, presenter: P) -> FrameRenderer<P> {
        FrameRenderer::new(Arc::clone(&self.gpu), Arc::clone(&self.pipelines), presenter)
            .with_adjustment(self.playback)
    }
}

fn resample_cpu(request: &ResampleRequest<'_>, cancel: &CancellationToken) -> Result<RgbaImage> {
    let (w, h) = request.target();
    let (sw, sh) = request.source.dimensions();
    if request.algorithm == ResampleAlgorithm::BoxDownscale || (w <= sw && h <= sh) {
        cpu::downscale_progressive(request.source, w, h, cancel)
    } else {
        if cancel.is_cancelled() {
            return Err(ResampleError::Cancelled);
        }
        cpu::upscale_single_pass(request.source, w, h)
    }
}

/// Last tier of the chain: a failed CPU resize hands back the source.
fn cpu_or_original(source: &RgbaImage, result: Result<RgbaImage>) -> Result<Cow<'_, RgbaImage>> {
    match result {
        Ok(image) => Ok(Cow::Owned(image)),
        Err(err) if err.is_terminal() => Err(err),
        Err(err) => {
            warn!(error = %err, "cpu resize failed, returning original image");
            Ok(Cow::Borrowed(source))
        }
    }
}
