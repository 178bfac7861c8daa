use std::sync::Arc;

use anyhow::{Result, anyhow, bail};
use config_model::ColorAdjustment;
use image::RgbaImage;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ResampleError;
use crate::gpu::context::{GpuContext, GpuContextManager};
use crate::gpu::dispatch;
use crate::gpu::kernels::{ColorAdjustUniforms, KernelId};
use crate::gpu::pipeline::{CompiledKernel, PipelineCache};
use crate::gpu::resources::ScopedBuffer;
use crate::processing::color::apply_css_filters;

mod state;

pub use state::{PlaybackSM, PlaybackState, PlaybackStateChange};

/// Which engine produced a presented frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPath {
    Gpu,
    CssFallback,
}

#[derive(Debug, Clone)]
pub struct PresentedFrame {
    pub index: u64,
    pub image: RgbaImage,
    pub path: RenderPath,
}

/// Receives adjusted frames, e.g. a display surface or an encoder.
pub trait FramePresenter: Send {
    fn present(&mut self, frame: PresentedFrame) -> Result<()>;
}

impl FramePresenter for mpsc::UnboundedSender<PresentedFrame> {
    fn present(&mut self, frame: PresentedFrame) -> Result<()> {
        self.send(frame)
            .map_err(|_| anyhow!("frame presenter channel closed"))
    }
}

struct GpuFrameState {
    ctx: Arc<GpuContext>,
    kernel: Arc<CompiledKernel>,
    uniforms: ScopedBuffer,
}

/// Applies a [`ColorAdjustment`] to every frame of a video source, on the GPU
/// when possible and with CSS-style filters otherwise.
pub struct FrameRenderer<P> {
    gpu: Arc<GpuContextManager>,
    pipelines: Arc<PipelineCache>,
    presenter: P,
    sm: PlaybackSM,
    adjustment: ColorAdjustment,
    source: Option<(u32, u32)>,
    gpu_state: Option<GpuFrameState>,
    frames: u64,
}

impl<P: FramePresenter> FrameRenderer<P> {
    pub fn new(gpu: Arc<GpuContextManager>, pipelines: Arc<PipelineCache>, presenter: P) -> Self {
        Self {
            gpu,
            pipelines,
            presenter,
            sm: PlaybackSM::new(),
            adjustment: ColorAdjustment::default(),
            source: None,
            gpu_state: None,
            frames: 0,
        }
    }

    pub fn with_adjustment(mut self, adjustment: ColorAdjustment) -> Self {
        self.adjustment = adjustment;
        self
    }

    pub fn state(&self) -> PlaybackState {
        self.sm.current()
    }

    pub fn adjustment(&self) -> ColorAdjustment {
        self.adjustment
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    pub fn uses_gpu(&self) -> bool {
        self.gpu_state.is_some()
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Attaches a `width` x `height` source and prepares the colour-adjust
    /// kernel. GPU setup failures leave the renderer on the CSS fallback.
    pub async fn load(&mut self, width: u32, height: u32) -> Result<Option<PlaybackStateChange>> {
        if self.sm.current() == PlaybackState::Destroyed {
            bail!("frame renderer has been destroyed");
        }
        if width == 0 || height == 0 {
            return Err(ResampleError::InvalidDimensions { width, height }.into());
        }
        self.source = Some((width, height));
        if self.gpu_state.is_none() {
            self.gpu_state = prepare_gpu(&self.gpu, &self.pipelines).await;
        }
        info!(width, height, gpu = self.gpu_state.is_some(), "frame source loaded");
        Ok(self.sm.on_load())
    }

    pub fn play(&mut self) -> Option<PlaybackStateChange> {
        self.sm.on_play()
    }

    pub fn pause(&mut self) -> Option<PlaybackStateChange> {
        self.sm.on_pause()
    }

    pub fn finish(&mut self) -> Option<PlaybackStateChange> {
        self.sm.on_end()
    }

    /// Releases the uniform buffer and detaches the source.
    pub fn destroy(&mut self) -> Option<PlaybackStateChange> {
        self.gpu_state = None;
        self.source = None;
        self.sm.on_destroy()
    }

    pub fn set_adjustment(&mut self, adjustment: ColorAdjustment) -> Result<()> {
        adjustment.validate()?;
        self.adjustment = adjustment;
        debug!(?adjustment, "frame adjustment updated");
        Ok(())
    }

    /// Adjusts one frame and hands it to the presenter.
    pub async fn render_frame(
        &mut self,
        frame: &RgbaImage,
        cancel: &CancellationToken,
    ) -> Result<RenderPath> {
        if !self.sm.can_render() {
            bail!("cannot render a frame while {:?}", self.sm.current());
        }
        if self.source != Some(frame.dimensions()) {
            debug!(
                width = frame.width(),
                height = frame.height(),
                "frame size differs from loaded source"
            );
            self.source = Some(frame.dimensions());
        }

        let gpu_result = match self.gpu_state.as_ref() {
            Some(gpu) => Some(render_gpu(gpu, &self.adjustment, frame, cancel).await),
            None => None,
        };
        let (image, path) = match gpu_result {
            Some(Ok(image)) => (image, RenderPath::Gpu),
            Some(Err(ResampleError::Cancelled)) => return Err(ResampleError::Cancelled.into()),
            Some(Err(err)) => {
                warn!(error = %err, "gpu frame adjust failed, switching to css filters");
                self.gpu_state = None;
                (self.render_css(frame), RenderPath::CssFallback)
            }
            None => (self.render_css(frame), RenderPath::CssFallback),
        };

        self.presenter.present(PresentedFrame {
            index: self.frames,
            image,
            path,
        })?;
        self.frames += 1;
        Ok(path)
    }

    fn render_css(&self, frame: &RgbaImage) -> RgbaImage {
        let mut image = frame.clone();
        apply_css_filters(&mut image, &self.adjustment);
        image
    }
}

async fn prepare_gpu(gpu: &GpuContextManager, pipelines: &PipelineCache) -> Option<GpuFrameState> {
    let ctx = gpu.acquire().await?;
    let kernel = match pipelines.get_or_compile(&ctx, KernelId::ColorAdjust).await {
        Ok(kernel) => kernel,
        Err(err) => {
            warn!(error = %err, "colour adjust kernel unavailable, using css filters");
            return None;
        }
    };
    let uniforms = ScopedBuffer::new(
        &ctx.device,
        &ctx.ledger,
        &wgpu::BufferDescriptor {
            label: Some("frame-adjust-uniforms"),
            size: KernelId::ColorAdjust.descriptor().uniform_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        },
    );
    Some(GpuFrameState {
        ctx,
        kernel,
        uniforms,
    })
}

async fn render_gpu(
    gpu: &GpuFrameState,
    adjustment: &ColorAdjustment,
    frame: &RgbaImage,
    cancel: &CancellationToken,
) -> Result<RgbaImage, ResampleError> {
    let uniforms = ColorAdjustUniforms::new(frame.width(), frame.height(), adjustment);
    gpu.ctx
        .queue
        .write_buffer(&gpu.uniforms, 0, bytemuck::bytes_of(&uniforms));
    dispatch::run_kernel_with(
        &gpu.ctx,
        &gpu.kernel,
        frame,
        frame.dimensions(),
        &gpu.uniforms,
        cancel,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn cpu_renderer() -> (
        FrameRenderer<mpsc::UnboundedSender<PresentedFrame>>,
        mpsc::UnboundedReceiver<PresentedFrame>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let renderer = FrameRenderer::new(
            Arc::new(GpuContextManager::disabled()),
            Arc::new(PipelineCache::new()),
            tx,
        );
        (renderer, rx)
    }

    #[tokio::test]
    async fn css_fallback_presents_adjusted_frames() {
        let (mut renderer, mut rx) = cpu_renderer();
        renderer.load(2, 2).await.unwrap();
        assert!(!renderer.uses_gpu());
        renderer.play().unwrap();
        renderer
            .set_adjustment(ColorAdjustment {
                saturation: 0.0,
                ..Default::default()
            })
            .unwrap();

        let frame = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]));
        let path = renderer
            .render_frame(&frame, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(path, RenderPath::CssFallback);

        let presented = rx.recv().await.unwrap();
        assert_eq!(presented.index, 0);
        let px = presented.image.get_pixel(1, 1);
        assert_eq!(px[0], px[1]);
        assert_eq!(renderer.frames_rendered(), 1);
    }

    #[tokio::test]
    async fn refuses_frames_before_play_and_after_destroy() {
        let (mut renderer, _rx) = cpu_renderer();
        let frame = RgbaImage::new(1, 1);
        let cancel = CancellationToken::new();
        assert!(renderer.render_frame(&frame, &cancel).await.is_err());

        renderer.load(1, 1).await.unwrap();
        assert!(renderer.render_frame(&frame, &cancel).await.is_err());

        renderer.play();
        renderer.destroy().unwrap();
        assert_eq!(renderer.state(), PlaybackState::Destroyed);
        assert!(renderer.render_frame(&frame, &cancel).await.is_err());
        assert!(renderer.load(1, 1).await.is_err());
    }

    #[tokio::test]
    async fn invalid_adjustment_is_rejected() {
        let (mut renderer, _rx) = cpu_renderer();
        let bad = ColorAdjustment {
            brightness: -2.0,
            ..Default::default()
        };
        assert!(renderer.set_adjustment(bad).is_err());
        assert_eq!(renderer.adjustment(), ColorAdjustment::default());
    }
}
