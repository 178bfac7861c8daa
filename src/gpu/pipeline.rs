use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::context::GpuContext;
use super::kernels::{KernelDescriptor, KernelId};
use crate::error::{ResampleError, Result};

#[derive(Debug)]
pub struct CompiledKernel {
    pub(crate) descriptor: &'static KernelDescriptor,
    pub(crate) pipeline: wgpu::ComputePipeline,
}

/// At most one compiled pipeline per kernel. Compile failures are cached too,
/// so a broken kernel is reported once and then falls back quietly.
///
/// A cache is bound to the device of the first context it compiles for.
#[derive(Debug)]
pub struct PipelineCache {
    slots: [OnceCell<Result<Arc<CompiledKernel>, String>>; KernelId::COUNT],
    compiles: AtomicUsize,
}

impl Default for PipelineCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineCache {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| OnceCell::new()),
            compiles: AtomicUsize::new(0),
        }
    }

    pub async fn get_or_compile(
        &self,
        ctx: &GpuContext,
        id: KernelId,
    ) -> Result<Arc<CompiledKernel>> {
        self.slots[id.index()]
            .get_or_init(|| self.compile(ctx, id))
            .await
            .clone()
            .map_err(|message| ResampleError::PipelineCompile {
                kernel: id.label(),
                message,
            })
    }

    /// Number of compilations actually performed.
    pub fn compile_count(&self) -> usize {
        self.compiles.load(Ordering::Acquire)
    }

    pub fn is_compiled(&self, id: KernelId) -> bool {
        matches!(self.slots[id.index()].get(), Some(Ok(_)))
    }

    async fn compile(&self, ctx: &GpuContext, id: KernelId) -> Result<Arc<CompiledKernel>, String> {
        self.compiles.fetch_add(1, Ordering::AcqRel);
        let descriptor = id.descriptor();
        let _submission = ctx.submission.lock().await;

        ctx.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = ctx
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(descriptor.label),
                source: wgpu::ShaderSource::Wgsl(descriptor.wgsl().into()),
            });
        let pipeline = ctx
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(descriptor.label),
                layout: Some(&ctx.pipeline_layout),
                module: &module,
                entry_point: Some(descriptor.entry_point),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });
        if let Some(err) = ctx.device.pop_error_scope().await {
            let message = err.to_string();
            warn!(kernel = descriptor.label, error = %message, "kernel compilation failed");
            return Err(message);
        }
        debug!(kernel = descriptor.label, "compiled kernel");
        Ok(Arc::new(CompiledKernel {
            descriptor,
            pipeline,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_cache_is_empty() {
        let cache = PipelineCache::new();
        assert_eq!(cache.compile_count(), 0);
        assert!(KernelId::ALL.iter().all(|&id| !cache.is_compiled(id)));
    }
}
