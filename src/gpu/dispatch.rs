use image::RgbaImage;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::context::GpuContext;
use super::pipeline::CompiledKernel;
use super::resources::{ScopedBuffer, ScopedTexture, compute_padded_stride, strip_row_padding};
use crate::error::{ResampleError, Result};

/// Everything a single dispatch owns until its readback completes.
struct StagedDispatch {
    _source: ScopedTexture,
    _output: ScopedTexture,
    readback: ScopedBuffer,
    commands: wgpu::CommandBuffer,
}

/// Runs `kernel` over `source` into a fresh `out_w` x `out_h` image, with
/// `uniforms` uploaded to a transient uniform buffer.
pub async fn run_kernel(
    ctx: &GpuContext,
    kernel: &CompiledKernel,
    source: &RgbaImage,
    (out_w, out_h): (u32, u32),
    uniforms: &[u8],
    cancel: &CancellationToken,
) -> Result<RgbaImage> {
    if uniforms.len() as u64 != kernel.descriptor.uniform_size {
        return Err(ResampleError::Dispatch(format!(
            "{} expects {} uniform bytes, got {}",
            kernel.descriptor.label,
            kernel.descriptor.uniform_size,
            uniforms.len()
        )));
    }
    let uniform_buffer = ScopedBuffer::with_contents(
        &ctx.device,
        &ctx.ledger,
        "resample-uniforms",
        uniforms,
        wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    );
    run_kernel_with(ctx, kernel, source, (out_w, out_h), &uniform_buffer, cancel).await
}

/// Like [`run_kernel`] but binds a caller-owned uniform buffer, which must
/// already hold the values for this dispatch.
pub async fn run_kernel_with(
    ctx: &GpuContext,
    kernel: &CompiledKernel,
    source: &RgbaImage,
    (out_w, out_h): (u32, u32),
    uniforms: &wgpu::Buffer,
    cancel: &CancellationToken,
) -> Result<RgbaImage> {
    ctx.ensure_fits(source.width(), source.height())?;
    ctx.ensure_fits(out_w, out_h)?;
    if cancel.is_cancelled() {
        return Err(ResampleError::Cancelled);
    }

    let _submission = ctx.submission.lock().await;
    // No early return between push and pop: scopes must stay paired.
    ctx.device.push_error_scope(wgpu::ErrorFilter::Validation);
    let staged = encode(ctx, kernel, source, (out_w, out_h), uniforms);
    if let Some(err) = ctx.device.pop_error_scope().await {
        return Err(ResampleError::Dispatch(err.to_string()));
    }
    if cancel.is_cancelled() {
        return Err(ResampleError::Cancelled);
    }

    ctx.queue.submit(Some(staged.commands));
    let slice = staged.readback.slice(..);
    let (tx, rx) = oneshot::channel();
    slice.map_async(wgpu::MapMode::Read, move |res| {
        let _ = tx.send(res);
    });
    ctx.device
        .poll(wgpu::PollType::Wait)
        .map_err(|err| ResampleError::Readback(err.to_string()))?;
    rx.await
        .map_err(|_| ResampleError::Readback("map callback dropped".into()))?
        .map_err(|err| ResampleError::Readback(err.to_string()))?;
    let padded = slice.get_mapped_range().to_vec();
    staged.readback.unmap();
    trace!(
        kernel = kernel.descriptor.label,
        width = out_w,
        height = out_h,
        "readback complete"
    );

    if cancel.is_cancelled() {
        return Err(ResampleError::Cancelled);
    }
    let pixels = strip_row_padding(&padded, out_w, out_h)?;
    RgbaImage::from_raw(out_w, out_h, pixels)
        .ok_or_else(|| ResampleError::Readback("readback size mismatch".into()))
}

fn encode(
    ctx: &GpuContext,
    kernel: &CompiledKernel,
    source: &RgbaImage,
    (out_w, out_h): (u32, u32),
    uniforms: &wgpu::Buffer,
) -> StagedDispatch {
    let src_extent = wgpu::Extent3d {
        width: source.width(),
        height: source.height(),
        depth_or_array_layers: 1,
    };
    let src_texture = ScopedTexture::new(
        &ctx.device,
        &ctx.ledger,
        &wgpu::TextureDescriptor {
            label: Some("resample-source"),
            size: src_extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
    );
    ctx.queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &*src_texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        source.as_raw(),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(source.width() * 4),
            rows_per_image: Some(source.height()),
        },
        src_extent,
    );

    let out_extent = wgpu::Extent3d {
        width: out_w,
        height: out_h,
        depth_or_array_layers: 1,
    };
    let out_texture = ScopedTexture::new(
        &ctx.device,
        &ctx.ledger,
        &wgpu::TextureDescriptor {
            label: Some("resample-output"),
            size: out_extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        },
    );
    let padded_stride = compute_padded_stride(out_w * 4);
    let readback = ScopedBuffer::new(
        &ctx.device,
        &ctx.ledger,
        &wgpu::BufferDescriptor {
            label: Some("resample-readback"),
            size: padded_stride as u64 * out_h as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        },
    );

    let src_view = src_texture.view();
    let out_view = out_texture.view();
    let bind = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("resample-bind"),
        layout: &ctx.bind_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&src_view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&ctx.sampler),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(&out_view),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::Buffer(uniforms.as_entire_buffer_binding()),
            },
        ],
    });

    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("resample-command"),
        });
    {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(kernel.descriptor.label),
            timestamp_writes: None,
        });
        pass.set_pipeline(&kernel.pipeline);
        pass.set_bind_group(0, &bind, &[]);
        let (groups_x, groups_y) = kernel.descriptor.dispatch_size(out_w, out_h);
        pass.dispatch_workgroups(groups_x, groups_y, 1);
    }
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: &*out_texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &*readback,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_stride),
                rows_per_image: Some(out_h),
            },
        },
        out_extent,
    );

    StagedDispatch {
        _source: src_texture,
        _output: out_texture,
        readback,
        commands: encoder.finish(),
    }
}
