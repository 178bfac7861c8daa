use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use wgpu::util::DeviceExt;

use crate::error::{ResampleError, Result};

/// Rounds a row's byte length up to `wgpu::COPY_BYTES_PER_ROW_ALIGNMENT`.
pub fn compute_padded_stride(unpadded_bytes_per_row: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded_bytes_per_row.div_ceil(align) * align
}

/// Reassembles a padded texture readback into tightly packed RGBA rows.
pub fn strip_row_padding(padded: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let row_bytes = width as usize * 4;
    let stride = compute_padded_stride(width * 4) as usize;
    let needed = stride * height.saturating_sub(1) as usize + row_bytes;
    if height > 0 && padded.len() < needed {
        return Err(ResampleError::Readback(format!(
            "readback holds {} bytes, expected at least {needed}",
            padded.len()
        )));
    }
    let mut packed = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        packed.extend_from_slice(&padded[start..start + row_bytes]);
    }
    Ok(packed)
}

/// Counts live GPU handles created through the scoped wrappers.
#[derive(Debug, Default)]
pub struct ResourceLedger {
    textures: AtomicUsize,
    buffers: AtomicUsize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    pub textures: usize,
    pub buffers: usize,
}

impl ResourceLedger {
    pub fn counts(&self) -> ResourceCounts {
        ResourceCounts {
            textures: self.textures.load(Ordering::Acquire),
            buffers: self.buffers.load(Ordering::Acquire),
        }
    }
}

/// Texture destroyed when the guard drops.
#[derive(Debug)]
pub struct ScopedTexture {
    texture: wgpu::Texture,
    ledger: Arc<ResourceLedger>,
}

impl ScopedTexture {
    pub fn new(
        device: &wgpu::Device,
        ledger: &Arc<ResourceLedger>,
        desc: &wgpu::TextureDescriptor<'_>,
    ) -> Self {
        let texture = device.create_texture(desc);
        ledger.textures.fetch_add(1, Ordering::AcqRel);
        Self {
            texture,
            ledger: Arc::clone(ledger),
        }
    }

    pub fn view(&self) -> wgpu::TextureView {
        self.texture
            .create_view(&wgpu::TextureViewDescriptor::default())
    }
}

impl Deref for ScopedTexture {
    type Target = wgpu::Texture;

    fn deref(&self) -> &wgpu::Texture {
        &self.texture
    }
}

impl Drop for ScopedTexture {
    fn drop(&mut self) {
        self.texture.destroy();
        self.ledger.textures.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Buffer destroyed when the guard drops.
#[derive(Debug)]
pub struct ScopedBuffer {
    buffer: wgpu::Buffer,
    ledger: Arc<ResourceLedger>,
}

impl ScopedBuffer {
    pub fn new(
        device: &wgpu::Device,
        ledger: &Arc<ResourceLedger>,
        desc: &wgpu::BufferDescriptor<'_>,
    ) -> Self {
        Self::track(device.create_buffer(desc), ledger)
    }

    pub fn with_contents(
        device: &wgpu::Device,
        ledger: &Arc<ResourceLedger>,
        label: &str,
        contents: &[u8],
        usage: wgpu::BufferUsages,
    ) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents,
            usage,
        });
        Self::track(buffer, ledger)
    }

    fn track(buffer: wgpu::Buffer, ledger: &Arc<ResourceLedger>) -> Self {
        ledger.buffers.fetch_add(1, Ordering::AcqRel);
        Self {
            buffer,
            ledger: Arc::clone(ledger),
        }
    }
}

impl Deref for ScopedBuffer {
    type Target = wgpu::Buffer;

    fn deref(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}

impl Drop for ScopedBuffer {
    fn drop(&mut self) {
        self.buffer.destroy();
        self.ledger.buffers.fetch_sub(1, Ordering::AcqRel);
    }
}
