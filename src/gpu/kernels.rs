//! Registry of compute kernels and their uniform blocks.
//!
//! Every kernel shares one bind-group layout: `0` sampled source texture,
//! `1` linear clamp sampler, `2` write-only `rgba8unorm` storage texture and
//! `3` a 32-byte uniform block. Sources are composed from the WGSL files under
//! `shaders/` so helpers such as the Lanczos weights are written once.

use bytemuck::{Pod, Zeroable};
use config_model::ColorAdjustment;

const RESAMPLE_COMMON: &str = include_str!("shaders/resample_common.wgsl");
const LANCZOS_WEIGHTS: &str = include_str!("shaders/lanczos_weights.wgsl");
const BOX_DOWNSCALE: &str = include_str!("shaders/box_downscale.wgsl");
const BICUBIC_UPSCALE: &str = include_str!("shaders/bicubic_upscale.wgsl");
const LANCZOS_UPSCALE: &str = include_str!("shaders/lanczos_upscale.wgsl");
const SUPERRES_UPSCALE: &str = include_str!("shaders/superres_upscale.wgsl");
const COLOR_ADJUST: &str = include_str!("shaders/color_adjust.wgsl");

pub const WORKGROUP_SIZE: (u32, u32) = (8, 8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelId {
    BoxDownscale,
    BicubicUpscale,
    LanczosUpscale,
    SuperResUpscale,
    ColorAdjust,
}

impl KernelId {
    pub const COUNT: usize = 5;
    pub const ALL: [KernelId; Self::COUNT] = [
        Self::BoxDownscale,
        Self::BicubicUpscale,
        Self::LanczosUpscale,
        Self::SuperResUpscale,
        Self::ColorAdjust,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn descriptor(self) -> &'static KernelDescriptor {
        &KERNELS[self.index()]
    }

    pub fn label(self) -> &'static str {
        self.descriptor().label
    }
}

#[derive(Debug)]
pub struct KernelDescriptor {
    pub id: KernelId,
    pub label: &'static str,
    pub entry_point: &'static str,
    pub workgroup_size: (u32, u32),
    pub uniform_size: u64,
    sources: &'static [&'static str],
}

impl KernelDescriptor {
    pub fn wgsl(&self) -> String {
        self.sources.join("\n")
    }

    /// Workgroup counts covering a `width` x `height` output.
    pub fn dispatch_size(&self, width: u32, height: u32) -> (u32, u32) {
        (
            width.div_ceil(self.workgroup_size.0),
            height.div_ceil(self.workgroup_size.1),
        )
    }
}

static KERNELS: [KernelDescriptor; KernelId::COUNT] = [
    KernelDescriptor {
        id: KernelId::BoxDownscale,
        label: "box-downscale",
        entry_point: "box_downscale",
        workgroup_size: WORKGROUP_SIZE,
        uniform_size: size_of::<ResampleUniforms>() as u64,
        sources: &[RESAMPLE_COMMON, BOX_DOWNSCALE],
    },
    KernelDescriptor {
        id: KernelId::BicubicUpscale,
        label: "bicubic-upscale",
        entry_point: "bicubic_upscale",
        workgroup_size: WORKGROUP_SIZE,
        uniform_size: size_of::<ResampleUniforms>() as u64,
        sources: &[RESAMPLE_COMMON, BICUBIC_UPSCALE],
    },
    KernelDescriptor {
        id: KernelId::LanczosUpscale,
        label: "lanczos-upscale",
        entry_point: "lanczos_upscale",
        workgroup_size: WORKGROUP_SIZE,
        uniform_size: size_of::<ResampleUniforms>() as u64,
        sources: &[RESAMPLE_COMMON, LANCZOS_WEIGHTS, LANCZOS_UPSCALE],
    },
    KernelDescriptor {
        id: KernelId::SuperResUpscale,
        label: "superres-upscale",
        entry_point: "superres_upscale",
        workgroup_size: WORKGROUP_SIZE,
        uniform_size: size_of::<ResampleUniforms>() as u64,
        sources: &[RESAMPLE_COMMON, LANCZOS_WEIGHTS, SUPERRES_UPSCALE],
    },
    KernelDescriptor {
        id: KernelId::ColorAdjust,
        label: "color-adjust",
        entry_point: "color_adjust",
        workgroup_size: WORKGROUP_SIZE,
        uniform_size: size_of::<ColorAdjustUniforms>() as u64,
        sources: &[COLOR_ADJUST],
    },
];

/// Uniform block of the resampling kernels.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ResampleUniforms {
    pub src_size: [u32; 2],
    pub dst_size: [u32; 2],
    pub sharpening: f32,
    pub edge_threshold: f32,
    pub _pad: [f32; 2],
}

impl ResampleUniforms {
    pub fn new(src: (u32, u32), dst: (u32, u32), sharpening: f32, edge_threshold: f32) -> Self {
        Self {
            src_size: [src.0, src.1],
            dst_size: [dst.0, dst.1],
            sharpening,
            edge_threshold,
            _pad: [0.0; 2],
        }
    }
}

/// Uniform block of the frame colour-adjust kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ColorAdjustUniforms {
    pub size: [u32; 2],
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub sharpen: f32,
    pub texel: [f32; 2],
}

impl ColorAdjustUniforms {
    pub fn new(width: u32, height: u32, adjustment: &ColorAdjustment) -> Self {
        Self {
            size: [width, height],
            brightness: adjustment.brightness,
            contrast: adjustment.contrast,
            saturation: adjustment.saturation,
            sharpen: adjustment.sharpen,
            texel: [1.0 / width.max(1) as f32, 1.0 / height.max(1) as f32],
        }
    }
}
