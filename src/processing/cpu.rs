use std::borrow::Cow;

use fast_image_resize as fir;
use image::RgbaImage;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::{ResampleError, Result};

/// Intermediate sizes visited by [`downscale_progressive`], ending with the
/// exact target. Each step halves both sides while the halved size still
/// covers the target.
pub fn halving_plan(src_w: u32, src_h: u32, target_w: u32, target_h: u32) -> Vec<(u32, u32)> {
    let mut plan = Vec::new();
    let (mut w, mut h) = (src_w, src_h);
    while w / 2 >= target_w && h / 2 >= target_h && target_w > 0 && target_h > 0 {
        w /= 2;
        h /= 2;
        plan.push((w, h));
    }
    if (w, h) != (target_w, target_h) {
        plan.push((target_w, target_h));
    }
    plan
}

/// Shrinks `source` by repeated smoothing halvings followed by one Catmull-Rom
/// pass to the exact target. The token is checked before every step.
pub fn downscale_progressive(
    source: &RgbaImage,
    target_w: u32,
    target_h: u32,
    cancel: &CancellationToken,
) -> Result<RgbaImage> {
    ensure_positive(target_w, target_h)?;
    let plan = halving_plan(source.width(), source.height(), target_w, target_h);
    let mut current = Cow::Borrowed(source);
    for (idx, &(w, h)) in plan.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(ResampleError::Cancelled);
        }
        let filter = if idx + 1 == plan.len() {
            fir::FilterType::CatmullRom
        } else {
            fir::FilterType::Bilinear
        };
        trace!(step = idx, width = w, height = h, "cpu downscale step");
        current = Cow::Owned(resize_rgba(&current, w, h, filter)?);
    }
    Ok(current.into_owned())
}

/// Enlarges `source` with a single Lanczos-3 convolution.
pub fn upscale_single_pass(source: &RgbaImage, target_w: u32, target_h: u32) -> Result<RgbaImage> {
    ensure_positive(target_w, target_h)?;
    if source.dimensions() == (target_w, target_h) {
        return Ok(source.clone());
    }
    resize_rgba(source, target_w, target_h, fir::FilterType::Lanczos3)
}

fn ensure_positive(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(ResampleError::InvalidDimensions { width, height });
    }
    Ok(())
}

fn resize_rgba(
    source: &RgbaImage,
    target_w: u32,
    target_h: u32,
    filter: fir::FilterType,
) -> Result<RgbaImage> {
    let src_view = fir::images::ImageRef::new(
        source.width(),
        source.height(),
        source.as_raw(),
        fir::PixelType::U8x4,
    )
    .map_err(|err| ResampleError::Resize(format!("source view: {err}")))?;
    let mut dst_image = fir::images::Image::new(target_w, target_h, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new().resize_alg(fir::ResizeAlg::Convolution(filter));
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_view, &mut dst_image, Some(&options))
        .map_err(|err| ResampleError::Resize(err.to_string()))?;
    RgbaImage::from_raw(target_w, target_h, dst_image.into_vec())
        .ok_or_else(|| ResampleError::Resize("resized buffer has unexpected length".into()))
}
