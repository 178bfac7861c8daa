/// Scales `(width, height)` so the longest side equals `longest`, keeping the
/// aspect ratio. The shorter side is rounded and never drops below one pixel.
pub fn fit_longest_side(width: u32, height: u32, longest: u32) -> (u32, u32) {
    let longest = longest.max(1);
    let w = width.max(1) as f64;
    let h = height.max(1) as f64;
    if w >= h {
        let scaled = (h * longest as f64 / w).round().max(1.0);
        (longest, scaled as u32)
    } else {
        let scaled = (w * longest as f64 / h).round().max(1.0);
        (scaled as u32, longest)
    }
}

/// Target size for shrinking an image to `max_dimension`, or `None` when the
/// image already fits.
pub fn downscale_target(width: u32, height: u32, max_dimension: u32) -> Option<(u32, u32)> {
    if width.max(height) <= max_dimension {
        return None;
    }
    Some(fit_longest_side(width, height, max_dimension))
}

/// Target size for enlarging an image to `target_dimension`, or `None` when the
/// image is already at least that large. Upscaling never shrinks.
pub fn upscale_target(width: u32, height: u32, target_dimension: u32) -> Option<(u32, u32)> {
    if width.max(height) >= target_dimension {
        return None;
    }
    Some(fit_longest_side(width, height, target_dimension))
}
