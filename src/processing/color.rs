use config_model::ColorAdjustment;
use image::RgbaImage;

/// CPU rendition of the CSS `brightness() contrast() saturate()` filter chain,
/// applied in that order. Sharpening is not available on this path.
pub fn apply_css_filters(image: &mut RgbaImage, adjustment: &ColorAdjustment) {
    if adjustment.brightness == 1.0 && adjustment.contrast == 1.0 && adjustment.saturation == 1.0 {
        return;
    }
    let matrix = saturate_matrix(adjustment.saturation);
    for pixel in image.pixels_mut() {
        let mut rgb = [0f32; 3];
        for c in 0..3 {
            let v = (pixel[c] as f32) / 255.0 * adjustment.brightness;
            rgb[c] = (v - 0.5) * adjustment.contrast + 0.5;
        }
        for (c, row) in matrix.iter().enumerate() {
            let v = row[0] * rgb[0] + row[1] * rgb[1] + row[2] * rgb[2];
            pixel[c] = (v * 255.0).round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Row-major CSS `saturate()` matrix (W3C Filter Effects).
fn saturate_matrix(s: f32) -> [[f32; 3]; 3] {
    [
        [0.213 + 0.787 * s, 0.715 - 0.715 * s, 0.072 - 0.072 * s],
        [0.213 - 0.213 * s, 0.715 + 0.285 * s, 0.072 - 0.072 * s],
        [0.213 - 0.213 * s, 0.715 - 0.715 * s, 0.072 + 0.928 * s],
    ]
}
