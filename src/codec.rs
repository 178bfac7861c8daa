//! Decoding and encoding between raster bytes, `data:` URLs and RGBA buffers.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageEncoder, RgbaImage};

use crate::error::{ResampleError, Result};

/// Decodes any supported raster format into RGBA8.
pub fn decode(bytes: &[u8]) -> Result<RgbaImage> {
    let image = image::load_from_memory(bytes).map_err(ResampleError::Decode)?;
    let rgba = image.to_rgba8();
    if rgba.width() == 0 || rgba.height() == 0 {
        return Err(ResampleError::InvalidDimensions {
            width: rgba.width(),
            height: rgba.height(),
        });
    }
    Ok(rgba)
}

/// Maps a `[0, 1]` quality factor onto the encoder's `1..=100` scale.
pub fn quality_percent(quality: f32) -> u8 {
    let q = if quality.is_finite() { quality } else { 1.0 };
    (q.clamp(0.0, 1.0) * 100.0).round().clamp(1.0, 100.0) as u8
}

/// Encodes as baseline JPEG. Alpha is dropped.
pub fn encode_jpeg(image: &RgbaImage, quality: f32) -> Result<Vec<u8>> {
    let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality_percent(quality))
        .write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(ResampleError::Encode)?;
    Ok(out)
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(ResampleError::Encode)?;
    Ok(out)
}

/// Extracts the payload of a base64 `data:` URL.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>> {
    let rest = url
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| ResampleError::DataUrl("missing data: scheme".into()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| ResampleError::DataUrl("missing ',' separator".into()))?;
    if !meta
        .split(';')
        .any(|part| part.eq_ignore_ascii_case("base64"))
    {
        return Err(ResampleError::DataUrl(
            "only base64 payloads are supported".into(),
        ));
    }
    BASE64
        .decode(payload.trim())
        .map_err(|err| ResampleError::DataUrl(err.to_string()))
}

pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", BASE64.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn quality_maps_to_percent() {
        assert_eq!(quality_percent(0.85), 85);
        assert_eq!(quality_percent(0.0), 1);
        assert_eq!(quality_percent(3.0), 100);
        assert_eq!(quality_percent(f32::NAN), 100);
    }

    #[test]
    fn jpeg_output_decodes_to_same_size() {
        let img = RgbaImage::from_pixel(31, 17, Rgba([10, 200, 30, 128]));
        let bytes = encode_jpeg(&img, 0.8).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        let back = decode(&bytes).unwrap();
        assert_eq!(back.dimensions(), (31, 17));
    }

    #[test]
    fn data_url_round_trip_through_png() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 4]));
        let url = encode_data_url("image/png", &encode_png(&img).unwrap());
        assert!(url.starts_with("data:image/png;base64,"));
        let back = decode(&decode_data_url(&url).unwrap()).unwrap();
        assert_eq!(back, img);
    }

    #[test]
    fn malformed_inputs_are_rejected() {
        assert!(matches!(
            decode(b"not an image"),
            Err(ResampleError::Decode(_))
        ));
        assert!(matches!(
            decode_data_url("image/png;base64,AAAA"),
            Err(ResampleError::DataUrl(_))
        ));
        assert!(matches!(
            decode_data_url("data:text/plain,hello"),
            Err(ResampleError::DataUrl(_))
        ));
    }
}
