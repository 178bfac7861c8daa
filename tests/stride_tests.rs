use rust_image_resampler::gpu::resources::{compute_padded_stride, strip_row_padding};

#[test]
fn padded_stride_rounds_up_to_256() {
    assert_eq!(compute_padded_stride(0), 0);
    assert_eq!(compute_padded_stride(4), 256);
    assert_eq!(compute_padded_stride(255), 256);
    assert_eq!(compute_padded_stride(256), 256);
    assert_eq!(compute_padded_stride(257), 512);
    assert_eq!(compute_padded_stride(1024), 1024);
    assert_eq!(compute_padded_stride(1028), 1280);
}

#[test]
fn packed_output_matches_width_times_height() {
    // 1200 px -> 4800 bytes, padded to 4864
    let (w, h) = (1200u32, 3u32);
    let stride = compute_padded_stride(w * 4) as usize;
    assert_eq!(stride, 4864);
    let mut padded = vec![0u8; stride * h as usize];
    for row in 0..h as usize {
        padded[row * stride..row * stride + w as usize * 4].fill(row as u8 + 1);
    }
    let packed = strip_row_padding(&padded, w, h).unwrap();
    assert_eq!(packed.len(), (w * h * 4) as usize);
    for row in 0..h as usize {
        let start = row * w as usize * 4;
        assert!(packed[start..start + w as usize * 4].iter().all(|&b| b == row as u8 + 1));
    }
}
