use rust_image_resampler::processing::layout::{downscale_target, fit_longest_side, upscale_target};

fn assert_aspect_preserved(w0: u32, h0: u32, w1: u32, h1: u32) {
    // Shorter side may round by one pixel
    if w0 >= h0 {
        let expected = (h0 as f64 * w1 as f64 / w0 as f64).round() as i64;
        assert!((expected - h1 as i64).abs() <= 1, "{w0}x{h0} -> {w1}x{h1}");
    } else {
        let expected = (w0 as f64 * h1 as f64 / h0 as f64).round() as i64;
        assert!((expected - w1 as i64).abs() <= 1, "{w0}x{h0} -> {w1}x{h1}");
    }
}

#[test]
fn downscale_hits_limit_on_longest_side() {
    for &(w, h) in &[(4000, 3000), (3000, 4000), (5000, 5000), (4032, 1000), (1201, 1)] {
        let (tw, th) = downscale_target(w, h, 1200).unwrap();
        assert_eq!(tw.max(th), 1200);
        assert_aspect_preserved(w, h, tw, th);
    }
}

#[test]
fn images_within_limit_are_left_alone() {
    assert_eq!(downscale_target(1200, 900, 1200), None);
    assert_eq!(downscale_target(1, 1, 1), None);
}

#[test]
fn upscale_reaches_target_without_ever_shrinking() {
    for &(w, h) in &[(100, 100), (640, 480), (480, 640), (2047, 3)] {
        let (tw, th) = upscale_target(w, h, 2048).unwrap();
        assert_eq!(tw.max(th), 2048);
        assert!(tw >= w && th >= h);
        assert_aspect_preserved(w, h, tw, th);
    }
    assert_eq!(upscale_target(3000, 100, 2048), None);
}

#[test]
fn scenario_dimensions() {
    assert_eq!(fit_longest_side(4000, 3000, 1200), (1200, 900));
    assert_eq!(fit_longest_side(100, 100, 2048), (2048, 2048));
}
