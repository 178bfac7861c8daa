use std::borrow::Cow;
use std::sync::Arc;

use image::{Rgba, RgbaImage};
use rust_image_resampler::config::ResampleBackend;
use rust_image_resampler::gpu::context::GpuContextManager;
use rust_image_resampler::gpu::kernels::KernelId;
use rust_image_resampler::gpu::pipeline::PipelineCache;
use rust_image_resampler::gpu::resources::ResourceCounts;
use rust_image_resampler::{
    ResampleAlgorithm, ResampleError, ResampleRequest, Resampler, UpscaleAlgorithm, UpscaleOptions,
    codec,
};
use tokio_util::sync::CancellationToken;

fn gradient(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            ((x + y) % 256) as u8,
            255,
        ])
    })
}

fn unavailable_gpu() -> Resampler {
    Resampler::new(
        Arc::new(GpuContextManager::disabled()),
        Arc::new(PipelineCache::new()),
        ResampleBackend::Auto,
    )
}

/// A resampler with a live GPU context, or `None` on hosts without an adapter.
async fn gpu_resampler() -> Option<Resampler> {
    let resampler = Resampler::with_defaults();
    if resampler.gpu().acquire().await.is_none() {
        eprintln!("no compute-capable adapter, skipping gpu assertions");
        return None;
    }
    Some(resampler)
}

#[tokio::test]
async fn large_photo_downscales_to_limit() {
    let resampler = unavailable_gpu();
    let image = RgbaImage::new(4000, 3000);
    let out = resampler
        .downscale_image(&image, 1200, &CancellationToken::new())
        .await
        .unwrap();
    assert!(matches!(out, Cow::Owned(_)));
    assert_eq!(out.dimensions(), (1200, 900));
}

#[tokio::test]
async fn downscale_reencodes_as_jpeg_within_limit() {
    let resampler = unavailable_gpu();
    let bytes = codec::encode_png(&gradient(400, 300)).unwrap();
    let out = resampler.downscale(&bytes, 120, 0.85).await.unwrap();
    assert!(matches!(out, Cow::Owned(_)));
    assert_eq!(&out[..2], &[0xFF, 0xD8]);
    assert_eq!(codec::decode(&out).unwrap().dimensions(), (120, 90));
}

#[tokio::test]
async fn small_image_is_returned_byte_for_byte() {
    let resampler = unavailable_gpu();
    let bytes = codec::encode_png(&gradient(64, 48)).unwrap();
    let out = resampler.downscale(&bytes, 1024, 0.85).await.unwrap();
    assert!(matches!(out, Cow::Borrowed(_)));
    assert_eq!(&*out, bytes.as_slice());
}

#[tokio::test]
async fn tiny_image_upscales_to_display_size() {
    let resampler = unavailable_gpu();
    let bytes = codec::encode_png(&gradient(100, 100)).unwrap();
    let out = resampler.upscale(&bytes, 2048).await.unwrap();
    assert_eq!(out.dimensions(), (2048, 2048));
}

#[tokio::test]
async fn unavailable_gpu_still_downscales() {
    let resampler = unavailable_gpu();
    let bytes = codec::encode_png(&gradient(300, 200)).unwrap();
    let out = resampler.downscale(&bytes, 150, 0.7).await.unwrap();
    assert_eq!(codec::decode(&out).unwrap().dimensions(), (150, 100));
    assert!(!resampler.gpu().is_available());
    assert_eq!(resampler.gpu().acquisition_attempts(), 0);
}

#[tokio::test]
async fn decode_failure_does_not_poison_later_calls() {
    let resampler = unavailable_gpu();
    let err = resampler
        .downscale(b"definitely not an image", 512, 0.8)
        .await
        .unwrap_err();
    assert!(matches!(err, ResampleError::Decode(_)));

    let bytes = codec::encode_png(&gradient(800, 600)).unwrap();
    let out = resampler.downscale(&bytes, 400, 0.8).await.unwrap();
    assert_eq!(codec::decode(&out).unwrap().dimensions(), (400, 300));
}

#[tokio::test]
async fn prepare_for_upload_follows_active_preset() {
    let resampler = Resampler::cpu_only();
    resampler
        .config()
        .apply_preset(rust_image_resampler::Preset::Ultra);
    let bytes = codec::encode_png(&gradient(1024, 768)).unwrap();
    let out = resampler.prepare_for_upload(&bytes).await.unwrap();
    assert_eq!(codec::decode(&out).unwrap().dimensions(), (512, 384));
}

#[tokio::test]
async fn data_url_input_round_trips() {
    let resampler = Resampler::cpu_only();
    let png = codec::encode_png(&gradient(200, 100)).unwrap();
    let url = codec::encode_data_url("image/png", &png);
    let bytes = codec::decode_data_url(&url).unwrap();
    let out = resampler.downscale(&bytes, 50, 0.9).await.unwrap();
    assert_eq!(codec::decode(&out).unwrap().dimensions(), (50, 25));
}

#[tokio::test]
async fn every_algorithm_produces_requested_size_on_cpu() {
    let resampler = Resampler::cpu_only();
    let image = gradient(40, 30);
    for algorithm in UpscaleAlgorithm::ALL {
        let options = UpscaleOptions {
            target_dimension: 160,
            algorithm,
            sharpening: 0.5,
            edge_enhancement: true,
        };
        let out = resampler
            .upscale_image(&image, &options, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out.dimensions(), (160, 120), "{algorithm}");
    }
}

#[tokio::test]
async fn cancellation_before_work_returns_cancelled() {
    let resampler = unavailable_gpu();
    let image = gradient(256, 256);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let request = ResampleRequest {
        source: &image,
        target_width: 512,
        target_height: 512,
        algorithm: ResampleAlgorithm::Lanczos,
        sharpening: 0.0,
        edge_threshold: 1.0,
    };
    let err = resampler.resample(request, &cancel).await.unwrap_err();
    assert!(matches!(err, ResampleError::Cancelled));
}

#[tokio::test]
async fn gpu_and_cpu_agree_on_dimensions() {
    let Some(gpu) = gpu_resampler().await else {
        return;
    };
    let cpu = Resampler::cpu_only();
    let image = gradient(333, 211);
    let cancel = CancellationToken::new();
    for (target, algorithm) in [
        (100, ResampleAlgorithm::BoxDownscale),
        (900, ResampleAlgorithm::Bicubic),
        (900, ResampleAlgorithm::Lanczos),
        (900, ResampleAlgorithm::SuperRes),
    ] {
        let (w, h) = rust_image_resampler::processing::layout::fit_longest_side(333, 211, target);
        let request = ResampleRequest {
            source: &image,
            target_width: w,
            target_height: h,
            algorithm,
            sharpening: 0.4,
            edge_threshold: 0.15,
        };
        let from_gpu = gpu.resample(request, &cancel).await.unwrap();
        let from_cpu = cpu.resample(request, &cancel).await.unwrap();
        assert_eq!(from_gpu.dimensions(), (w, h), "{algorithm:?}");
        assert_eq!(from_gpu.dimensions(), from_cpu.dimensions());
        assert_eq!(from_gpu.as_raw().len(), (w * h * 4) as usize);
    }
}

#[tokio::test]
async fn gpu_kernels_preserve_flat_colour() {
    let Some(resampler) = gpu_resampler().await else {
        return;
    };
    let colour = Rgba([180, 60, 20, 255]);
    let image = RgbaImage::from_pixel(37, 23, colour);
    let cancel = CancellationToken::new();
    for (w, h, algorithm) in [
        (12, 7, ResampleAlgorithm::BoxDownscale),
        (111, 69, ResampleAlgorithm::Bicubic),
        (111, 69, ResampleAlgorithm::Lanczos),
        (111, 69, ResampleAlgorithm::SuperRes),
    ] {
        let request = ResampleRequest {
            source: &image,
            target_width: w,
            target_height: h,
            algorithm,
            sharpening: 0.5,
            edge_threshold: 0.15,
        };
        let out = resampler.resample(request, &cancel).await.unwrap();
        for px in out.pixels() {
            for c in 0..4 {
                assert!(
                    px[c].abs_diff(colour[c]) <= 2,
                    "{algorithm:?} drifted to {:?}",
                    px
                );
            }
        }
    }
}

#[tokio::test]
async fn repeated_gpu_calls_do_not_leak_resources() {
    let Some(resampler) = gpu_resampler().await else {
        return;
    };
    let bytes = codec::encode_png(&gradient(256, 192)).unwrap();
    for _ in 0..16 {
        resampler.downscale(&bytes, 64, 0.8).await.unwrap();
        resampler.upscale(&bytes, 512).await.unwrap();
    }
    assert_eq!(
        resampler.gpu().live_resources(),
        Some(ResourceCounts::default())
    );
    assert_eq!(resampler.gpu().acquisition_attempts(), 1);
}

#[tokio::test]
async fn each_kernel_compiles_once() {
    let Some(resampler) = gpu_resampler().await else {
        return;
    };
    let bytes = codec::encode_png(&gradient(50, 40)).unwrap();
    resampler.upscale(&bytes, 200).await.unwrap();
    resampler.upscale(&bytes, 300).await.unwrap();
    assert_eq!(resampler.pipelines().compile_count(), 1);
    assert!(resampler.pipelines().is_compiled(KernelId::BicubicUpscale));

    let ready = resampler.warm_up().await.unwrap();
    assert_eq!(ready, KernelId::COUNT);
    assert_eq!(resampler.pipelines().compile_count(), KernelId::COUNT);
    resampler.warm_up().await.unwrap();
    assert_eq!(resampler.pipelines().compile_count(), KernelId::COUNT);
}

#[tokio::test]
async fn warm_up_without_gpu_reports_unavailable() {
    let resampler = unavailable_gpu();
    assert!(matches!(
        resampler.warm_up().await,
        Err(ResampleError::DeviceUnavailable)
    ));
}

#[tokio::test]
async fn superres_sharpens_hard_edges_only() {
    let Some(resampler) = gpu_resampler().await else {
        return;
    };
    let (dark, light) = (30u8, 220u8);
    let edge = RgbaImage::from_fn(32, 32, |x, _| {
        let v = if x < 16 { dark } else { light };
        Rgba([v, v, v, 255])
    });
    let cancel = CancellationToken::new();
    let upscale = |algorithm: ResampleAlgorithm, sharpening: f32, edge_threshold: f32| {
        let request = ResampleRequest {
            source: &edge,
            target_width: 128,
            target_height: 128,
            algorithm,
            sharpening,
            edge_threshold,
        };
        let resampler = &resampler;
        let cancel = &cancel;
        async move { resampler.resample(request, cancel).await.unwrap().into_owned() }
    };
    let row_range = |image: &RgbaImage| {
        (56..72)
            .map(|x| image.get_pixel(x, 64)[0])
            .fold((u8::MAX, u8::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)))
    };

    let lanczos = upscale(ResampleAlgorithm::Lanczos, 0.0, 1.0).await;
    let plain = upscale(ResampleAlgorithm::SuperRes, 0.0, 1.0).await;
    assert_eq!(plain.as_raw(), lanczos.as_raw());

    let sharpened = upscale(ResampleAlgorithm::SuperRes, 1.0, 1.0).await;
    let (base_lo, base_hi) = row_range(&lanczos);
    let (sharp_lo, sharp_hi) = row_range(&sharpened);
    assert!(sharp_lo < base_lo, "no undershoot: {sharp_lo} vs {base_lo}");
    assert!(sharp_hi > base_hi, "no overshoot: {sharp_hi} vs {base_hi}");
    assert!(sharpened.get_pixel(4, 64)[0].abs_diff(dark) <= 1);
    assert!(sharpened.get_pixel(123, 64)[0].abs_diff(light) <= 1);
    assert_eq!(sharpened.get_pixel(64, 64)[3], 255);

    let boosted = upscale(ResampleAlgorithm::SuperRes, 1.0, 0.15).await;
    assert_ne!(boosted.as_raw(), sharpened.as_raw());
}
