use std::io::Write;

use rust_image_resampler::config::{Configuration, PowerPreference, ResampleBackend};
use rust_image_resampler::{Preset, UpscaleAlgorithm};

#[test]
fn empty_config_uses_balanced_auto() {
    let cfg: Configuration = serde_yaml::from_str("{}").unwrap();
    assert_eq!(cfg.backend, ResampleBackend::Auto);
    assert_eq!(cfg.preset, Preset::Balanced);
    assert_eq!(&cfg.optimization().unwrap(), Preset::Balanced.config());
    assert!(cfg.playback.is_neutral());
    let ctx = cfg.context_config();
    assert_eq!(ctx.power_preference, wgpu::PowerPreference::HighPerformance);
    assert!(!ctx.force_fallback_adapter);
}

#[test]
fn parse_kebab_case_config() {
    let yaml = r#"
backend: cpu
preset: high
overrides:
  compression-quality: 0.5
  upscale-algorithm: lanczos
gpu:
  power-preference: low-power
  force-fallback-adapter: true
playback:
  contrast: 1.1
  sharpen: 0.25
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.backend, ResampleBackend::Cpu);
    assert_eq!(cfg.gpu.power_preference, PowerPreference::LowPower);
    let opt = cfg.optimization().unwrap();
    assert_eq!(opt.max_input_dimension, 768);
    assert!((opt.compression_quality - 0.5).abs() < f32::EPSILON);
    assert_eq!(opt.upscale_algorithm, UpscaleAlgorithm::Lanczos);
    assert!((cfg.playback.contrast - 1.1).abs() < f32::EPSILON);
}

#[test]
fn unknown_fields_are_rejected() {
    assert!(serde_yaml::from_str::<Configuration>("presett: ultra").is_err());
    assert!(serde_yaml::from_str::<Configuration>("overrides:\n  quality: 0.4").is_err());
}

#[test]
fn out_of_range_overrides_fail_validation() {
    let cfg: Configuration =
        serde_yaml::from_str("overrides:\n  sharpening-intensity: 3.0").unwrap();
    assert!(cfg.validated().is_err());
}

#[test]
fn loads_from_yaml_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "preset: quality\nbackend: cpu").unwrap();
    let cfg = Configuration::from_yaml_file(file.path())
        .unwrap()
        .validated()
        .unwrap();
    assert_eq!(cfg.preset, Preset::Quality);
    assert_eq!(cfg.optimization().unwrap().compression_quality, 0.92);
}
