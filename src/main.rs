use std::borrow::Cow;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use rust_image_resampler::config::{ConfigStore, Configuration};
use rust_image_resampler::{Preset, Resampler, UpscaleAlgorithm, UpscaleOptions, codec};
use tokio_util::sync::CancellationToken;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "image-resampler",
    version,
    about = "GPU image resampling with CPU fallback"
)]
struct Args {
    /// Path to YAML config
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Shrink an image for upload and write it as JPEG
    Downscale {
        input: PathBuf,
        output: PathBuf,
        /// Longest side in pixels (defaults to the active max-input-dimension)
        #[arg(long)]
        max_dimension: Option<u32>,
        /// JPEG quality in [0, 1] (defaults to the active compression-quality)
        #[arg(long)]
        quality: Option<f32>,
    },
    /// Enlarge an image for display and write it as PNG
    Upscale {
        input: PathBuf,
        output: PathBuf,
        /// Longest side in pixels (defaults to the active target-output-dimension)
        #[arg(long)]
        target: Option<u32>,
        /// bicubic, superres or lanczos (defaults to the active algorithm)
        #[arg(long)]
        algorithm: Option<UpscaleAlgorithm>,
    },
    /// Report GPU availability and compile every kernel
    Probe,
    /// Print the optimization presets
    Presets {
        /// Only print this preset
        name: Option<String>,
    },
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,rust_image_resampler={level},image_resampler={level},wgpu=warn"
        ))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn load_configuration(path: Option<&Path>) -> Result<Configuration> {
    let Some(path) = path else {
        return Ok(Configuration::default());
    };
    let cfg = Configuration::from_yaml_file(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?
        .validated()
        .context("invalid configuration values")?;
    tracing::debug!("Loaded configuration from {}:\n{:#?}", path.display(), cfg);
    Ok(cfg)
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        config,
        verbose,
        command,
    } = Args::parse();
    init_tracing(verbose);

    let cfg = load_configuration(config.as_deref())?;
    let resampler = Resampler::from_configuration(&cfg)?;

    match command {
        Command::Downscale {
            input,
            output,
            max_dimension,
            quality,
        } => {
            let active = resampler.config().get_config();
            let bytes = read_input(&input)?;
            let max_dimension = max_dimension.unwrap_or(active.max_input_dimension);
            let quality = quality.unwrap_or(active.compression_quality);
            let result = resampler
                .downscale(&bytes, max_dimension, quality)
                .await
                .with_context(|| format!("downscaling {}", input.display()))?;
            if matches!(result, Cow::Borrowed(_)) {
                info!("{} already fits within {max_dimension}px", input.display());
            }
            std::fs::write(&output, &result)
                .with_context(|| format!("writing {}", output.display()))?;
            info!(bytes = result.len(), "wrote {}", output.display());
        }
        Command::Upscale {
            input,
            output,
            target,
            algorithm,
        } => {
            let active = resampler.config().get_config();
            let mut options = UpscaleOptions::from_config(&active);
            if let Some(target) = target {
                options.target_dimension = target;
            }
            if let Some(algorithm) = algorithm {
                options.algorithm = algorithm;
            }
            let image = codec::decode(&read_input(&input)?)
                .with_context(|| format!("decoding {}", input.display()))?;
            let upscaled = resampler
                .upscale_image(&image, &options, &CancellationToken::new())
                .await?;
            std::fs::write(&output, codec::encode_png(&upscaled)?)
                .with_context(|| format!("writing {}", output.display()))?;
            info!(
                width = upscaled.width(),
                height = upscaled.height(),
                algorithm = %options.algorithm,
                "wrote {}",
                output.display()
            );
        }
        Command::Probe => {
            match resampler.gpu().acquire().await {
                Some(ctx) => {
                    let ready = resampler.warm_up().await?;
                    println!(
                        "gpu: {} ({:?}), {ready} kernels compiled",
                        ctx.adapter_info.name, ctx.adapter_info.backend
                    );
                }
                None => println!("gpu: unavailable, cpu fallback in use"),
            }
        }
        Command::Presets { name } => {
            let presets: Vec<Preset> = match name {
                Some(name) => vec![name.parse()?],
                None => Preset::ALL.to_vec(),
            };
            for preset in presets {
                let config = ConfigStore::get_preset(preset.name())?;
                println!("{preset}:");
                print!("{}", indent(&serde_yaml::to_string(config)?));
            }
        }
    }
    Ok(())
}

/// Reads a file, or a `data:` URL given in place of a path.
fn read_input(input: &Path) -> Result<Vec<u8>> {
    let raw = input.to_string_lossy();
    if raw.starts_with("data:") {
        return Ok(codec::decode_data_url(&raw)?);
    }
    std::fs::read(input).with_context(|| format!("reading {}", input.display()))
}

fn indent(yaml: &str) -> String {
    yaml.lines().map(|line| format!("  {line}\n")).collect()
}
