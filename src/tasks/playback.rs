use anyhow::{Result, ensure};
use config_model::ColorAdjustment;
use image::RgbaImage;
use tokio::select;
use tokio::sync::mpsc::Receiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::ResampleError;
use crate::tasks::frame_renderer::{FramePresenter, FrameRenderer, PlaybackState};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackCommand {
    Play,
    Pause,
    SetAdjustment(ColorAdjustment),
    Stop,
}

/// Drives a loaded renderer from a frame stream. Frames are pulled only while
/// playing; the frame channel closing ends playback. The renderer is destroyed
/// and handed back on exit.
pub async fn run<P: FramePresenter>(
    mut renderer: FrameRenderer<P>,
    mut frames: Receiver<RgbaImage>,
    mut commands: Receiver<PlaybackCommand>,
    cancel: CancellationToken,
) -> Result<FrameRenderer<P>> {
    ensure!(
        renderer.state() != PlaybackState::Idle,
        "frame renderer must be loaded before playback starts"
    );
    let mut commands_open = true;

    loop {
        let playing = renderer.state() == PlaybackState::Playing;
        if !commands_open && !playing {
            debug!("command channel closed while not playing");
            break;
        }
        select! {
            _ = cancel.cancelled() => break,
            cmd = commands.recv(), if commands_open => {
                match cmd {
                    Some(PlaybackCommand::Play) => {
                        if let Some(ch) = renderer.play() {
                            debug!(from = ?ch.from, to = ?ch.to, "playback state change");
                        }
                    }
                    Some(PlaybackCommand::Pause) => {
                        if let Some(ch) = renderer.pause() {
                            debug!(from = ?ch.from, to = ?ch.to, "playback state change");
                        }
                    }
                    Some(PlaybackCommand::SetAdjustment(adjustment)) => {
                        if let Err(err) = renderer.set_adjustment(adjustment) {
                            warn!("ignoring colour adjustment: {err:#}");
                        }
                    }
                    Some(PlaybackCommand::Stop) => break,
                    None => commands_open = false,
                }
            }
            frame = frames.recv(), if playing => {
                let Some(frame) = frame else {
                    renderer.finish();
                    break;
                };
                match renderer.render_frame(&frame, &cancel).await {
                    Ok(path) => trace!(?path, "frame presented"),
                    Err(err)
                        if matches!(
                            err.downcast_ref::<ResampleError>(),
                            Some(ResampleError::Cancelled)
                        ) =>
                    {
                        break;
                    }
                    Err(err) => {
                        warn!("frame render failed: {err:#}");
                        break;
                    }
                }
            }
        }
    }

    info!(frames = renderer.frames_rendered(), "playback finished");
    renderer.destroy();
    Ok(renderer)
}
