//! Video frame sampling and per-video contact sheets.
//!
//! Frames are pulled from a [`FrameSource`] at evenly spaced timestamps,
//! a few at a time, put back into timestamp order and composed into a
//! single sheet.

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::process::Command;

use super::compose::{compose, SheetLayout, MAX_SHEET_EDGE};
use super::encode::encode;
use super::scheduler::{CancelToken, Scheduler};
use super::thumbnail::{existing_output, file_size, finish, Produced};
use super::tools;
use super::writer::{self, MoveHandle};
use crate::config::{JobSettings, SheetConfig, ToolsConfig, MAX_TILES, MIN_TILES};
use crate::error::{PipelineError, PipelineResult};
use crate::types::{ItemOutcome, OutputFormat, WorkItem};

/// Smallest spacing between two sampled timestamps, in seconds.
pub const MIN_STEP_SECS: f64 = 1.0;

/// Keyframe seek happens this far before the target, then decodes forward.
const SEEK_MARGIN_SECS: f64 = 2.0;

/// Evenly spaced sample timestamps for a video.
///
/// Returns `None` when `duration` is non-finite or not positive. A
/// `skip_first` at or beyond the end of the video is ignored rather than
/// leaving nothing to sample. Every timestamp is strictly below `duration`.
pub fn sample_timestamps(duration: f64, skip_first: f64, target_tiles: u32) -> Option<Vec<f64>> {
    if !duration.is_finite() || duration <= 0.0 {
        return None;
    }
    let skip = if skip_first.is_finite() && skip_first > 0.0 && skip_first < duration {
        skip_first
    } else {
        0.0
    };
    let tiles = target_tiles.clamp(MIN_TILES, MAX_TILES);
    let usable = duration - skip;
    let step = (usable / tiles as f64).max(MIN_STEP_SECS);
    let count = (tiles as u64).min((usable / step).floor() as u64 + 1);

    Some(
        (0..count)
            .map(|i| skip + i as f64 * step)
            .filter(|&t| t < duration)
            .collect(),
    )
}

/// What a probe learns about a video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    /// Seconds; may be NaN when the container does not report one
    pub duration: f64,
    pub width: u32,
    pub height: u32,
}

/// A decoded still, owned by whoever holds it.
#[derive(Debug, Clone)]
pub struct Frame {
    pub timestamp: f64,
    pub image: DynamicImage,
}

/// Where video metadata and frames come from.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn probe(&self, path: &Path) -> PipelineResult<VideoInfo>;

    /// Decode one frame at `timestamp`, no larger than `max_size` on either side.
    async fn frame_at(
        &self,
        path: &Path,
        timestamp: f64,
        max_size: u32,
    ) -> PipelineResult<DynamicImage>;
}

/// `ffprobe` / `ffmpeg` subprocess backend.
#[derive(Debug, Clone)]
pub struct FfmpegFrameSource {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

#[derive(Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    streams: Option<Vec<FfprobeStream>>,
}

#[derive(Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

impl FfmpegFrameSource {
    pub fn new(ffmpeg: PathBuf, ffprobe: PathBuf) -> Self {
        Self { ffmpeg, ffprobe }
    }

    /// Resolve both tools through the discovery contract.
    pub fn discover(config: &ToolsConfig) -> PipelineResult<Self> {
        Ok(Self::new(
            tools::locate("ffmpeg", config.ffmpeg.as_deref())?,
            tools::locate("ffprobe", config.ffprobe.as_deref())?,
        ))
    }
}

/// Parse `ffprobe -print_format json` output.
fn parse_probe(path: &Path, json: &[u8]) -> PipelineResult<VideoInfo> {
    let probe_err = |message: String| PipelineError::VideoProbe {
        path: path.to_path_buf(),
        message,
    };
    let probe: FfprobeOutput =
        serde_json::from_slice(json).map_err(|e| probe_err(format!("Bad ffprobe output: {e}")))?;

    let stream = probe
        .streams
        .as_ref()
        .and_then(|s| s.iter().find(|s| s.codec_type.as_deref() == Some("video")))
        .ok_or_else(|| probe_err("No video stream".to_string()))?;

    // Prefer the container duration, then the stream's.
    let duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or(stream.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(f64::NAN);

    Ok(VideoInfo {
        duration,
        width: stream.width.unwrap_or(0),
        height: stream.height.unwrap_or(0),
    })
}

/// Video filter bounding the frame to `max_size` without upscaling.
fn scale_filter(max_size: u32) -> String {
    format!(
        "scale=min(iw\\,{max_size}):min(ih\\,{max_size}):force_original_aspect_ratio=decrease"
    )
}

#[async_trait]
impl FrameSource for FfmpegFrameSource {
    async fn probe(&self, path: &Path) -> PipelineResult<VideoInfo> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| PipelineError::VideoProbe {
                path: path.to_path_buf(),
                message: format!("Cannot run ffprobe: {e}"),
            })?;

        if !output.status.success() {
            return Err(PipelineError::VideoProbe {
                path: path.to_path_buf(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        parse_probe(path, &output.stdout)
    }

    async fn frame_at(
        &self,
        path: &Path,
        timestamp: f64,
        max_size: u32,
    ) -> PipelineResult<DynamicImage> {
        let frame_err = |message: String| PipelineError::FrameExtraction {
            path: path.to_path_buf(),
            timestamp,
            message,
        };

        // Two-stage seek: fast keyframe seek before -i, exact seek after.
        let coarse = (timestamp - SEEK_MARGIN_SECS).max(0.0);
        let fine = timestamp - coarse;

        let mut command = Command::new(&self.ffmpeg);
        command.args(["-hide_banner", "-loglevel", "error"]);
        if coarse > 0.0 {
            command.arg("-ss").arg(format!("{coarse:.3}"));
        }
        command.arg("-i").arg(path);
        if fine > 0.0 {
            command.arg("-ss").arg(format!("{fine:.3}"));
        }
        command
            .args(["-frames:v", "1", "-an", "-sn", "-dn", "-threads", "1", "-vf"])
            .arg(scale_filter(max_size))
            .args(["-f", "image2pipe", "-vcodec", "png", "-"])
            .kill_on_drop(true);

        let output = command
            .output()
            .await
            .map_err(|e| frame_err(format!("Cannot run ffmpeg: {e}")))?;
        if !output.status.success() {
            return Err(frame_err(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        if output.stdout.is_empty() {
            return Err(frame_err("ffmpeg produced no frame".to_string()));
        }
        image::load_from_memory_with_format(&output.stdout, ImageFormat::Png)
            .map_err(|e| frame_err(e.to_string()))
    }
}

/// Left half of a side-by-side stereo frame.
pub fn left_half(image: &DynamicImage) -> DynamicImage {
    image.crop_imm(0, 0, (image.width() / 2).max(1), image.height())
}

/// Samples frames from videos and turns them into contact sheets.
#[derive(Clone)]
pub struct FrameSampler {
    source: Arc<dyn FrameSource>,
    sheet: SheetConfig,
    layout: SheetLayout,
    format: OutputFormat,
    quality: f32,
    cancel: CancelToken,
}

impl FrameSampler {
    pub fn new(source: Arc<dyn FrameSource>, settings: &JobSettings, cancel: CancelToken) -> Self {
        Self {
            source,
            sheet: settings.sheet.clone(),
            layout: SheetLayout::from_config(&settings.sheet),
            format: settings.thumbnail.format,
            quality: settings.thumbnail.quality,
            cancel,
        }
    }

    /// Extract frames for `path` in timestamp order.
    ///
    /// Individual frame failures are dropped; the call fails only when no
    /// frame at all could be extracted. Cancellation stops new frame
    /// requests and fails the call with [`PipelineError::Cancelled`].
    pub async fn sample(&self, path: &Path) -> PipelineResult<Vec<Frame>> {
        let info = self.source.probe(path).await?;
        let timestamps =
            sample_timestamps(info.duration, self.sheet.skip_first_secs, self.sheet.tiles)
                .ok_or_else(|| PipelineError::InvalidDuration {
                    path: path.to_path_buf(),
                    duration: info.duration,
                })?;
        tracing::debug!(
            "Sampling {} frame(s) from {:?} ({:.1}s)",
            timestamps.len(),
            path,
            info.duration
        );

        let scheduler = Scheduler::new(self.sheet.frame_concurrency, self.cancel.clone());
        let mut slots: Vec<Option<Frame>> = (0..timestamps.len()).map(|_| None).collect();
        let source = self.source.clone();
        let video = path.to_path_buf();
        let max_size = self.sheet.max_frame_size;

        let report = scheduler
            .run(
                timestamps,
                move |timestamp| {
                    let source = source.clone();
                    let video = video.clone();
                    async move {
                        let image = source.frame_at(&video, timestamp, max_size).await?;
                        Ok::<_, PipelineError>(Frame { timestamp, image })
                    }
                },
                |index, output| match output {
                    Ok(Ok(frame)) => slots[index] = Some(frame),
                    Ok(Err(e)) => tracing::debug!("Dropping frame: {e}"),
                    Err(panic) => tracing::debug!("Dropping frame: worker panicked: {}", panic.0),
                },
            )
            .await;

        if report.cancelled {
            return Err(PipelineError::Cancelled);
        }

        // Slots are indexed by schedule position, which is timestamp order.
        let frames: Vec<Frame> = slots
            .into_iter()
            .flatten()
            .map(|frame| self.prepare(frame))
            .collect();
        if frames.is_empty() {
            return Err(PipelineError::NoFrames(path.to_path_buf()));
        }
        Ok(frames)
    }

    fn prepare(&self, mut frame: Frame) -> Frame {
        let max = self.sheet.max_frame_size.max(1);
        if frame.image.width() > max || frame.image.height() > max {
            frame.image = frame.image.thumbnail(max, max);
        }
        if self.sheet.stereo_left_half {
            frame.image = left_half(&frame.image);
        }
        frame
    }

    /// Sample `path` and encode its contact sheet.
    pub async fn render(&self, path: &Path, label: &Path) -> PipelineResult<Vec<u8>> {
        let frames = self.sample(path).await?;
        let layout = self.layout;
        let format = self.format;
        let quality = self.quality;
        let label = label.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let tiles: Vec<DynamicImage> = frames.into_iter().map(|f| f.image).collect();
            let sheet = compose(&tiles, &layout).ok_or_else(|| PipelineError::Encode {
                path: label.clone(),
                message: format!("Contact sheet would exceed {MAX_SHEET_EDGE} px"),
            })?;
            encode(&DynamicImage::ImageRgb8(sheet), format, quality, &label)
        })
        .await
        .map_err(|e| PipelineError::Encode {
            path: path.to_path_buf(),
            message: format!("Compose task failed: {e}"),
        })?
    }

    /// Produce the item's contact sheet and commit it through `mover`.
    ///
    /// An existing destination is reused without re-sampling.
    pub async fn process(
        &self,
        item: &WorkItem,
        scratch_dir: &Path,
        mover: &MoveHandle,
    ) -> ItemOutcome {
        let started = Instant::now();
        let result = self.produce(item, scratch_dir, mover).await;
        finish(item, result, started)
    }

    async fn produce(
        &self,
        item: &WorkItem,
        scratch_dir: &Path,
        mover: &MoveHandle,
    ) -> PipelineResult<Produced> {
        let source_bytes = file_size(&item.source).await?;
        if let Some(existing) = existing_output(&item.destination).await {
            return Ok(Produced {
                source_bytes,
                output_bytes: existing,
                reused: true,
            });
        }

        let bytes = self.render(&item.source, &item.destination).await?;
        let scratch = scratch_dir.to_path_buf();
        let destination = item.destination.clone();
        let staged =
            tokio::task::spawn_blocking(move || writer::stage(&scratch, &bytes, &destination))
                .await
                .map_err(|e| PipelineError::Write {
                    path: item.destination.clone(),
                    message: format!("Scratch write task failed: {e}"),
                })??;
        let output_bytes = mover.commit(staged).await?;
        Ok(Produced {
            source_bytes,
            output_bytes,
            reused: false,
        })
    }
}
