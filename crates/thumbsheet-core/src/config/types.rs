//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::{FitPolicy, OutputFormat};

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Name of the derived-output folder created inside each leaf folder.
    /// Folders with this name (case-insensitive) are never scanned.
    pub output_folder: String,

    /// Local scratch directory for staged outputs. Defaults to the system
    /// temp directory when unset.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_folder: "thumb".to_string(),
            scratch_dir: None,
        }
    }
}

/// Processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Fixed worker count. When unset, derived from cores and available memory.
    pub concurrency: Option<usize>,

    /// Extensions treated as photos
    pub photo_extensions: Vec<String>,

    /// Extensions treated as videos
    pub video_extensions: Vec<String>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            concurrency: None,
            photo_extensions: [
                "jpg", "jpeg", "png", "heic", "heif", "tif", "tiff", "webp", "bmp", "gif",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            video_extensions: [
                "mp4", "mov", "m4v", "mkv", "avi", "wmv", "webm", "mts", "m2ts", "3gp",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Thumbnail generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// Target height in pixels (width follows the aspect ratio)
    pub height: u32,

    /// Output format
    pub format: OutputFormat,

    /// Encoder quality from 0.0 to 1.0
    pub quality: f32,

    /// Sources wider or taller than this are refused before decoding
    pub max_image_dimension: u32,

    /// Decode + encode timeout per photo, in milliseconds
    pub decode_timeout_ms: u64,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            height: 512,
            format: OutputFormat::Jpeg,
            quality: 0.8,
            max_image_dimension: 20_000,
            decode_timeout_ms: 30_000,
        }
    }
}

/// Contact sheet settings for videos.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    /// Grid columns
    pub columns: u32,

    /// Cell height in pixels (width follows the median tile aspect ratio)
    pub cell_height: u32,

    /// Gap between cells and around the border, in pixels
    pub spacing: u32,

    /// How tiles are fitted into cells
    pub fit: FitPolicy,

    /// Background RGB color
    pub background: [u8; 3],

    /// Maximum number of frames per sheet (3-40)
    pub tiles: u32,

    /// Seconds skipped at the start of each video
    pub skip_first_secs: f64,

    /// Longest edge of an extracted frame, in pixels
    pub max_frame_size: u32,

    /// Crop every frame to its left half (side-by-side stereo sources)
    pub stereo_left_half: bool,

    /// Concurrent frame requests per video
    pub frame_concurrency: usize,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            columns: 4,
            cell_height: 240,
            spacing: 4,
            fit: FitPolicy::Pad,
            background: [0, 0, 0],
            tiles: 10,
            skip_first_secs: 0.0,
            max_frame_size: 640,
            stereo_left_half: false,
            frame_concurrency: 4,
        }
    }
}

/// Output writer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Number of staged outputs moved to their destination together
    pub move_batch_size: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self { move_batch_size: 5 }
    }
}

/// External tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Explicit ffmpeg path (skips discovery)
    pub ffmpeg: Option<PathBuf>,

    /// Explicit ffprobe path (skips discovery)
    pub ffprobe: Option<PathBuf>,

    /// Explicit trim tool path (defaults to the discovered ffmpeg)
    pub trim: Option<PathBuf>,

    /// Minimum seconds a video must keep after trimming
    pub min_trim_remaining_secs: f64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: None,
            ffprobe: None,
            trim: None,
            min_trim_remaining_secs: 3.0,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
