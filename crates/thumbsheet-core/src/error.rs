//! Error types for the Thumbsheet pipeline.
//!
//! Errors are organized by stage so a failed item can be reported with the
//! offending path and a message a user can act on.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for Thumbsheet operations.
#[derive(Error, Debug)]
pub enum ThumbsheetError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Pipeline processing errors, organized by stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Source could not be read or decoded
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// Encoding the output image failed
    #[error("Encode error for {path}: {message}")]
    Encode { path: PathBuf, message: String },

    /// Source or requested output format is not supported
    #[error("Unsupported format for {path}: {format}")]
    UnsupportedFormat { path: PathBuf, format: String },

    /// Source is wider or taller than the configured limit
    #[error("Image too large: {path} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        path: PathBuf,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// A stage did not finish in time
    #[error("Timeout in {stage} stage for {path} after {timeout_ms}ms")]
    Timeout {
        path: PathBuf,
        stage: String,
        timeout_ms: u64,
    },

    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Writing or moving the output failed
    #[error("Write failed for {path}: {message}")]
    Write { path: PathBuf, message: String },

    /// Output directory for a leaf folder could not be prepared
    #[error("Cannot prepare output directory {path}: {message}")]
    DestinationSetup { path: PathBuf, message: String },

    /// Probing a video for duration/dimensions failed
    #[error("Cannot probe video {path}: {message}")]
    VideoProbe { path: PathBuf, message: String },

    /// Video duration is non-finite, zero, or shorter than the skipped prefix
    #[error("Unusable duration for {path}: {duration}s")]
    InvalidDuration { path: PathBuf, duration: f64 },

    /// Every frame request for a video failed
    #[error("No frames could be extracted from {0}")]
    NoFrames(PathBuf),

    /// A single frame request failed
    #[error("Frame extraction failed for {path} at {timestamp:.3}s: {message}")]
    FrameExtraction {
        path: PathBuf,
        timestamp: f64,
        message: String,
    },

    /// An external tool could not be located
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// The trim collaborator refused or failed the request
    #[error("Trim failed for {path}: {message}")]
    Trim { path: PathBuf, message: String },

    /// The job was cancelled before this item started
    #[error("Cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Whether this error belongs in the "skipped-unsupported" bucket rather
    /// than counting as a failure.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, PipelineError::UnsupportedFormat { .. })
    }
}

/// Convenience type alias for Thumbsheet results.
pub type Result<T> = std::result::Result<T, ThumbsheetError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_format_is_not_a_failure() {
        let err = PipelineError::UnsupportedFormat {
            path: PathBuf::from("a.xyz"),
            format: "xyz".into(),
        };
        assert!(err.is_unsupported());
        assert!(!PipelineError::NoFrames(PathBuf::from("a.mp4")).is_unsupported());
    }

    #[test]
    fn errors_carry_path_in_message() {
        let err = PipelineError::Decode {
            path: PathBuf::from("/photos/broken.jpg"),
            message: "truncated".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/photos/broken.jpg"));
        assert!(msg.contains("truncated"));
    }
}
