//! Video trimming through an external ffmpeg-compatible tool.
//!
//! Requests are validated against the video's duration before the tool is
//! started; a trim that would leave less than the configured minimum is
//! refused outright. The trimmed file goes through the atomic writer, so
//! the destination never holds a half-written result.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use super::tools;
use super::writer::{self, ScratchArea};
use crate::config::ToolsConfig;
use crate::error::{PipelineError, PipelineResult};

/// Seconds to cut from the start and/or the end of a video.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrimRequest {
    pub start: Option<f64>,
    pub end: Option<f64>,
}

/// The resolved `[from, to)` window to keep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimWindow {
    pub from: f64,
    pub to: f64,
}

impl TrimWindow {
    pub fn length(&self) -> f64 {
        self.to - self.from
    }
}

impl TrimRequest {
    /// Resolve against `duration`, refusing windows shorter than `min_remaining`.
    pub fn window(
        &self,
        path: &Path,
        duration: f64,
        min_remaining: f64,
    ) -> PipelineResult<TrimWindow> {
        let refuse = |message: String| PipelineError::Trim {
            path: path.to_path_buf(),
            message,
        };

        if self.start.is_none() && self.end.is_none() {
            return Err(refuse("Nothing to trim: give a start and/or end offset".into()));
        }
        if !duration.is_finite() || duration <= 0.0 {
            return Err(PipelineError::InvalidDuration {
                path: path.to_path_buf(),
                duration,
            });
        }
        let start = self.start.unwrap_or(0.0);
        let end = self.end.unwrap_or(0.0);
        if !(start.is_finite() && end.is_finite()) || start < 0.0 || end < 0.0 {
            return Err(refuse(format!("Invalid offsets start={start} end={end}")));
        }

        let window = TrimWindow {
            from: start,
            to: duration - end,
        };
        if window.length() < min_remaining {
            return Err(refuse(format!(
                "Would leave {:.1}s of {:.1}s, below the {:.1}s minimum",
                window.length().max(0.0),
                duration,
                min_remaining
            )));
        }
        Ok(window)
    }
}

/// Result of a successful trim.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrimOutcome {
    pub source: PathBuf,
    pub output: PathBuf,
    pub original_bytes: u64,
    pub new_bytes: u64,
}

/// `<dir>/<stem>_trimmed.<ext>` next to the source.
pub fn trimmed_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    let name = match source.extension() {
        Some(ext) => format!("{stem}_trimmed.{}", ext.to_string_lossy()),
        None => format!("{stem}_trimmed"),
    };
    source.with_file_name(name)
}

/// Runs the external trim tool.
#[derive(Debug, Clone)]
pub struct Trimmer {
    program: PathBuf,
    min_remaining: f64,
}

impl Trimmer {
    pub fn new(program: PathBuf, min_remaining: f64) -> Self {
        Self {
            program,
            min_remaining,
        }
    }

    /// Resolve the tool: the configured trim tool, else ffmpeg.
    pub fn discover(config: &ToolsConfig) -> PipelineResult<Self> {
        let program = match config.trim.as_deref() {
            Some(path) => tools::locate("trim", Some(path))?,
            None => tools::locate("ffmpeg", config.ffmpeg.as_deref())?,
        };
        Ok(Self::new(program, config.min_trim_remaining_secs))
    }

    /// Trim `source` (of known `duration`) into [`trimmed_path`].
    pub async fn trim(
        &self,
        source: &Path,
        duration: f64,
        request: TrimRequest,
        scratch: &ScratchArea,
    ) -> PipelineResult<TrimOutcome> {
        let window = request.window(source, duration, self.min_remaining)?;
        let original_bytes = std::fs::metadata(source)
            .map(|m| m.len())
            .map_err(|_| PipelineError::FileNotFound(source.to_path_buf()))?;
        let destination = trimmed_path(source);
        let staged_path = scratch.path().join(
            destination
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| "trimmed".into()),
        );

        tracing::info!(
            "Trimming {:?} to {:.1}s..{:.1}s",
            source,
            window.from,
            window.to
        );
        let output = Command::new(&self.program)
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .arg("-ss")
            .arg(format!("{:.3}", window.from))
            .arg("-i")
            .arg(source)
            .arg("-t")
            .arg(format!("{:.3}", window.length()))
            .args(["-map", "0", "-c", "copy"])
            .arg(&staged_path)
            .output()
            .await
            .map_err(|e| PipelineError::Trim {
                path: source.to_path_buf(),
                message: format!("Cannot run {}: {e}", self.program.display()),
            })?;

        if !output.status.success() {
            return Err(PipelineError::Trim {
                path: source.to_path_buf(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let new_bytes = std::fs::metadata(&staged_path)
            .map(|m| m.len())
            .ok()
            .filter(|&len| len > 0)
            .ok_or_else(|| PipelineError::Trim {
                path: source.to_path_buf(),
                message: "Tool reported success but produced no output".to_string(),
            })?;

        let staged = writer::StagedFile {
            scratch: staged_path,
            destination: destination.clone(),
            bytes: new_bytes,
        };
        tokio::task::spawn_blocking(move || writer::commit(&staged))
            .await
            .map_err(|e| PipelineError::Write {
                path: destination.clone(),
                message: format!("Move task failed: {e}"),
            })??;

        Ok(TrimOutcome {
            source: source.to_path_buf(),
            output: destination,
            original_bytes,
            new_bytes,
        })
    }
}
