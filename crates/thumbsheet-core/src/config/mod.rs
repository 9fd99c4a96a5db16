//! Configuration management for Thumbsheet.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults. A job never reads [`Config`] directly: it takes a [`JobSettings`]
//! snapshot at start so a run stays internally consistent.

mod types;
mod validate;

pub use types::*;
pub use validate::{MAX_TILES, MIN_TILES};

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Root configuration structure for Thumbsheet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Processing settings
    pub processing: ProcessingConfig,

    /// Photo thumbnail settings
    pub thumbnail: ThumbnailConfig,

    /// Video contact sheet settings
    pub sheet: SheetConfig,

    /// Output writer settings
    pub writer: WriterConfig,

    /// External tools
    pub tools: ToolsConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.thumbsheet.thumbsheet/config.toml
    /// - Linux: ~/.config/thumbsheet/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\thumbsheet\config\config.toml
    ///
    /// Falls back to ~/.thumbsheet/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "thumbsheet", "thumbsheet")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".thumbsheet").join("config.toml")
            })
    }

    /// Resolved scratch directory (with ~ expansion).
    pub fn scratch_dir(&self) -> PathBuf {
        match &self.general.scratch_dir {
            Some(dir) => expand(dir),
            None => std::env::temp_dir().join("thumbsheet"),
        }
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Freeze the tunables for one job.
    pub fn snapshot(&self) -> Result<JobSettings, ConfigError> {
        self.validate()?;
        Ok(JobSettings {
            output_folder: self.general.output_folder.clone(),
            scratch_dir: self.scratch_dir(),
            photo_extensions: lowercase_set(&self.processing.photo_extensions),
            video_extensions: lowercase_set(&self.processing.video_extensions),
            concurrency: self.processing.concurrency,
            thumbnail: self.thumbnail.clone(),
            sheet: self.sheet.clone(),
            move_batch_size: self.writer.move_batch_size,
            tools: ToolsConfig {
                ffmpeg: self.tools.ffmpeg.as_deref().map(expand),
                ffprobe: self.tools.ffprobe.as_deref().map(expand),
                trim: self.tools.trim.as_deref().map(expand),
                min_trim_remaining_secs: self.tools.min_trim_remaining_secs,
            },
        })
    }
}

/// Immutable per-job copy of every tunable a worker may read.
#[derive(Debug, Clone)]
pub struct JobSettings {
    pub output_folder: String,
    pub scratch_dir: PathBuf,
    pub photo_extensions: HashSet<String>,
    pub video_extensions: HashSet<String>,
    pub concurrency: Option<usize>,
    pub thumbnail: ThumbnailConfig,
    pub sheet: SheetConfig,
    pub move_batch_size: usize,
    pub tools: ToolsConfig,
}

impl Default for JobSettings {
    fn default() -> Self {
        // Defaults always pass validation.
        let config = Config::default();
        JobSettings {
            output_folder: config.general.output_folder.clone(),
            scratch_dir: config.scratch_dir(),
            photo_extensions: lowercase_set(&config.processing.photo_extensions),
            video_extensions: lowercase_set(&config.processing.video_extensions),
            concurrency: None,
            thumbnail: config.thumbnail,
            sheet: config.sheet,
            move_batch_size: config.writer.move_batch_size,
            tools: config.tools,
        }
    }
}

fn lowercase_set(exts: &[String]) -> HashSet<String> {
    exts.iter()
        .map(|e| e.trim_start_matches('.').to_lowercase())
        .collect()
}

fn expand(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&path_str).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FitPolicy, OutputFormat};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.output_folder, "thumb");
        assert_eq!(config.sheet.tiles, 10);
        assert_eq!(config.writer.move_batch_size, 5);
        assert_eq!(config.thumbnail.format, OutputFormat::Jpeg);
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[general]"));
        assert!(toml.contains("[sheet]"));
        assert!(toml.contains("fit = \"pad\""));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [sheet]
            columns = 6
            fit = "crop"

            [thumbnail]
            format = "heic"
            "#,
        )
        .unwrap();
        assert_eq!(config.sheet.columns, 6);
        assert_eq!(config.sheet.fit, FitPolicy::Crop);
        assert_eq!(config.sheet.tiles, 10);
        assert_eq!(config.thumbnail.format, OutputFormat::Heic);
        assert_eq!(config.thumbnail.height, 512);
    }

    #[test]
    fn test_snapshot_normalizes_extensions() {
        let mut config = Config::default();
        config.processing.photo_extensions = vec![".JPG".into(), "Png".into()];
        let settings = config.snapshot().unwrap();
        assert!(settings.photo_extensions.contains("jpg"));
        assert!(settings.photo_extensions.contains("png"));
        assert_eq!(settings.photo_extensions.len(), 2);
    }

    #[test]
    fn test_snapshot_is_detached_from_config() {
        let mut config = Config::default();
        let settings = config.snapshot().unwrap();
        config.thumbnail.height = 64;
        assert_eq!(settings.thumbnail.height, 512);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[general]\noutput_folder = \"previews\"\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.general.output_folder, "previews");
    }
}
