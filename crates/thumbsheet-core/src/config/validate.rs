//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

/// Bounds on the number of frames per contact sheet.
pub const MIN_TILES: u32 = 3;
pub const MAX_TILES: u32 = 40;

/// Upper bounds on sheet and thumbnail geometry.
pub const MAX_COLUMNS: u32 = 20;
pub const MAX_CELL_HEIGHT: u32 = 2160;
pub const MAX_SPACING: u32 = 256;
pub const MAX_FRAME_SIZE: u32 = 4096;
pub const MAX_THUMBNAIL_HEIGHT: u32 = 8192;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = self.general.output_folder.trim();
        if name.is_empty() || name.contains('/') || name.contains('\\') {
            return Err(ConfigError::ValidationError(
                "general.output_folder must be a single non-empty folder name".into(),
            ));
        }
        if self.processing.concurrency == Some(0) {
            return Err(ConfigError::ValidationError(
                "processing.concurrency must be > 0".into(),
            ));
        }
        if self.processing.photo_extensions.is_empty() && self.processing.video_extensions.is_empty()
        {
            return Err(ConfigError::ValidationError(
                "processing needs at least one photo or video extension".into(),
            ));
        }
        if !(1..=MAX_THUMBNAIL_HEIGHT).contains(&self.thumbnail.height) {
            return Err(ConfigError::ValidationError(format!(
                "thumbnail.height must be between 1 and {MAX_THUMBNAIL_HEIGHT}"
            )));
        }
        if self.thumbnail.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "thumbnail.max_image_dimension must be > 0".into(),
            ));
        }
        if self.thumbnail.decode_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "thumbnail.decode_timeout_ms must be > 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.thumbnail.quality) {
            return Err(ConfigError::ValidationError(
                "thumbnail.quality must be between 0.0 and 1.0".into(),
            ));
        }
        if !(1..=MAX_COLUMNS).contains(&self.sheet.columns) {
            return Err(ConfigError::ValidationError(format!(
                "sheet.columns must be between 1 and {MAX_COLUMNS}"
            )));
        }
        if !(1..=MAX_CELL_HEIGHT).contains(&self.sheet.cell_height) {
            return Err(ConfigError::ValidationError(format!(
                "sheet.cell_height must be between 1 and {MAX_CELL_HEIGHT}"
            )));
        }
        if self.sheet.spacing > MAX_SPACING {
            return Err(ConfigError::ValidationError(format!(
                "sheet.spacing must be at most {MAX_SPACING}"
            )));
        }
        if !(MIN_TILES..=MAX_TILES).contains(&self.sheet.tiles) {
            return Err(ConfigError::ValidationError(format!(
                "sheet.tiles must be between {MIN_TILES} and {MAX_TILES}"
            )));
        }
        if !self.sheet.skip_first_secs.is_finite() || self.sheet.skip_first_secs < 0.0 {
            return Err(ConfigError::ValidationError(
                "sheet.skip_first_secs must be >= 0".into(),
            ));
        }
        if !(1..=MAX_FRAME_SIZE).contains(&self.sheet.max_frame_size) {
            return Err(ConfigError::ValidationError(format!(
                "sheet.max_frame_size must be between 1 and {MAX_FRAME_SIZE}"
            )));
        }
        if self.sheet.frame_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "sheet.frame_concurrency must be > 0".into(),
            ));
        }
        if self.writer.move_batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "writer.move_batch_size must be > 0".into(),
            ));
        }
        if !self.tools.min_trim_remaining_secs.is_finite() || self.tools.min_trim_remaining_secs < 0.0
        {
            return Err(ConfigError::ValidationError(
                "tools.min_trim_remaining_secs must be >= 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.processing.concurrency = Some(0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn test_validate_rejects_nested_output_folder() {
        let mut config = Config::default();
        config.general.output_folder = "a/b".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("output_folder"));
    }

    #[test]
    fn test_validate_rejects_out_of_range_tiles() {
        let mut config = Config::default();
        config.sheet.tiles = 2;
        assert!(config.validate().unwrap_err().to_string().contains("tiles"));

        config.sheet.tiles = 41;
        assert!(config.validate().unwrap_err().to_string().contains("tiles"));

        config.sheet.tiles = 40;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_invalid_quality() {
        let mut config = Config::default();
        config.thumbnail.quality = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("quality"));

        config.thumbnail.quality = -0.1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("quality"));
    }

    #[test]
    fn test_validate_caps_sheet_dimensions() {
        let mut config = Config::default();
        config.sheet.columns = MAX_COLUMNS + 1;
        assert!(config.validate().unwrap_err().to_string().contains("columns"));

        let mut config = Config::default();
        config.sheet.cell_height = u32::MAX;
        assert!(config.validate().unwrap_err().to_string().contains("cell_height"));

        let mut config = Config::default();
        config.sheet.max_frame_size = 100_000;
        assert!(config.validate().unwrap_err().to_string().contains("max_frame_size"));

        let mut config = Config::default();
        config.sheet.spacing = 10_000;
        assert!(config.validate().unwrap_err().to_string().contains("spacing"));

        let mut config = Config::default();
        config.sheet.columns = MAX_COLUMNS;
        config.sheet.cell_height = MAX_CELL_HEIGHT;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_decode_limits() {
        let mut config = Config::default();
        config.thumbnail.decode_timeout_ms = 0;
        assert!(config.validate().unwrap_err().to_string().contains("decode_timeout_ms"));

        let mut config = Config::default();
        config.thumbnail.max_image_dimension = 0;
        assert!(config.validate().unwrap_err().to_string().contains("max_image_dimension"));
    }

    #[test]
    fn test_validate_rejects_negative_skip() {
        let mut config = Config::default();
        config.sheet.skip_first_secs = -1.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("skip_first_secs"));
    }
}
