//! Image probing and reduced-size decoding.
//!
//! Probing reads only the header (dimensions) and the EXIF orientation tag.
//! Baseline JPEGs are decoded at 1/2, 1/4 or 1/8 scale straight from the DCT,
//! so their peak memory follows the output size. Other formats are decoded at
//! full size and then reduced; the thumbnailer's dimension limit bounds those.

use exif::{In, Reader, Tag, Value};
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageError, ImageFormat, ImageReader, RgbImage};
use jpeg_decoder::PixelFormat;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{PipelineError, PipelineResult};

/// EXIF orientation (1-8). Anything else is treated as 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Orientation(pub u32);

impl Default for Orientation {
    fn default() -> Self {
        Self(1)
    }
}

impl Orientation {
    /// Whether applying this orientation swaps width and height.
    pub fn swaps_axes(self) -> bool {
        matches!(self.0, 5..=8)
    }

    /// Rotate/flip a decoded image into display orientation.
    pub fn apply(self, image: DynamicImage) -> DynamicImage {
        match self.0 {
            2 => image.fliph(),
            3 => image.rotate180(),
            4 => image.flipv(),
            5 => image.rotate90().fliph(),
            6 => image.rotate90(),
            7 => image.rotate270().fliph(),
            8 => image.rotate270(),
            _ => image,
        }
    }
}

/// What a header-only probe learns about a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceInfo {
    /// Stored (pre-orientation) width
    pub width: u32,
    /// Stored (pre-orientation) height
    pub height: u32,
    pub format: ImageFormat,
    pub orientation: Orientation,
}

impl SourceInfo {
    /// Dimensions as displayed, after orientation is applied.
    pub fn display_dimensions(&self) -> (u32, u32) {
        if self.orientation.swaps_axes() {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }
}

/// Read dimensions, format and orientation without decoding pixels.
pub fn probe(path: &Path) -> PipelineResult<SourceInfo> {
    if !path.exists() {
        return Err(PipelineError::FileNotFound(path.to_path_buf()));
    }
    let reader = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: format!("Cannot open image: {e}"),
        })?;
    let format = reader.format().ok_or_else(|| unsupported(path))?;
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| map_image_error(path, e))?;
    if width == 0 || height == 0 {
        return Err(PipelineError::Decode {
            path: path.to_path_buf(),
            message: "Image has zero size".to_string(),
        });
    }

    Ok(SourceInfo {
        width,
        height,
        format,
        orientation: read_orientation(path),
    })
}

/// EXIF orientation, or the identity when absent/unreadable.
pub fn read_orientation(path: &Path) -> Orientation {
    let Ok(file) = File::open(path) else {
        return Orientation::default();
    };
    let mut reader = BufReader::new(file);
    let Ok(exif) = Reader::new().read_from_container(&mut reader) else {
        return Orientation::default();
    };
    exif.get_field(Tag::Orientation, In::PRIMARY)
        .and_then(|f| match &f.value {
            Value::Short(v) => v.first().map(|&x| x as u32),
            Value::Long(v) => v.first().copied(),
            _ => None,
        })
        .filter(|o| (1..=8).contains(o))
        .map(Orientation)
        .unwrap_or_default()
}

/// Output dimensions for a display-oriented `(width, height)` scaled to
/// `target_height`. Sources smaller than the target are not upscaled.
pub fn target_dimensions(width: u32, height: u32, target_height: u32) -> (u32, u32) {
    if height <= target_height {
        return (width.max(1), height.max(1));
    }
    let scale = target_height as f64 / height as f64;
    let w = (width as f64 * scale).round().max(1.0) as u32;
    (w, target_height.max(1))
}

/// Decode `path` into a display-oriented bitmap of exactly `target` size.
///
/// A fast reduction brings the bitmap close to the target first; a single
/// precise resampling pass follows only if the size is not already exact.
pub fn decode_to_size(
    path: &Path,
    info: &SourceInfo,
    target: (u32, u32),
) -> PipelineResult<DynamicImage> {
    // Reduce in stored orientation to roughly twice the target, which keeps
    // enough detail for the precise pass.
    let (stored_w, stored_h) = if info.orientation.swaps_axes() {
        (target.1, target.0)
    } else {
        target
    };
    let request = (stored_w.saturating_mul(2), stored_h.saturating_mul(2));

    let scaled = if info.format == ImageFormat::Jpeg {
        decode_jpeg_scaled(path, request)?
    } else {
        None
    };
    let image = match scaled {
        Some(image) => image,
        None => decode_full(path)?,
    };

    let image = if image.width() > stored_w * 2 && image.height() > stored_h * 2 {
        image.thumbnail(stored_w * 2, stored_h * 2)
    } else {
        image
    };

    let image = info.orientation.apply(image);
    if (image.width(), image.height()) == target {
        Ok(image)
    } else {
        Ok(image.resize_exact(target.0, target.1, FilterType::Lanczos3))
    }
}

fn decode_full(path: &Path) -> PipelineResult<DynamicImage> {
    let reader = ImageReader::open(path)
        .map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: format!("Cannot open image: {e}"),
        })?
        .with_guessed_format()
        .map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: format!("Cannot detect image format: {e}"),
        })?;
    reader.decode().map_err(|e| map_image_error(path, e))
}

/// Decode a JPEG at the smallest DCT scale that still covers `request`.
///
/// Returns `None` when this decoder cannot handle the file (16-bit gray,
/// CMYK, arithmetic coding, damage); the caller then does a full decode,
/// which also produces the error message for broken files.
pub fn decode_jpeg_scaled(
    path: &Path,
    request: (u32, u32),
) -> PipelineResult<Option<DynamicImage>> {
    let file = File::open(path).map_err(|e| PipelineError::Decode {
        path: path.to_path_buf(),
        message: format!("Cannot open image: {e}"),
    })?;
    let mut decoder = jpeg_decoder::Decoder::new(BufReader::new(file));
    let clamp = |v: u32| u16::try_from(v.max(1)).unwrap_or(u16::MAX);

    let scaled = decoder
        .read_info()
        .and_then(|_| decoder.scale(clamp(request.0), clamp(request.1)));
    let (width, height) = match scaled {
        Ok(size) => size,
        Err(e) => {
            tracing::debug!("Scaled JPEG decode unavailable for {:?}: {}", path, e);
            return Ok(None);
        }
    };
    let pixel_format = match decoder.info() {
        Some(info) if matches!(info.pixel_format, PixelFormat::L8 | PixelFormat::RGB24) => {
            info.pixel_format
        }
        _ => return Ok(None),
    };
    let pixels = match decoder.decode() {
        Ok(pixels) => pixels,
        Err(e) => {
            tracing::debug!("Scaled JPEG decode failed for {:?}: {}", path, e);
            return Ok(None);
        }
    };

    let (width, height) = (u32::from(width), u32::from(height));
    let image = match pixel_format {
        PixelFormat::L8 => GrayImage::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8),
        _ => RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8),
    };
    Ok(image)
}

fn unsupported(path: &Path) -> PipelineError {
    PipelineError::UnsupportedFormat {
        path: path.to_path_buf(),
        format: path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("unknown")
            .to_lowercase(),
    }
}

fn map_image_error(path: &Path, e: ImageError) -> PipelineError {
    match e {
        ImageError::Unsupported(_) => unsupported(path),
        other => PipelineError::Decode {
            path: path.to_path_buf(),
            message: other.to_string(),
        },
    }
}
