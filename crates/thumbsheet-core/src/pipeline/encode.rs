//! Output encoding (JPEG, and HEIC when built with the `heif` feature).

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::path::Path;

use crate::error::{PipelineError, PipelineResult};
use crate::types::OutputFormat;

/// Map a `0.0..=1.0` quality to the encoder's `1..=100` scale.
pub fn quality_percent(quality: f32) -> u8 {
    (quality.clamp(0.0, 1.0) * 100.0).round().clamp(1.0, 100.0) as u8
}

/// Encode `image` in `format`. `path` only labels errors.
pub fn encode(
    image: &DynamicImage,
    format: OutputFormat,
    quality: f32,
    path: &Path,
) -> PipelineResult<Vec<u8>> {
    match format {
        OutputFormat::Jpeg => encode_jpeg(image, quality, path),
        OutputFormat::Heic => encode_heic(image, quality, path),
    }
}

fn encode_jpeg(image: &DynamicImage, quality: f32, path: &Path) -> PipelineResult<Vec<u8>> {
    let rgb = image.to_rgb8();
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality_percent(quality))
        .encode_image(&rgb)
        .map_err(|e| PipelineError::Encode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    Ok(buffer)
}

#[cfg(feature = "heif")]
fn encode_heic(image: &DynamicImage, quality: f32, path: &Path) -> PipelineResult<Vec<u8>> {
    use libheif_rs::{
        Channel, ColorSpace, CompressionFormat, EncoderQuality, HeifContext, Image, LibHeif,
        RgbChroma,
    };

    let encode_err = |e: libheif_rs::HeifError| PipelineError::Encode {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    let mut heif_image =
        Image::new(width, height, ColorSpace::Rgb(RgbChroma::Rgb)).map_err(encode_err)?;
    heif_image
        .create_plane(Channel::Interleaved, width, height, 8)
        .map_err(encode_err)?;

    {
        let planes = heif_image.planes_mut();
        let plane = planes.interleaved.ok_or_else(|| PipelineError::Encode {
            path: path.to_path_buf(),
            message: "libheif returned no interleaved plane".to_string(),
        })?;
        let row_bytes = width as usize * 3;
        for (y, row) in rgb.as_raw().chunks_exact(row_bytes).enumerate() {
            let start = y * plane.stride;
            plane.data[start..start + row_bytes].copy_from_slice(row);
        }
    }

    let lib_heif = LibHeif::new();
    let mut context = HeifContext::new().map_err(encode_err)?;
    let mut encoder = lib_heif
        .encoder_for_format(CompressionFormat::Hevc)
        .map_err(encode_err)?;
    encoder
        .set_quality(EncoderQuality::Lossy(quality_percent(quality)))
        .map_err(encode_err)?;
    context
        .encode_image(&heif_image, &mut encoder, None)
        .map_err(encode_err)?;
    context.write_to_bytes().map_err(encode_err)
}

#[cfg(not(feature = "heif"))]
fn encode_heic(_image: &DynamicImage, _quality: f32, path: &Path) -> PipelineResult<Vec<u8>> {
    Err(PipelineError::UnsupportedFormat {
        path: path.to_path_buf(),
        format: "heic (built without the `heif` feature)".to_string(),
    })
}
