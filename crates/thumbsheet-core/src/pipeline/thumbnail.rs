//! Per-photo thumbnail generation.

use std::path::Path;
use std::time::{Duration, Instant};

use super::decode::{decode_to_size, probe, target_dimensions};
use super::encode::encode;
use super::writer::{self, MoveHandle};
use crate::config::ThumbnailConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::types::{ItemOutcome, WorkItem};

/// Renders one photo into a downsampled, orientation-corrected thumbnail.
#[derive(Debug, Clone)]
pub struct ImageThumbnailer {
    config: ThumbnailConfig,
}

impl ImageThumbnailer {
    pub fn new(config: ThumbnailConfig) -> Self {
        Self { config }
    }

    /// Decode, resize and encode `source`. Blocking.
    pub fn render(&self, source: &Path, destination: &Path) -> PipelineResult<Vec<u8>> {
        let info = probe(source)?;
        let max_dim = self.config.max_image_dimension;
        if info.width > max_dim || info.height > max_dim {
            return Err(PipelineError::ImageTooLarge {
                path: source.to_path_buf(),
                width: info.width,
                height: info.height,
                max_dim,
            });
        }
        let (width, height) = info.display_dimensions();
        let target = target_dimensions(width, height, self.config.height);
        tracing::trace!(
            "Thumbnail {:?}: {}x{} -> {}x{} (orientation {})",
            source,
            width,
            height,
            target.0,
            target.1,
            info.orientation.0
        );
        let image = decode_to_size(source, &info, target)?;
        encode(&image, self.config.format, self.config.quality, destination)
    }

    /// Produce the item's output, staging it in `scratch_dir` and committing
    /// it through `mover`.
    ///
    /// An existing destination is reused without re-encoding.
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

        let this = self.clone();
        let source = item.source.clone();
        let destination = item.destination.clone();
        let scratch = scratch_dir.to_path_buf();
        let timeout_ms = self.config.decode_timeout_ms;
        let task = tokio::task::spawn_blocking(move || {
            let bytes = this.render(&source, &destination)?;
            writer::stage(&scratch, &bytes, &destination)
        });
        // An abandoned blocking task still finishes; its staged file dies
        // with the scratch area.
        let staged = tokio::time::timeout(Duration::from_millis(timeout_ms), task)
            .await
            .map_err(|_| PipelineError::Timeout {
                path: item.source.clone(),
                stage: "decode".to_string(),
                timeout_ms,
            })?
            .map_err(|e| PipelineError::Decode {
                path: item.source.clone(),
                message: format!("Thumbnail task failed: {e}"),
            })??;

        let output_bytes = mover.commit(staged).await?;
        Ok(Produced {
            source_bytes,
            output_bytes,
            reused: false,
        })
    }
}

/// What a worker produced for a successful item.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Produced {
    pub source_bytes: u64,
    pub output_bytes: u64,
    pub reused: bool,
}

/// Size of an already-complete output, if one exists.
pub(crate) async fn existing_output(destination: &Path) -> Option<u64> {
    tokio::fs::metadata(destination)
        .await
        .ok()
        .filter(|m| m.is_file() && m.len() > 0)
        .map(|m| m.len())
}

pub(crate) async fn file_size(path: &Path) -> PipelineResult<u64> {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.len())
        .map_err(|_| PipelineError::FileNotFound(path.to_path_buf()))
}

/// Turn a worker result into an item outcome.
pub(crate) fn finish(
    item: &WorkItem,
    result: PipelineResult<Produced>,
    started: Instant,
) -> ItemOutcome {
    match result {
        Ok(p) => ItemOutcome::Success {
            source: item.source.clone(),
            output: item.destination.clone(),
            source_bytes: p.source_bytes,
            output_bytes: p.output_bytes,
            elapsed: started.elapsed(),
            reused: p.reused,
        },
        Err(PipelineError::Cancelled) => ItemOutcome::Cancelled {
            source: item.source.clone(),
        },
        Err(e) if e.is_unsupported() => {
            tracing::debug!("Skipping {:?}: {}", item.source, e);
            ItemOutcome::Unsupported {
                source: item.source.clone(),
                message: e.to_string(),
            }
        }
        Err(e) => {
            tracing::warn!("Failed {:?}: {}", item.source, e);
            ItemOutcome::Failure {
                source: item.source.clone(),
                message: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::writer::{MoveQueue, ScratchArea};
    use crate::types::OutputFormat;
    use image::{Rgb, RgbImage};

    fn thumbnailer(height: u32) -> ImageThumbnailer {
        ImageThumbnailer::new(ThumbnailConfig {
            height,
            format: OutputFormat::Jpeg,
            quality: 0.8,
            ..Default::default()
        })
    }

    #[test]
    fn test_render_scales_to_target_height() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("wide.png");
        RgbImage::from_pixel(1000, 500, Rgb([1, 2, 3])).save(&src).unwrap();

        let bytes = thumbnailer(100)
            .render(&src, &dir.path().join("wide.jpg"))
            .unwrap();
        let out = image::load_from_memory(&bytes).unwrap();
        assert_eq!((out.width(), out.height()), (200, 100));
    }

    #[tokio::test]
    async fn test_process_writes_and_then_reuses() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.png");
        RgbImage::from_pixel(300, 200, Rgb([9, 9, 9])).save(&src).unwrap();
        let out_dir = dir.path().join("thumb");
        std::fs::create_dir(&out_dir).unwrap();
        let item = WorkItem::new(0, src, &out_dir, OutputFormat::Jpeg);

        let scratch = ScratchArea::new(&dir.path().join("scratch")).unwrap();
        let (mover, task) = MoveQueue::spawn(5);
        let t = thumbnailer(50);

        let first = t.process(&item, scratch.path(), &mover).await;
        match &first {
            ItemOutcome::Success { reused, .. } => assert!(!reused),
            other => panic!("unexpected {other:?}"),
        }
        let written = std::fs::read(&item.destination).unwrap();

        let second = t.process(&item, scratch.path(), &mover).await;
        match &second {
            ItemOutcome::Success { reused, .. } => assert!(reused),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(std::fs::read(&item.destination).unwrap(), written);

        drop(mover);
        assert_eq!(task.await.unwrap(), 1);
    }

    #[test]
    fn test_render_refuses_oversized_source() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("huge.png");
        RgbImage::from_pixel(400, 50, Rgb([1, 2, 3])).save(&src).unwrap();

        let t = ImageThumbnailer::new(ThumbnailConfig {
            height: 20,
            max_image_dimension: 300,
            ..Default::default()
        });
        let err = t.render(&src, &dir.path().join("huge.jpg")).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ImageTooLarge {
                width: 400,
                height: 50,
                max_dim: 300,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_corrupt_source_fails_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("broken.jpg");
        std::fs::write(&src, b"\xFF\xD8\xFF\xE0 not really").unwrap();
        let out_dir = dir.path().join("thumb");
        std::fs::create_dir(&out_dir).unwrap();
        let item = WorkItem::new(0, src, &out_dir, OutputFormat::Jpeg);

        let scratch = ScratchArea::new(&dir.path().join("scratch")).unwrap();
        let (mover, _task) = MoveQueue::spawn(5);
        let outcome = thumbnailer(50).process(&item, scratch.path(), &mover).await;

        assert!(matches!(outcome, ItemOutcome::Failure { .. }));
        assert!(!item.destination.exists());
    }
}
