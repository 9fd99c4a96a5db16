//! Job runner - wires together all processing stages.
//!
//! A job classifies its roots, scans leaf folders for each content type,
//! counts every item up front (discovery), then processes folder by folder.
//! Each folder gets its own output directory, scratch area and move queue.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use super::classify::{ContentClassifier, ContentSummary};
use super::discovery::{media_files, LeafScanner};
use super::progress::ProgressHandle;
use super::scheduler::{default_concurrency, CancelToken, Scheduler};
use super::thumbnail::ImageThumbnailer;
use super::video::{FfmpegFrameSource, FrameSampler, FrameSource};
use super::writer::{MoveHandle, MoveQueue, ScratchArea};
use crate::config::JobSettings;
use crate::error::{PipelineError, Result};
use crate::types::{BatchSummary, ContentType, ItemOutcome, LeafFolder, WorkItem};

/// Which content a job processes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Whatever the classifier finds (both when mixed)
    #[default]
    Auto,
    Photos,
    Videos,
}

/// Everything a caller needs to summarize a finished job.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobReport {
    pub content: ContentSummary,
    pub leaf_folders: usize,
    pub photos: Option<BatchSummary>,
    pub videos: Option<BatchSummary>,
    pub cancelled: bool,
}

impl JobReport {
    /// Photos and videos folded into one summary.
    pub fn combined(&self) -> BatchSummary {
        let mut total = BatchSummary::default();
        let mut elapsed = std::time::Duration::ZERO;
        for summary in [&self.photos, &self.videos].into_iter().flatten() {
            total.merge(summary.clone());
            elapsed += summary.elapsed;
        }
        total.finalize(elapsed);
        total
    }
}

/// A leaf folder with the files found in it during discovery.
#[derive(Debug, Clone)]
struct PlannedFolder {
    leaf: LeafFolder,
    files: Vec<PathBuf>,
}

/// Exhaustive per-content dispatch.
enum Processor {
    Photo(ImageThumbnailer),
    Video(FrameSampler),
}

struct FolderWorker {
    processor: Processor,
    scratch: PathBuf,
    mover: MoveHandle,
}

impl FolderWorker {
    async fn process(&self, item: &WorkItem) -> ItemOutcome {
        match &self.processor {
            Processor::Photo(t) => t.process(item, &self.scratch, &self.mover).await,
            Processor::Video(s) => s.process(item, &self.scratch, &self.mover).await,
        }
    }
}

/// One run over a set of roots with a frozen settings snapshot.
pub struct Job {
    settings: Arc<JobSettings>,
    frames: Option<Arc<dyn FrameSource>>,
    cancel: CancelToken,
    progress: Option<ProgressHandle>,
    concurrency: usize,
}

impl Job {
    /// Create a job. Concurrency comes from the settings, or from the
    /// machine's cores and memory when unset.
    pub fn new(settings: JobSettings, cancel: CancelToken) -> Self {
        let concurrency = settings
            .concurrency
            .filter(|&n| n > 0)
            .unwrap_or_else(default_concurrency);
        Self {
            settings: Arc::new(settings),
            frames: None,
            cancel,
            progress: None,
            concurrency,
        }
    }

    /// Use `source` for video frames instead of discovering ffmpeg.
    pub fn with_frame_source(mut self, source: Arc<dyn FrameSource>) -> Self {
        self.frames = Some(source);
        self
    }

    /// Report discovery and completions to an aggregator.
    pub fn with_progress(mut self, handle: ProgressHandle) -> Self {
        self.progress = Some(handle);
        self
    }

    pub fn settings(&self) -> &JobSettings {
        &self.settings
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Which media types appear under `roots`.
    pub async fn classify(&self, roots: &[PathBuf]) -> ContentSummary {
        let settings = self.settings.clone();
        let cancel = self.cancel.clone();
        let roots = roots.to_vec();
        tokio::task::spawn_blocking(move || {
            ContentClassifier::new(
                &settings.photo_extensions,
                &settings.video_extensions,
                &settings.output_folder,
            )
            .classify(&roots, &cancel, None)
        })
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Classifier task failed: {e}");
            ContentSummary::default()
        })
    }

    /// Leaf folders of `content` under `roots`.
    pub async fn scan(&self, roots: &[PathBuf], content: ContentType) -> Vec<LeafFolder> {
        let settings = self.settings.clone();
        let cancel = self.cancel.clone();
        let roots = roots.to_vec();
        tokio::task::spawn_blocking(move || {
            let extensions = match content {
                ContentType::Photo => &settings.photo_extensions,
                ContentType::Video => &settings.video_extensions,
            };
            LeafScanner::new(extensions, &settings.output_folder, content)
                .scan(&roots, &cancel, None)
        })
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Scanner task failed: {e}");
            Vec::new()
        })
    }

    /// Run the whole job.
    ///
    /// Per-item and per-folder problems end up in the report; only setup
    /// problems (such as a missing ffmpeg when videos must be processed)
    /// fail the call.
    pub async fn run(&self, roots: &[PathBuf], kind: JobKind) -> Result<JobReport> {
        let content = match kind {
            JobKind::Auto => self.classify(roots).await,
            JobKind::Photos => ContentSummary {
                has_photos: true,
                has_videos: false,
            },
            JobKind::Videos => ContentSummary {
                has_photos: false,
                has_videos: true,
            },
        };
        let mut report = JobReport {
            content,
            ..Default::default()
        };
        if content.is_empty() {
            tracing::info!("No photos or videos found");
            self.finish_discovery();
            return Ok(report);
        }

        let frames = if content.has_videos {
            Some(self.frame_source()?)
        } else {
            None
        };

        // Discovery: every item is counted before any is processed.
        let mut plans = Vec::new();
        for (present, content_type) in [
            (content.has_photos, ContentType::Photo),
            (content.has_videos, ContentType::Video),
        ] {
            if present {
                let planned = self.discover(roots, content_type).await;
                report.leaf_folders += planned.len();
                plans.push((content_type, planned));
            }
        }
        self.finish_discovery();

        for (content_type, planned) in plans {
            let summary = self.process_content(content_type, planned, frames.clone()).await;
            report.cancelled |= summary.cancelled;
            match content_type {
                ContentType::Photo => report.photos = Some(summary),
                ContentType::Video => report.videos = Some(summary),
            }
        }
        report.cancelled |= self.cancel.is_cancelled();
        Ok(report)
    }

    fn frame_source(&self) -> Result<Arc<dyn FrameSource>> {
        match &self.frames {
            Some(source) => Ok(source.clone()),
            None => Ok(Arc::new(FfmpegFrameSource::discover(&self.settings.tools)?)),
        }
    }

    fn finish_discovery(&self) {
        if let Some(progress) = &self.progress {
            progress.discovery_finished();
        }
    }

    fn completed(&self, count: usize) {
        if let Some(progress) = &self.progress {
            for _ in 0..count {
                progress.completed();
            }
        }
    }

    /// Skipped items still count as done for progress.
    fn skipped(&self, summary: &mut BatchSummary, count: usize) {
        summary.record_skipped(count);
        self.completed(count);
    }

    async fn discover(&self, roots: &[PathBuf], content: ContentType) -> Vec<PlannedFolder> {
        let leaves = self.scan(roots, content).await;
        let extensions = match content {
            ContentType::Photo => &self.settings.photo_extensions,
            ContentType::Video => &self.settings.video_extensions,
        };

        let mut planned = Vec::with_capacity(leaves.len());
        for leaf in leaves {
            let folder = leaf.path.clone();
            let wanted = extensions.clone();
            let listed = tokio::task::spawn_blocking(move || media_files(&folder, &wanted))
                .await
                .unwrap_or_else(|e| Err(std::io::Error::other(e)));
            match listed {
                Ok(files) => {
                    if let Some(progress) = &self.progress {
                        progress.discovered(files.len() as u64);
                    }
                    planned.push(PlannedFolder { leaf, files });
                }
                Err(e) => tracing::warn!("Skipping unreadable folder {:?}: {}", leaf.path, e),
            }
        }
        tracing::info!(
            "Found {} {} item(s) in {} folder(s)",
            planned.iter().map(|p| p.files.len()).sum::<usize>(),
            content,
            planned.len()
        );
        planned
    }

    async fn process_content(
        &self,
        content: ContentType,
        planned: Vec<PlannedFolder>,
        frames: Option<Arc<dyn FrameSource>>,
    ) -> BatchSummary {
        let started = Instant::now();
        let mut summary = BatchSummary::default();

        for folder in planned {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                self.skipped(&mut summary, folder.files.len());
                continue;
            }
            let processor = match (content, &frames) {
                (ContentType::Photo, _) => {
                    Processor::Photo(ImageThumbnailer::new(self.settings.thumbnail.clone()))
                }
                (ContentType::Video, Some(source)) => Processor::Video(FrameSampler::new(
                    source.clone(),
                    &self.settings,
                    self.cancel.clone(),
                )),
                (ContentType::Video, None) => {
                    self.skipped(&mut summary, folder.files.len());
                    continue;
                }
            };
            self.process_folder(folder, processor, &mut summary).await;
        }

        summary.finalize(started.elapsed());
        tracing::info!(
            "{}: {} succeeded, {} failed, {} skipped in {:.1}s",
            content,
            summary.succeeded,
            summary.failed,
            summary.skipped,
            summary.elapsed.as_secs_f64()
        );
        summary
    }

    async fn process_folder(
        &self,
        folder: PlannedFolder,
        processor: Processor,
        summary: &mut BatchSummary,
    ) {
        let count = folder.files.len();
        let output_dir = folder.leaf.path.join(&self.settings.output_folder);

        let scratch = match prepare_folder(&output_dir, &self.settings.scratch_dir).await {
            Ok(scratch) => scratch,
            Err(e) => {
                tracing::warn!("Skipping {} item(s) in {:?}: {}", count, folder.leaf.path, e);
                self.skipped(summary, count);
                return;
            }
        };
        tracing::info!("Processing {} item(s) in {:?}", count, folder.leaf.path);

        let format = self.settings.thumbnail.format;
        let items: Vec<WorkItem> = folder
            .files
            .into_iter()
            .enumerate()
            .map(|(i, source)| WorkItem::new(i, source, &output_dir, format))
            .collect();
        let sources: Vec<PathBuf> = items.iter().map(|i| i.source.clone()).collect();

        let (mover, move_task) = MoveQueue::spawn(self.settings.move_batch_size);
        let worker = Arc::new(FolderWorker {
            processor,
            scratch: scratch.path().to_path_buf(),
            mover,
        });

        let scheduler = Scheduler::new(self.concurrency, self.cancel.clone());
        let report = scheduler
            .run(
                items,
                move |item| {
                    let worker = worker.clone();
                    async move { worker.process(&item).await }
                },
                |index, output| {
                    let outcome = output.unwrap_or_else(|panic| ItemOutcome::Failure {
                        source: sources[index].clone(),
                        message: format!("Worker panicked: {}", panic.0),
                    });
                    summary.record(&outcome);
                    self.completed(1);
                },
            )
            .await;

        if report.cancelled {
            summary.cancelled = true;
            self.skipped(summary, report.not_started);
        }

        // Every worker (and its move handle) is gone; the queue drains and stops.
        match move_task.await {
            Ok(moved) => tracing::debug!("Moved {moved} file(s) into {:?}", output_dir),
            Err(e) => tracing::error!("Move queue for {:?} failed: {e}", output_dir),
        }
        drop(scratch);
    }
}

/// Create the output directory and a scratch area for one folder.
async fn prepare_folder(output_dir: &Path, scratch_base: &Path) -> Result<ScratchArea> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|e| PipelineError::DestinationSetup {
            path: output_dir.to_path_buf(),
            message: e.to_string(),
        })?;
    let base = scratch_base.to_path_buf();
    let scratch = tokio::task::spawn_blocking(move || ScratchArea::new(&base))
        .await
        .map_err(|e| PipelineError::DestinationSetup {
            path: scratch_base.to_path_buf(),
            message: e.to_string(),
        })??;
    Ok(scratch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::progress::ProgressAggregator;
    use crate::pipeline::video::tests::{CancelAfter, FakeFrames};
    use image::{Rgb, RgbImage};
    use std::fs;

    fn settings(scratch: &Path) -> JobSettings {
        let mut settings = JobSettings::default();
        settings.scratch_dir = scratch.to_path_buf();
        settings.concurrency = Some(2);
        settings.thumbnail.height = 16;
        settings.sheet.cell_height = 18;
        settings
    }

    fn photo(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbImage::from_pixel(48, 32, Rgb([120, 60, 30]))
            .save_with_format(path, image::ImageFormat::Png)
            .unwrap();
    }

    #[tokio::test]
    async fn test_videos_get_contact_sheets() {
        let root = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("clips")).unwrap();
        fs::write(root.path().join("clips/a.mp4"), b"fake").unwrap();
        fs::write(root.path().join("clips/b.mov"), b"fake").unwrap();

        let job = Job::new(settings(scratch.path()), CancelToken::new())
            .with_frame_source(Arc::new(FakeFrames::new(30.0)));
        let report = job
            .run(&[root.path().to_path_buf()], JobKind::Auto)
            .await
            .unwrap();

        assert!(report.content.has_videos && !report.content.has_photos);
        let videos = report.videos.unwrap();
        assert_eq!(videos.total, 2);
        assert_eq!(videos.succeeded, 2);
        assert!(root.path().join("clips/thumb/a.jpg").exists());
        assert!(root.path().join("clips/thumb/b.jpg").exists());
    }

    #[tokio::test]
    async fn test_unusable_video_is_a_failure() {
        let root = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        fs::write(root.path().join("broken.mp4"), b"fake").unwrap();

        let job = Job::new(settings(scratch.path()), CancelToken::new())
            .with_frame_source(Arc::new(FakeFrames::new(0.0)));
        let report = job
            .run(&[root.path().to_path_buf()], JobKind::Videos)
            .await
            .unwrap();

        let videos = report.videos.unwrap();
        assert_eq!(videos.failed, 1);
        assert_eq!(videos.failed_paths, vec![root.path().join("broken.mp4")]);
        assert!(!root.path().join("thumb/broken.jpg").exists());
    }

    #[tokio::test]
    async fn test_mixed_content_runs_both() {
        let root = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        photo(&root.path().join("pics/one.png"));
        fs::create_dir_all(root.path().join("vids")).unwrap();
        fs::write(root.path().join("vids/clip.mp4"), b"fake").unwrap();

        let job = Job::new(settings(scratch.path()), CancelToken::new())
            .with_frame_source(Arc::new(FakeFrames::new(12.0)));
        let report = job
            .run(&[root.path().to_path_buf()], JobKind::Auto)
            .await
            .unwrap();

        assert!(report.content.is_mixed());
        assert_eq!(report.leaf_folders, 2);
        let combined = report.combined();
        assert_eq!(combined.total, 2);
        assert_eq!(combined.succeeded, 2);
    }

    #[tokio::test]
    async fn test_progress_reaches_known_total() {
        let root = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        for i in 0..4 {
            photo(&root.path().join(format!("p/{i}.png")));
        }
        fs::write(root.path().join("p/bad.jpg"), b"nope").unwrap();

        let (handle, rx, task) = ProgressAggregator::spawn();
        let job = Job::new(settings(scratch.path()), CancelToken::new()).with_progress(handle);
        let report = job
            .run(&[root.path().to_path_buf()], JobKind::Photos)
            .await
            .unwrap();
        drop(job);

        let progress = task.await.unwrap();
        assert_eq!(progress.known, 5);
        assert_eq!(progress.completed, 5);
        assert!(rx.borrow().discovery_finished);
        assert_eq!(report.photos.unwrap().failed, 1);
    }

    #[tokio::test]
    async fn test_progress_completes_when_cancelled_mid_run() {
        let root = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        for folder in ["a", "b", "c"] {
            fs::create_dir_all(root.path().join(folder)).unwrap();
            for i in 0..4 {
                fs::write(root.path().join(format!("{folder}/{i}.mp4")), b"fake").unwrap();
            }
        }

        let cancel = CancelToken::new();
        let frames = Arc::new(CancelAfter::new(2, cancel.clone()));
        let (handle, _rx, task) = ProgressAggregator::spawn();
        let job = Job::new(settings(scratch.path()), cancel)
            .with_frame_source(frames)
            .with_progress(handle);
        let report = job
            .run(&[root.path().to_path_buf()], JobKind::Videos)
            .await
            .unwrap();
        drop(job);

        let progress = task.await.unwrap();
        let videos = report.videos.unwrap();
        assert!(report.cancelled);
        assert!(videos.skipped > 0);
        assert_eq!(videos.total, 12);
        assert_eq!(progress.known, 12);
        assert_eq!(progress.completed, 12);
    }

    #[tokio::test]
    async fn test_scratch_areas_are_removed() {
        let root = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        photo(&root.path().join("a/x.png"));
        photo(&root.path().join("b/y.png"));

        let job = Job::new(settings(scratch.path()), CancelToken::new());
        job.run(&[root.path().to_path_buf()], JobKind::Photos)
            .await
            .unwrap();

        assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
    }
}
