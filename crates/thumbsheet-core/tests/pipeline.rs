//! End-to-end runs over real folder trees.

use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thumbsheet_core::pipeline::discovery::extension_in;
use thumbsheet_core::pipeline::trim::{TrimRequest, Trimmer};
use thumbsheet_core::pipeline::writer::ScratchArea;
use thumbsheet_core::pipeline::{FrameSource, LeafScanner, VideoInfo};
use thumbsheet_core::{
    CancelToken, ContentType, Job, JobKind, JobSettings, PipelineError, PipelineResult,
    ProgressAggregator,
};

fn photo(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    RgbImage::from_fn(60, 40, |x, y| Rgb([(x * 4) as u8, (y * 6) as u8, 90]))
        .save_with_format(path, image::ImageFormat::Png)
        .unwrap();
}

fn settings(scratch: &Path) -> JobSettings {
    let mut settings = JobSettings::default();
    settings.scratch_dir = scratch.to_path_buf();
    settings.concurrency = Some(3);
    settings.thumbnail.height = 20;
    settings
}

/// folder1: 10 photos plus a `thumb/` holding decoys, folder2: none, folder3: 5.
fn three_folders(root: &Path) -> [PathBuf; 3] {
    let folders = [root.join("folder1"), root.join("folder2"), root.join("folder3")];
    for i in 0..10 {
        photo(&folders[0].join(format!("IMG_{i:04}.png")));
    }
    for i in 0..3 {
        photo(&folders[0].join(format!("thumb/old_{i}.png")));
    }
    fs::create_dir_all(&folders[1]).unwrap();
    fs::write(folders[1].join("notes.txt"), b"nothing to see").unwrap();
    for i in 0..5 {
        photo(&folders[2].join(format!("IMG_{i:04}.png")));
    }
    folders
}

#[test]
fn scanner_finds_exactly_the_folders_with_photos() {
    let root = tempfile::tempdir().unwrap();
    let folders = three_folders(root.path());
    let settings = JobSettings::default();

    let leaves = LeafScanner::new(&settings.photo_extensions, "thumb", ContentType::Photo).scan(
        &[root.path().to_path_buf()],
        &CancelToken::new(),
        None,
    );
    let paths: Vec<PathBuf> = leaves.iter().map(|l| l.path.clone()).collect();
    assert_eq!(paths, vec![folders[0].clone(), folders[2].clone()]);

    // Every leaf directly holds a matching file.
    for leaf in &paths {
        let direct = fs::read_dir(leaf)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().unwrap().is_file())
            .any(|e| extension_in(&e.path(), &settings.photo_extensions));
        assert!(direct, "{leaf:?} has no direct match");
    }
}

#[tokio::test]
async fn batch_counts_add_up_and_reruns_are_noops() {
    let root = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let folders = three_folders(root.path());
    fs::write(folders[2].join("IMG_9999.jpg"), b"corrupt").unwrap();

    let job = Job::new(settings(scratch.path()), CancelToken::new());
    let report = job
        .run(&[root.path().to_path_buf()], JobKind::Auto)
        .await
        .unwrap();

    let photos = report.photos.clone().unwrap();
    assert_eq!(report.leaf_folders, 2);
    assert_eq!(photos.total, 16);
    assert_eq!(photos.succeeded + photos.failed + photos.skipped, photos.total);
    assert_eq!(photos.succeeded, 15);
    assert_eq!(photos.failed_paths, vec![folders[2].join("IMG_9999.jpg")]);

    // The decoys in folder1/thumb were neither processed nor counted.
    assert!(!folders[0].join("thumb/thumb").exists());
    let out = fs::read_dir(folders[0].join("thumb")).unwrap().count();
    assert_eq!(out, 10 + 3);

    let first = fs::read(folders[2].join("thumb/IMG_0003.jpg")).unwrap();
    let thumb = image::load_from_memory(&first).unwrap();
    assert_eq!((thumb.width(), thumb.height()), (30, 20));

    let again = job
        .run(&[root.path().to_path_buf()], JobKind::Auto)
        .await
        .unwrap()
        .photos
        .unwrap();
    assert_eq!(again.succeeded, 15);
    assert_eq!(fs::read(folders[2].join("thumb/IMG_0003.jpg")).unwrap(), first);
}

#[tokio::test]
async fn unwritable_output_folder_skips_only_that_folder() {
    let root = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    photo(&root.path().join("ok/a.png"));
    photo(&root.path().join("blocked/b.png"));
    photo(&root.path().join("blocked/c.png"));
    // A file where the output directory should go.
    fs::write(root.path().join("blocked/thumb"), b"in the way").unwrap();

    let report = Job::new(settings(scratch.path()), CancelToken::new())
        .run(&[root.path().to_path_buf()], JobKind::Photos)
        .await
        .unwrap();

    let photos = report.photos.unwrap();
    assert_eq!(photos.total, 3);
    assert_eq!(photos.succeeded, 1);
    assert_eq!(photos.skipped, 2);
    assert_eq!(photos.failed, 0);
    assert!(root.path().join("ok/thumb/a.jpg").exists());
}

#[tokio::test]
async fn cancelled_job_writes_nothing() {
    let root = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let folders = three_folders(root.path());

    let cancel = CancelToken::new();
    let job = Job::new(settings(scratch.path()), cancel.clone());
    cancel.cancel();
    let report = job
        .run(&[root.path().to_path_buf()], JobKind::Photos)
        .await
        .unwrap();

    assert!(report.cancelled);
    let photos = report.photos.unwrap();
    assert_eq!(photos.succeeded, 0);
    assert_eq!(photos.skipped, photos.total);
    assert!(!folders[2].join("thumb").exists());
}

/// Videos past the first `open` wait at the probe until the run is cancelled.
struct GatedFrames {
    open: usize,
    probes: AtomicUsize,
    cancel: CancelToken,
}

#[async_trait]
impl FrameSource for GatedFrames {
    async fn probe(&self, _path: &Path) -> PipelineResult<VideoInfo> {
        if self.probes.fetch_add(1, Ordering::SeqCst) >= self.open {
            let deadline = Instant::now() + Duration::from_secs(5);
            while !self.cancel.is_cancelled() && Instant::now() < deadline {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }
        Ok(VideoInfo {
            duration: 8.0,
            width: 32,
            height: 18,
        })
    }

    async fn frame_at(&self, _path: &Path, timestamp: f64, _max: u32) -> PipelineResult<DynamicImage> {
        let shade = (timestamp * 20.0) as u8;
        Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            32,
            18,
            Rgb([shade, shade, shade]),
        )))
    }
}

#[tokio::test]
async fn cancelling_after_k_completions_skips_the_rest() {
    let root = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    for (folder, count) in [("day1", 10), ("day2", 4)] {
        fs::create_dir_all(root.path().join(folder)).unwrap();
        for i in 0..count {
            fs::write(root.path().join(format!("{folder}/clip{i:02}.mp4")), b"fake").unwrap();
        }
    }

    let k = 3;
    let concurrency = 3;
    let cancel = CancelToken::new();
    let frames = Arc::new(GatedFrames {
        open: k,
        probes: AtomicUsize::new(0),
        cancel: cancel.clone(),
    });

    let (handle, mut snapshots, aggregator) = ProgressAggregator::spawn();
    let on_progress = cancel.clone();
    let watcher = tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            if snapshots.borrow().progress.completed >= k as u64 {
                on_progress.cancel();
                break;
            }
        }
    });

    let mut settings = settings(scratch.path());
    settings.concurrency = Some(concurrency);
    let job = Job::new(settings, cancel)
        .with_frame_source(frames)
        .with_progress(handle);
    let report = job
        .run(&[root.path().to_path_buf()], JobKind::Videos)
        .await
        .unwrap();
    drop(job);
    let progress = aggregator.await.unwrap();
    watcher.await.unwrap();

    assert!(report.cancelled);
    let videos = report.videos.unwrap();
    let done = videos.succeeded + videos.failed;
    assert_eq!(videos.total, 14);
    assert!(done >= k && done <= k + concurrency, "{done} finished");
    assert_eq!(videos.skipped, videos.total - done);
    assert_eq!(videos.succeeded + videos.failed + videos.skipped, videos.total);
    assert!(!root.path().join("day2/thumb").exists());
    assert_eq!(progress.completed, progress.known);
}

#[tokio::test]
async fn trim_leaving_too_little_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let video = dir.path().join("clip.mp4");
    fs::write(&video, b"twelve seconds of video").unwrap();
    let scratch = ScratchArea::new(&dir.path().join("scratch")).unwrap();

    let trimmer = Trimmer::new(PathBuf::from("ffmpeg"), 3.0);
    let err = trimmer
        .trim(
            &video,
            12.0,
            TrimRequest {
                start: Some(10.0),
                end: None,
            },
            &scratch,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Trim { .. }));
    assert!(!dir.path().join("clip_trimmed.mp4").exists());
}
