//! Content classification: does a set of roots hold photos, videos, or both?

use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::discovery::{extension_in, is_ignored_dir};
use super::scheduler::CancelToken;

/// How often (in entries) cancellation is re-checked while walking a root.
const CANCEL_CHECK_EVERY: usize = 256;

/// Result of classifying a set of roots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSummary {
    pub has_photos: bool,
    pub has_videos: bool,
}

impl ContentSummary {
    pub fn is_mixed(&self) -> bool {
        self.has_photos && self.has_videos
    }

    pub fn is_empty(&self) -> bool {
        !self.has_photos && !self.has_videos
    }
}

/// Classifies a tree by sampling file extensions.
pub struct ContentClassifier<'a> {
    photo_extensions: &'a HashSet<String>,
    video_extensions: &'a HashSet<String>,
    ignored_folder: &'a str,
}

impl<'a> ContentClassifier<'a> {
    pub fn new(
        photo_extensions: &'a HashSet<String>,
        video_extensions: &'a HashSet<String>,
        ignored_folder: &'a str,
    ) -> Self {
        Self {
            photo_extensions,
            video_extensions,
            ignored_folder,
        }
    }

    /// Walk every root and report which media types appear.
    ///
    /// Stops as soon as both a photo and a video have been seen anywhere in
    /// the scan. Unreadable entries are skipped. `on_progress` receives the
    /// number of entries inspected so far.
    pub fn classify(
        &self,
        roots: &[PathBuf],
        cancel: &CancelToken,
        on_progress: Option<&dyn Fn(usize)>,
    ) -> ContentSummary {
        let mut summary = ContentSummary::default();
        let mut inspected = 0usize;

        for root in roots {
            if cancel.is_cancelled() || summary.is_mixed() {
                break;
            }
            self.classify_root(root, cancel, &mut summary, &mut inspected, on_progress);
        }

        tracing::debug!(
            "Classified {} root(s): photos={}, videos={} ({} entries)",
            roots.len(),
            summary.has_photos,
            summary.has_videos,
            inspected
        );
        summary
    }

    fn classify_root(
        &self,
        root: &Path,
        cancel: &CancelToken,
        summary: &mut ContentSummary,
        inspected: &mut usize,
        on_progress: Option<&dyn Fn(usize)>,
    ) {
        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0
                    || !e.file_type().is_dir()
                    || !is_ignored_dir(e.path(), self.ignored_folder)
            })
            .filter_map(|e| e.ok());

        for entry in walker {
            *inspected += 1;
            if *inspected % CANCEL_CHECK_EVERY == 0 {
                if let Some(report) = on_progress {
                    report(*inspected);
                }
                if cancel.is_cancelled() {
                    return;
                }
            }
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if !summary.has_photos && extension_in(path, self.photo_extensions) {
                summary.has_photos = true;
            } else if !summary.has_videos && extension_in(path, self.video_extensions) {
                summary.has_videos = true;
            }
            if summary.is_mixed() {
                return;
            }
        }
    }
}
