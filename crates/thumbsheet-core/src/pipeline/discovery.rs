//! Leaf folder discovery.
//!
//! A leaf folder is any directory that *directly* contains at least one file
//! with a target extension. Leafness is per folder: a folder and its
//! qualifying descendants are all reported.

use std::cmp::Ordering;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use super::scheduler::CancelToken;
use crate::types::{ContentType, LeafFolder};

/// Breadth-first scanner for leaf folders.
pub struct LeafScanner<'a> {
    extensions: &'a HashSet<String>,
    ignored_folder: &'a str,
    content: ContentType,
}

impl<'a> LeafScanner<'a> {
    pub fn new(
        extensions: &'a HashSet<String>,
        ignored_folder: &'a str,
        content: ContentType,
    ) -> Self {
        Self {
            extensions,
            ignored_folder,
            content,
        }
    }

    /// Scan every root and return leaf folders in natural path order.
    ///
    /// Folders that cannot be listed are skipped. Cancellation is checked
    /// before each folder is listed. `on_progress` receives the number of
    /// folders visited so far.
    pub fn scan(
        &self,
        roots: &[PathBuf],
        cancel: &CancelToken,
        on_progress: Option<&dyn Fn(usize)>,
    ) -> Vec<LeafFolder> {
        let mut queue: VecDeque<PathBuf> = roots.iter().cloned().collect();
        let mut leaves = Vec::new();
        let mut visited = 0usize;

        while let Some(folder) = queue.pop_front() {
            if cancel.is_cancelled() {
                tracing::debug!("Scan cancelled with {} folder(s) queued", queue.len() + 1);
                break;
            }
            visited += 1;
            if let Some(report) = on_progress {
                report(visited);
            }

            let entries = match std::fs::read_dir(&folder) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::debug!("Skipping unreadable folder {:?}: {}", folder, e);
                    continue;
                }
            };

            let mut subfolders = Vec::new();
            let mut is_leaf = false;
            for entry in entries.filter_map(|e| e.ok()) {
                let Ok(file_type) = entry.file_type() else {
                    continue;
                };
                let path = entry.path();
                if file_type.is_dir() {
                    if !is_ignored_dir(&path, self.ignored_folder) {
                        subfolders.push(path);
                    }
                } else if file_type.is_file() && !is_leaf && extension_in(&path, self.extensions) {
                    is_leaf = true;
                }
            }

            if is_leaf {
                leaves.push(LeafFolder {
                    path: folder,
                    content: self.content,
                });
            }
            subfolders.sort();
            queue.extend(subfolders);
        }

        leaves.sort_by(|a, b| natural_cmp(&a.path, &b.path));
        tracing::debug!(
            "Found {} {} leaf folder(s) in {} folder(s)",
            leaves.len(),
            self.content,
            visited
        );
        leaves
    }
}

/// Direct-child files of `folder` whose extension is in `extensions`, in
/// natural order.
pub fn media_files(folder: &Path, extensions: &HashSet<String>) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(folder)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.path())
        .filter(|p| extension_in(p, extensions))
        .collect();
    files.sort_by(|a, b| natural_cmp(a, b));
    Ok(files)
}

/// Whether the path's extension (case-insensitive) is in the set.
pub fn extension_in(path: &Path, extensions: &HashSet<String>) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.contains(&ext.to_lowercase()))
        .unwrap_or(false)
}

/// Whether a directory carries the derived-output folder name.
pub fn is_ignored_dir(path: &Path, ignored_folder: &str) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_lowercase() == ignored_folder.to_lowercase())
        .unwrap_or(false)
}

/// Natural path ordering: case-insensitive, with digit runs compared by
/// numeric value (`img2` < `img10`).
pub fn natural_cmp(a: &Path, b: &Path) -> Ordering {
    let a = a.to_string_lossy();
    let b = b.to_string_lossy();
    natural_str_cmp(&a, &b).then_with(|| a.cmp(&b))
}

fn natural_str_cmp(a: &str, b: &str) -> Ordering {
    let mut a = a.chars().peekable();
    let mut b = b.chars().peekable();

    loop {
        match (a.peek().copied(), b.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let left = take_digits(&mut a);
                let right = take_digits(&mut b);
                let left_trimmed = left.trim_start_matches('0');
                let right_trimmed = right.trim_start_matches('0');
                let ord = left_trimmed
                    .len()
                    .cmp(&right_trimmed.len())
                    .then_with(|| left_trimmed.cmp(right_trimmed))
                    .then_with(|| left.len().cmp(&right.len()));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                let ord = x.to_lowercase().cmp(y.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                a.next();
                b.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied().filter(|c| c.is_ascii_digit()) {
        digits.push(c);
        chars.next();
    }
    digits
}
