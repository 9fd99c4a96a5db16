//! Atomic output writer.
//!
//! Encoded bytes are first written to a local scratch directory, then moved
//! into their final destination. A destination path therefore only ever
//! holds nothing, the previous complete file, or the new complete file.
//!
//! Moves are funnelled through a [`MoveQueue`] task that commits them in
//! small batches. Every move already queued is committed even after
//! cancellation; the scratch directory is removed when its [`ScratchArea`]
//! is dropped.

use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{PipelineError, PipelineResult};

/// Per-batch scratch directory, removed on drop.
#[derive(Debug)]
pub struct ScratchArea {
    dir: TempDir,
}

impl ScratchArea {
    /// Create a fresh scratch directory under `base`.
    pub fn new(base: &Path) -> PipelineResult<Self> {
        std::fs::create_dir_all(base).map_err(|e| PipelineError::DestinationSetup {
            path: base.to_path_buf(),
            message: format!("Cannot create scratch directory: {e}"),
        })?;
        let dir = tempfile::Builder::new()
            .prefix("batch-")
            .tempdir_in(base)
            .map_err(|e| PipelineError::DestinationSetup {
                path: base.to_path_buf(),
                message: format!("Cannot create scratch directory: {e}"),
            })?;
        tracing::debug!("Scratch area at {:?}", dir.path());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// A fully-written scratch file waiting to be moved to `destination`.
#[derive(Debug)]
pub struct StagedFile {
    pub scratch: PathBuf,
    pub destination: PathBuf,
    pub bytes: u64,
}

/// Write `bytes` to a new file in `scratch_dir`, destined for `destination`.
///
/// A failed write leaves nothing behind in the scratch directory.
pub fn stage(scratch_dir: &Path, bytes: &[u8], destination: &Path) -> PipelineResult<StagedFile> {
    let write_err = |e: std::io::Error| PipelineError::Write {
        path: destination.to_path_buf(),
        message: format!("Scratch write failed: {e}"),
    };

    let suffix = destination
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let mut file = tempfile::Builder::new()
        .prefix("out-")
        .suffix(&suffix)
        .tempfile_in(scratch_dir)
        .map_err(write_err)?;
    file.write_all(bytes).map_err(write_err)?;
    file.as_file().sync_all().map_err(write_err)?;
    let scratch = file
        .into_temp_path()
        .keep()
        .map_err(|e| write_err(e.error))?;

    Ok(StagedFile {
        scratch,
        destination: destination.to_path_buf(),
        bytes: bytes.len() as u64,
    })
}

/// Move a staged file into place, replacing any existing destination.
///
/// Falls back to copy-then-rename when the scratch directory and the
/// destination live on different filesystems.
pub fn commit(staged: &StagedFile) -> PipelineResult<u64> {
    let dest = &staged.destination;
    let move_err = |e: std::io::Error| PipelineError::Write {
        path: dest.clone(),
        message: e.to_string(),
    };

    if dest.exists() {
        std::fs::remove_file(dest).map_err(move_err)?;
    }

    if std::fs::rename(&staged.scratch, dest).is_err() {
        // Different filesystem: copy next to the destination, then rename
        // within the destination directory.
        let partial = partial_path(dest);
        let copied = std::fs::copy(&staged.scratch, &partial)
            .and_then(|_| std::fs::rename(&partial, dest));
        if let Err(e) = copied {
            let _ = std::fs::remove_file(&partial);
            return Err(move_err(e));
        }
        let _ = std::fs::remove_file(&staged.scratch);
    }

    Ok(staged.bytes)
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    dest.with_file_name(name)
}

struct MoveRequest {
    staged: StagedFile,
    reply: oneshot::Sender<PipelineResult<u64>>,
}

/// Cloneable handle used by workers to commit staged files.
#[derive(Debug, Clone)]
pub struct MoveHandle {
    tx: mpsc::UnboundedSender<MoveRequest>,
}

impl MoveHandle {
    /// Queue a staged file and wait until it has been moved into place.
    pub async fn commit(&self, staged: StagedFile) -> PipelineResult<u64> {
        let destination = staged.destination.clone();
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(MoveRequest { staged, reply })
            .map_err(|_| PipelineError::Write {
                path: destination.clone(),
                message: "Move queue closed".to_string(),
            })?;
        rx.await.unwrap_or_else(|_| {
            Err(PipelineError::Write {
                path: destination,
                message: "Move queue dropped the request".to_string(),
            })
        })
    }
}

/// Owns the batched move loop.
pub struct MoveQueue;

impl MoveQueue {
    /// Start a move queue committing up to `batch_size` files per batch.
    ///
    /// The task ends once every [`MoveHandle`] is dropped, after flushing
    /// whatever is still queued, and returns the number of files moved.
    pub fn spawn(batch_size: usize) -> (MoveHandle, JoinHandle<usize>) {
        let batch_size = batch_size.max(1);
        let (tx, mut rx) = mpsc::unbounded_channel::<MoveRequest>();

        let task = tokio::spawn(async move {
            let mut moved = 0usize;
            while let Some(first) = rx.recv().await {
                let mut batch = vec![first];
                while batch.len() < batch_size {
                    match rx.try_recv() {
                        Ok(request) => batch.push(request),
                        Err(_) => break,
                    }
                }

                let count = batch.len();
                let committed = tokio::task::spawn_blocking(move || {
                    batch
                        .into_iter()
                        .map(|r| {
                            let result = commit(&r.staged);
                            (r.reply, result)
                        })
                        .collect::<Vec<_>>()
                })
                .await;

                match committed {
                    Ok(results) => {
                        for (reply, result) in results {
                            if result.is_ok() {
                                moved += 1;
                            }
                            // The worker may have gone away; the file is in place regardless.
                            let _ = reply.send(result);
                        }
                    }
                    // Replies were dropped with the panicked closure; waiting
                    // workers see a closed channel and report a write failure.
                    Err(e) => tracing::error!("Move batch of {count} panicked: {e}"),
                }
                tracing::trace!("Committed move batch of {count}");
            }
            moved
        });

        (MoveHandle { tx }, task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_area_removed_on_drop() {
        let base = tempfile::tempdir().unwrap();
        let path = {
            let scratch = ScratchArea::new(base.path()).unwrap();
            stage(scratch.path(), b"abc", &base.path().join("x.jpg")).unwrap();
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_commit_replaces_existing_destination() {
        let base = tempfile::tempdir().unwrap();
        let scratch = ScratchArea::new(&base.path().join("scratch")).unwrap();
        let dest = base.path().join("out.jpg");
        std::fs::write(&dest, b"old").unwrap();

        let staged = stage(scratch.path(), b"new contents", &dest).unwrap();
        assert_eq!(commit(&staged).unwrap(), 12);
        assert_eq!(std::fs::read(&dest).unwrap(), b"new contents");
        assert!(!staged.scratch.exists());
    }

    #[test]
    fn test_commit_into_missing_directory_fails() {
        let base = tempfile::tempdir().unwrap();
        let scratch = ScratchArea::new(&base.path().join("scratch")).unwrap();
        let dest = base.path().join("missing/out.jpg");
        let staged = stage(scratch.path(), b"x", &dest).unwrap();
        let err = commit(&staged).unwrap_err();
        assert!(matches!(err, PipelineError::Write { .. }));
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
    }

    #[test]
    fn test_stage_keeps_extension() {
        let base = tempfile::tempdir().unwrap();
        let staged = stage(base.path(), b"x", Path::new("/somewhere/a.heic")).unwrap();
        assert_eq!(staged.scratch.extension().unwrap(), "heic");
        assert_eq!(staged.bytes, 1);
    }

    #[tokio::test]
    async fn test_move_queue_commits_everything() {
        let base = tempfile::tempdir().unwrap();
        let scratch = ScratchArea::new(&base.path().join("scratch")).unwrap();
        let out = base.path().join("out");
        std::fs::create_dir(&out).unwrap();

        let (handle, task) = MoveQueue::spawn(5);
        let mut waits = Vec::new();
        for i in 0..12 {
            let staged = stage(
                scratch.path(),
                format!("file {i}").as_bytes(),
                &out.join(format!("{i}.jpg")),
            )
            .unwrap();
            let h = handle.clone();
            waits.push(tokio::spawn(async move { h.commit(staged).await }));
        }
        for w in waits {
            w.await.unwrap().unwrap();
        }
        drop(handle);
        assert_eq!(task.await.unwrap(), 12);

        for i in 0..12 {
            let body = std::fs::read_to_string(out.join(format!("{i}.jpg"))).unwrap();
            assert_eq!(body, format!("file {i}"));
        }
    }
}
