//! Media processing pipeline components.
//!
//! The stages, leaf-first:
//! - **classify**: Does a tree hold photos, videos, or both
//! - **discovery**: Find leaf folders and the media files in them
//! - **scheduler**: Bounded-concurrency worker pool with cancellation
//! - **decode** / **encode** / **thumbnail**: Per-photo thumbnails
//! - **compose**: Contact sheet grid layout
//! - **video**: Frame sampling and per-video contact sheets
//! - **writer**: Scratch-then-move output writes
//! - **progress**: Single-owner progress counters and heartbeats
//! - **tools** / **trim**: External tool discovery and video trimming
//! - **job**: Orchestrates the full run

pub mod classify;
pub mod compose;
pub mod decode;
pub mod discovery;
pub mod encode;
pub mod job;
pub mod progress;
pub mod scheduler;
pub mod thumbnail;
pub mod tools;
pub mod trim;
pub mod video;
pub mod writer;

// Re-exports for convenient access
pub use classify::{ContentClassifier, ContentSummary};
pub use compose::{compose, SheetGeometry, SheetLayout};
pub use discovery::{media_files, natural_cmp, LeafScanner};
pub use job::{Job, JobKind, JobReport};
pub use progress::{
    JobProgress, ProgressAggregator, ProgressEvent, ProgressHandle, ProgressSnapshot,
};
pub use scheduler::{default_concurrency, CancelToken, ScheduleReport, Scheduler};
pub use thumbnail::ImageThumbnailer;
pub use trim::{TrimOutcome, TrimRequest, Trimmer};
pub use video::{
    sample_timestamps, FfmpegFrameSource, Frame, FrameSampler, FrameSource, VideoInfo,
};
pub use writer::{MoveHandle, MoveQueue, ScratchArea};
