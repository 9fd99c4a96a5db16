//! Thumbsheet Core - Embeddable thumbnail and contact-sheet pipeline.
//!
//! Thumbsheet walks folders of photos and videos and writes derived
//! artifacts next to them: a downsampled thumbnail per photo and a
//! contact-sheet grid per video, each in a `thumb/` subfolder of the leaf
//! folder that holds the source.
//!
//! # Architecture
//!
//! ```text
//! Classify → Scan leaf folders → Schedule → {Thumbnail | Sample frames → Compose} → Scratch → Move
//!                                     └──────────── progress events ───────────────┘
//! ```
//!
//! Per-item failures never abort a run; they are collected into a
//! [`BatchSummary`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use thumbsheet_core::{CancelToken, Config, Job, JobKind};
//!
//! #[tokio::main]
//! async fn main() -> thumbsheet_core::Result<()> {
//!     let settings = Config::load()?.snapshot()?;
//!     let job = Job::new(settings, CancelToken::new());
//!
//!     let report = job.run(&["/photos".into()], JobKind::Auto).await?;
//!     println!("{} succeeded", report.combined().succeeded);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod config;
pub mod error;
pub mod pipeline;
pub mod types;

// Re-exports for convenient access
pub use config::{Config, JobSettings};
pub use error::{ConfigError, PipelineError, PipelineResult, Result, ThumbsheetError};
pub use pipeline::{CancelToken, Job, JobKind, JobReport, ProgressAggregator, ProgressSnapshot};
pub use types::{
    BatchSummary, ContentType, FitPolicy, ItemOutcome, LeafFolder, OutputFormat, WorkItem,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
