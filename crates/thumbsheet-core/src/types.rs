//! Core data types shared by the pipeline stages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which kind of media a leaf folder (and a job) deals with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Photo,
    Video,
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentType::Photo => write!(f, "photo"),
            ContentType::Video => write!(f, "video"),
        }
    }
}

/// Encoded output format for thumbnails and contact sheets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Heic,
}

impl OutputFormat {
    /// File extension used for outputs in this format.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Heic => "heic",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Jpeg => write!(f, "jpeg"),
            OutputFormat::Heic => write!(f, "heic"),
        }
    }
}

/// How a tile is fitted into its contact-sheet cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitPolicy {
    /// Resample to exactly fill the cell, ignoring aspect ratio
    Stretch,
    /// Aspect-fit: whole tile visible, background shows in the border
    #[default]
    Pad,
    /// Aspect-fill: cell fully covered, overflow clipped
    Crop,
}

/// A directory that directly contains at least one file of its content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafFolder {
    /// Absolute path of the folder
    pub path: PathBuf,
    /// Content type the folder was discovered for
    pub content: ContentType,
}

/// One unit of processing: a source file and where its output goes.
///
/// Format and quality are read from the job's settings snapshot, never from
/// live configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Position in the folder's submission order
    pub index: usize,
    /// Source media file
    pub source: PathBuf,
    /// Final output path (`<output-dir>/<stem>.<ext>`)
    pub destination: PathBuf,
}

impl WorkItem {
    /// Build a work item whose output name is derived 1:1 from the source stem.
    pub fn new(index: usize, source: PathBuf, output_dir: &Path, format: OutputFormat) -> Self {
        let destination = output_path_for(&source, output_dir, format);
        Self {
            index,
            source,
            destination,
        }
    }
}

/// Output path for a source file: `<output-dir>/<stem>.<jpg|heic>`.
pub fn output_path_for(source: &Path, output_dir: &Path, format: OutputFormat) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output_dir.join(format!("{stem}.{}", format.extension()))
}

/// Outcome of processing a single work item.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    /// A complete, validly-encoded output exists at `output`
    Success {
        source: PathBuf,
        output: PathBuf,
        source_bytes: u64,
        output_bytes: u64,
        elapsed: Duration,
        /// True when the output already existed and nothing was re-encoded
        reused: bool,
    },
    /// The item could not be processed
    Failure { source: PathBuf, message: String },
    /// The source or requested format is not supported
    Unsupported { source: PathBuf, message: String },
    /// Cancellation was observed mid-item; nothing was written
    Cancelled { source: PathBuf },
}

impl ItemOutcome {
    /// Source path this outcome refers to.
    pub fn source(&self) -> &Path {
        match self {
            ItemOutcome::Success { source, .. }
            | ItemOutcome::Failure { source, .. }
            | ItemOutcome::Unsupported { source, .. }
            | ItemOutcome::Cancelled { source } => source,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ItemOutcome::Success { .. })
    }
}

/// Totals for a batch, sufficient to render a summary without re-scanning.
///
/// `succeeded + failed + skipped == total` always holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Sorted list of sources that failed
    pub failed_paths: Vec<PathBuf>,
    /// Bytes written to destinations by successful items
    pub output_bytes: u64,
    /// Wall-clock duration of the batch
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
    /// Whether cancellation stopped the batch early
    pub cancelled: bool,
}

impl BatchSummary {
    /// Record one item outcome.
    pub fn record(&mut self, outcome: &ItemOutcome) {
        self.total += 1;
        match outcome {
            ItemOutcome::Success { output_bytes, .. } => {
                self.succeeded += 1;
                self.output_bytes += output_bytes;
            }
            ItemOutcome::Failure { source, .. } => {
                self.failed += 1;
                self.failed_paths.push(source.clone());
            }
            ItemOutcome::Unsupported { .. } | ItemOutcome::Cancelled { .. } => self.skipped += 1,
        }
    }

    /// Count items that were never attempted (folder setup failure, cancellation).
    pub fn record_skipped(&mut self, count: usize) {
        self.total += count;
        self.skipped += count;
    }

    /// Fold another summary into this one.
    pub fn merge(&mut self, other: BatchSummary) {
        self.total += other.total;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.failed_paths.extend(other.failed_paths);
        self.output_bytes += other.output_bytes;
        self.cancelled |= other.cancelled;
    }

    /// Sort the failure list so reports are stable.
    pub fn finalize(&mut self, elapsed: Duration) {
        self.failed_paths.sort();
        self.elapsed = elapsed;
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}
