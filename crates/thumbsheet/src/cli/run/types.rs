//! CLI value enums, mapped onto the core types.

use clap::ValueEnum;
use thumbsheet_core::{FitPolicy, JobKind, OutputFormat};

/// Which content to process.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum Kind {
    /// Detect from the folder contents (both when mixed)
    #[default]
    Auto,
    Photos,
    Videos,
}

impl From<Kind> for JobKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Auto => JobKind::Auto,
            Kind::Photos => JobKind::Photos,
            Kind::Videos => JobKind::Videos,
        }
    }
}

/// Encoded output format.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Format {
    Jpeg,
    /// Needs a build with the `heif` feature
    Heic,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Jpeg => OutputFormat::Jpeg,
            Format::Heic => OutputFormat::Heic,
        }
    }
}

/// How frames fill contact-sheet cells.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Fit {
    /// Fill the cell exactly, distorting the frame
    Stretch,
    /// Keep the aspect ratio, show background around the frame
    Pad,
    /// Keep the aspect ratio, clip what overflows the cell
    Crop,
}

impl From<Fit> for FitPolicy {
    fn from(fit: Fit) -> Self {
        match fit {
            Fit::Stretch => FitPolicy::Stretch,
            Fit::Pad => FitPolicy::Pad,
            Fit::Crop => FitPolicy::Crop,
        }
    }
}
