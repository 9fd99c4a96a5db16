//! The `thumbsheet run` command.

mod report;
pub mod types;

use clap::Args;
use std::path::PathBuf;
use thumbsheet_core::{CancelToken, Config, Job, ProgressAggregator};

use types::{Fit, Format, Kind};

/// Arguments for the `run` command.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Folders to process
    #[arg(required = true)]
    pub roots: Vec<PathBuf>,

    /// Content to process
    #[arg(long, value_enum, default_value = "auto")]
    pub kind: Kind,

    /// Thumbnail height in pixels
    #[arg(long)]
    pub height: Option<u32>,

    /// Output format for thumbnails and sheets
    #[arg(long, value_enum)]
    pub format: Option<Format>,

    /// Encoder quality, 0.0 to 1.0
    #[arg(long)]
    pub quality: Option<f32>,

    /// Contact sheet columns
    #[arg(long)]
    pub columns: Option<u32>,

    /// Frames per contact sheet (3-40)
    #[arg(long)]
    pub tiles: Option<u32>,

    /// Seconds skipped at the start of each video
    #[arg(long)]
    pub skip_first: Option<f64>,

    /// How frames fill their cells
    #[arg(long, value_enum)]
    pub fit: Option<Fit>,

    /// Side-by-side stereo sources: keep only the left eye
    #[arg(long)]
    pub vr: bool,

    /// Number of parallel workers (default: from cores and memory)
    #[arg(short, long, env = "THUMBSHEET_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Print the report as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    /// Fold command-line overrides into `config`.
    fn apply(&self, config: &mut Config) {
        if let Some(height) = self.height {
            config.thumbnail.height = height;
        }
        if let Some(format) = self.format {
            config.thumbnail.format = format.into();
        }
        if let Some(quality) = self.quality {
            config.thumbnail.quality = quality;
        }
        if let Some(columns) = self.columns {
            config.sheet.columns = columns;
        }
        if let Some(tiles) = self.tiles {
            config.sheet.tiles = tiles;
        }
        if let Some(skip) = self.skip_first {
            config.sheet.skip_first_secs = skip;
        }
        if let Some(fit) = self.fit {
            config.sheet.fit = fit.into();
        }
        if self.vr {
            config.sheet.stereo_left_half = true;
        }
        if self.concurrency.is_some() {
            config.processing.concurrency = self.concurrency;
        }
    }
}

/// Execute the run command.
pub async fn execute(args: RunArgs, mut config: Config) -> anyhow::Result<()> {
    args.apply(&mut config);
    let settings = config.snapshot()?;
    let roots = super::resolve_roots(&args.roots)?;

    let cancel = CancelToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted: finishing in-flight items, skipping the rest");
            on_signal.cancel();
        }
    });

    let (progress, snapshots, aggregator) = ProgressAggregator::spawn();
    let job = Job::new(settings, cancel).with_progress(progress);
    tracing::info!(
        "Processing {} root(s) with {} worker(s)",
        roots.len(),
        job.concurrency()
    );

    let pb = report::create_progress_bar();
    let follower = tokio::spawn(report::follow(pb.clone(), snapshots));

    let result = job.run(&roots, args.kind.into()).await;
    // Dropping the job releases the last progress handle.
    drop(job);
    let progress = aggregator.await?;
    follower.await?;
    pb.finish_and_clear();

    let report = result?;
    tracing::debug!("Completed {} of {} item(s)", progress.completed, progress.known);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report::print_summary(&report);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use thumbsheet_core::{FitPolicy, OutputFormat};

    #[test]
    fn test_apply_leaves_unset_values_alone() {
        let mut config = Config::default();
        RunArgs::default().apply(&mut config);
        assert_eq!(config.thumbnail.height, 512);
        assert_eq!(config.sheet.fit, FitPolicy::Pad);
        assert!(!config.sheet.stereo_left_half);
        assert_eq!(config.processing.concurrency, None);
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = Config::default();
        let args = RunArgs {
            height: Some(256),
            format: Some(Format::Heic),
            tiles: Some(12),
            fit: Some(Fit::Crop),
            vr: true,
            concurrency: Some(2),
            ..Default::default()
        };
        args.apply(&mut config);
        assert_eq!(config.thumbnail.height, 256);
        assert_eq!(config.thumbnail.format, OutputFormat::Heic);
        assert_eq!(config.sheet.tiles, 12);
        assert_eq!(config.sheet.fit, FitPolicy::Crop);
        assert!(config.sheet.stereo_left_half);
        assert_eq!(config.processing.concurrency, Some(2));
    }

    #[test]
    fn test_out_of_range_override_fails_snapshot() {
        let mut config = Config::default();
        let args = RunArgs {
            tiles: Some(99),
            ..Default::default()
        };
        args.apply(&mut config);
        assert!(config.snapshot().is_err());
    }
}
