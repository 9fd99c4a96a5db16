//! The `thumbsheet trim` command.

use clap::Args;
use console::style;
use std::path::PathBuf;
use thumbsheet_core::pipeline::{FfmpegFrameSource, FrameSource, ScratchArea, TrimRequest, Trimmer};
use thumbsheet_core::Config;

#[derive(Args, Debug)]
pub struct TrimArgs {
    /// Video to trim
    pub file: PathBuf,

    /// Seconds to cut from the start
    #[arg(long)]
    pub start: Option<f64>,

    /// Seconds to cut from the end
    #[arg(long)]
    pub end: Option<f64>,

    /// Print the outcome as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: TrimArgs, config: Config) -> anyhow::Result<()> {
    if !args.file.is_file() {
        anyhow::bail!("Video does not exist: {:?}", args.file);
    }
    let settings = config.snapshot()?;

    let info = FfmpegFrameSource::discover(&settings.tools)?
        .probe(&args.file)
        .await?;
    let trimmer = Trimmer::discover(&settings.tools)?;
    let scratch = ScratchArea::new(&settings.scratch_dir)?;

    let request = TrimRequest {
        start: args.start,
        end: args.end,
    };
    let outcome = trimmer
        .trim(&args.file, info.duration, request, &scratch)
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        eprintln!(
            "{} {} ({:.1} MB -> {:.1} MB)",
            style("Trimmed").green().bold(),
            outcome.output.display(),
            outcome.original_bytes as f64 / 1_000_000.0,
            outcome.new_bytes as f64 / 1_000_000.0
        );
    }
    Ok(())
}
