//! The `thumbsheet classify` command.

use clap::Args;
use std::path::PathBuf;
use thumbsheet_core::{CancelToken, Config, Job};

#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Folders to classify
    #[arg(required = true)]
    pub roots: Vec<PathBuf>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: ClassifyArgs, config: Config) -> anyhow::Result<()> {
    let roots = super::resolve_roots(&args.roots)?;
    let job = Job::new(config.snapshot()?, CancelToken::new());
    let summary = job.classify(&roots).await;

    if args.json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        println!("hasPhotos: {}", summary.has_photos);
        println!("hasVideos: {}", summary.has_videos);
    }
    Ok(())
}
