//! The `thumbsheet scan` command: print leaf folders, one per line.

use clap::{Args, ValueEnum};
use std::path::PathBuf;
use thumbsheet_core::{CancelToken, Config, ContentType, Job};

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum ScanKind {
    #[default]
    Photos,
    Videos,
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Folders to scan
    #[arg(required = true)]
    pub roots: Vec<PathBuf>,

    /// Which media makes a folder a leaf
    #[arg(long, value_enum, default_value = "photos")]
    pub kind: ScanKind,
}

pub async fn execute(args: ScanArgs, config: Config) -> anyhow::Result<()> {
    let roots = super::resolve_roots(&args.roots)?;
    let content = match args.kind {
        ScanKind::Photos => ContentType::Photo,
        ScanKind::Videos => ContentType::Video,
    };

    let job = Job::new(config.snapshot()?, CancelToken::new());
    let leaves = job.scan(&roots, content).await;
    for leaf in &leaves {
        println!("{}", leaf.path.display());
    }
    tracing::info!("{} {} folder(s)", leaves.len(), content);
    Ok(())
}
