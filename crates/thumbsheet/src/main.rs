//! Thumbsheet CLI - thumbnails for photo folders, contact sheets for video folders.
//!
//! Every leaf folder that directly holds photos or videos gets a `thumb/`
//! subfolder with one derived image per source.
//!
//! # Usage
//!
//! ```bash
//! # Process a tree (photos, videos or both)
//! thumbsheet run ~/Pictures/2024
//!
//! # See which folders would be processed
//! thumbsheet scan ~/Pictures/2024 --kind videos
//!
//! # Cut the first 5 seconds off a clip
//! thumbsheet trim clip.mp4 --start 5
//!
//! # View the resolved settings, or validate an edited file
//! thumbsheet config show
//! thumbsheet config check ~/.config/thumbsheet/config.toml
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Thumbsheet - thumbnails and contact sheets for media folders.
#[derive(Parser, Debug)]
#[command(name = "thumbsheet")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate thumbnails and contact sheets under one or more roots
    Run(cli::run::RunArgs),

    /// List the leaf folders a run would process
    Scan(cli::scan::ScanArgs),

    /// Report whether roots contain photos, videos, or both
    Classify(cli::classify::ClassifyArgs),

    /// Cut seconds off the start and/or end of a video
    Trim(cli::trim::TrimArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = match thumbsheet_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `thumbsheet config path`."
            );
            thumbsheet_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Thumbsheet v{}", thumbsheet_core::VERSION);

    match cli.command {
        Commands::Run(args) => cli::run::execute(args, config).await,
        Commands::Scan(args) => cli::scan::execute(args, config).await,
        Commands::Classify(args) => cli::classify::execute(args, config).await,
        Commands::Trim(args) => cli::trim::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
