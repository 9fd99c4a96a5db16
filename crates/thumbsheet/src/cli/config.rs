//! The `thumbsheet config` command.

use clap::{Args, Subcommand};
use console::style;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use thumbsheet_core::pipeline::default_concurrency;
use thumbsheet_core::{Config, JobSettings};

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the settings a run would use, after validation
    Show {
        /// Print the config file's TOML instead
        #[arg(long)]
        raw: bool,
    },

    /// Show config file path
    Path,

    /// Validate a config file (default: the standard location)
    Check {
        file: Option<PathBuf>,
    },

    /// Write a config file with defaults
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

pub async fn execute(args: ConfigArgs) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show { raw } => {
            let config = Config::load()?;
            if raw {
                println!("{}", config.to_toml()?);
            } else {
                print!("{}", describe(&config.snapshot()?));
            }
        }

        ConfigCommand::Path => {
            println!("{}", Config::default_path().display());
        }

        ConfigCommand::Check { file } => {
            let path = file.unwrap_or_else(Config::default_path);
            let settings = check(&path)?;
            eprintln!("{} {}", style("Valid").green().bold(), path.display());
            tracing::debug!("Resolved settings: {settings:?}");
        }

        ConfigCommand::Init { force } => {
            let path = Config::default_path();
            init_at(&path, force)?;
            tracing::info!("Config file created at: {}", path.display());
            println!("Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

/// Load and validate the file at `path`, returning the settings a job would get.
fn check(path: &Path) -> anyhow::Result<JobSettings> {
    if !path.is_file() {
        anyhow::bail!("No config file at {}", path.display());
    }
    let config = Config::load_from(path)?;
    Ok(config.snapshot()?)
}

/// Write the default config to `path`, then read it back through validation.
fn init_at(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists at: {}\nUse --force to overwrite.",
            path.display()
        );
    }
    let config = Config::default();
    config.validate()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, config.to_toml()?)?;
    check(path)?;
    Ok(())
}

/// Human-readable listing of a settings snapshot.
fn describe(settings: &JobSettings) -> String {
    let concurrency = match settings.concurrency {
        Some(n) => n.to_string(),
        None => format!("{} (auto)", default_concurrency()),
    };
    let thumb = &settings.thumbnail;
    let sheet = &settings.sheet;

    let mut out = String::new();
    let _ = writeln!(out, "output folder:    {}", settings.output_folder);
    let _ = writeln!(out, "scratch dir:      {}", settings.scratch_dir.display());
    let _ = writeln!(out, "photo extensions: {}", sorted(&settings.photo_extensions));
    let _ = writeln!(out, "video extensions: {}", sorted(&settings.video_extensions));
    let _ = writeln!(out, "concurrency:      {concurrency}");
    let _ = writeln!(
        out,
        "thumbnails:       {}px high, {} at quality {:.2}, sources up to {}px, {}ms each",
        thumb.height, thumb.format, thumb.quality, thumb.max_image_dimension, thumb.decode_timeout_ms
    );
    let _ = writeln!(
        out,
        "contact sheets:   {} tiles in {} columns, {}px cells, {}px spacing, {:?} fit",
        sheet.tiles, sheet.columns, sheet.cell_height, sheet.spacing, sheet.fit
    );
    let _ = writeln!(out, "move batch size:  {}", settings.move_batch_size);
    out
}

fn sorted(set: &HashSet<String>) -> String {
    let mut items: Vec<&str> = set.iter().map(String::as_str).collect();
    items.sort_unstable();
    items.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_a_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");
        init_at(&path, false).unwrap();
        let settings = check(&path).unwrap();
        assert_eq!(settings.output_folder, "thumb");
    }

    #[test]
    fn test_init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "# mine\n").unwrap();

        let err = init_at(&path, false).unwrap_err();
        assert!(err.to_string().contains("--force"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# mine\n");

        init_at(&path, true).unwrap();
        assert!(check(&path).is_ok());
    }

    #[test]
    fn test_check_rejects_out_of_range_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[sheet]\ncolumns = 0\n").unwrap();
        let err = check(&path).unwrap_err();
        assert!(err.to_string().contains("columns"), "{err}");

        assert!(check(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_describe_lists_resolved_settings() {
        let mut settings = JobSettings::default();
        settings.concurrency = Some(3);
        let text = describe(&settings);
        assert!(text.contains("concurrency:      3\n"));
        assert!(text.contains("output folder:    thumb"));
        let photos = text
            .lines()
            .find(|l| l.starts_with("photo extensions"))
            .unwrap();
        assert!(photos.contains("jpg"));
        let listed: Vec<&str> = photos.split(": ").nth(1).unwrap().trim().split(", ").collect();
        let mut expected = listed.clone();
        expected.sort_unstable();
        assert_eq!(listed, expected);
    }
}
