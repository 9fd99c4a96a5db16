//! Progress bar and end-of-run summary.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use thumbsheet_core::{BatchSummary, JobReport, ProgressSnapshot};
use tokio::sync::watch;

/// A bar that starts as a spinner until the total is known.
pub fn create_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    );
    pb.set_message("discovering...");
    pb
}

/// Mirror snapshots onto `pb` until the aggregator stops publishing.
pub async fn follow(pb: ProgressBar, mut snapshots: watch::Receiver<ProgressSnapshot>) {
    while snapshots.changed().await.is_ok() {
        let snapshot = snapshots.borrow_and_update().clone();
        pb.set_length(snapshot.progress.known);
        pb.set_position(snapshot.progress.completed);
        if snapshot.discovery_finished {
            pb.set_message("");
        }
    }
}

/// Print the per-content summary table to stderr.
pub fn print_summary(report: &JobReport) {
    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Leaf folders: {:>8}", report.leaf_folders);
    if let Some(photos) = &report.photos {
        print_section("Photos", photos);
    }
    if let Some(videos) = &report.videos {
        print_section("Videos", videos);
    }
    let combined = report.combined();
    eprintln!("  ------------------------------------");
    eprintln!("    Total:        {:>8}", combined.total);
    eprintln!("    Written:      {:>7.1} MB", combined.output_bytes as f64 / 1_000_000.0);
    eprintln!("    Duration:     {:>7.1}s", combined.elapsed.as_secs_f64());
    eprintln!("  ====================================");

    if report.cancelled {
        eprintln!("  {}", style("Cancelled: remaining items were skipped").yellow());
    }
    if !combined.failed_paths.is_empty() {
        eprintln!();
        eprintln!("  {}", style("Failed:").red().bold());
        for path in &combined.failed_paths {
            eprintln!("    {}", path.display());
        }
    }
}

fn print_section(label: &str, summary: &BatchSummary) {
    eprintln!("  {}", style(label).bold());
    eprintln!("    Succeeded:    {:>8}", style(summary.succeeded).green());
    if summary.failed > 0 {
        eprintln!("    Failed:       {:>8}", style(summary.failed).red());
    }
    if summary.skipped > 0 {
        eprintln!("    Skipped:      {:>8}", style(summary.skipped).yellow());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thumbsheet_core::pipeline::ProgressAggregator;

    #[tokio::test]
    async fn test_bar_tracks_final_snapshot() {
        let (handle, snapshots, task) = ProgressAggregator::spawn();
        let pb = ProgressBar::hidden();
        let follower = tokio::spawn(follow(pb.clone(), snapshots));

        handle.discovered(3);
        handle.discovery_finished();
        handle.completed();
        handle.completed();
        drop(handle);

        let progress = task.await.unwrap();
        follower.await.unwrap();
        assert_eq!(progress.completed, 2);
        assert_eq!(pb.length(), Some(3));
        assert_eq!(pb.position(), 2);
    }
}
