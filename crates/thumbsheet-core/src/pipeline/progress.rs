//! Single-owner progress aggregation.
//!
//! A dedicated task owns the counters. Workers and the discovery phase only
//! send [`ProgressEvent`]s through a [`ProgressHandle`]; observers read
//! [`ProgressSnapshot`]s from a watch channel. Nothing else touches the
//! counters, so a snapshot is never torn or double-counted.

use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Heartbeats start only after this much elapsed time.
const HEARTBEAT_WARMUP: Duration = Duration::from_secs(5);
/// Minimum spacing between two heartbeats.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Messages accepted by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    /// The known total grew by this many items
    Discovered(u64),
    /// One item finished, successfully or not
    Completed,
    /// Discovery is over; the known total is frozen from now on
    DiscoveryFinished,
}

/// `(completed, known)` counters for a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobProgress {
    pub completed: u64,
    pub known: u64,
}

impl JobProgress {
    /// Progress as a fraction in `0.0..=1.0`.
    pub fn fraction(&self) -> f64 {
        (self.completed as f64 / self.known.max(1) as f64).min(1.0)
    }
}

/// What observers see.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressSnapshot {
    pub progress: JobProgress,
    pub fraction: f64,
    /// Latest heartbeat line, if one has been produced
    pub heartbeat: Option<String>,
    /// Whether the known total is frozen
    pub discovery_finished: bool,
}

/// Cloneable sender used by every component that reports progress.
#[derive(Debug, Clone)]
pub struct ProgressHandle {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressHandle {
    pub fn discovered(&self, count: u64) {
        if count > 0 {
            self.send(ProgressEvent::Discovered(count));
        }
    }

    pub fn completed(&self) {
        self.send(ProgressEvent::Completed);
    }

    pub fn discovery_finished(&self) {
        self.send(ProgressEvent::DiscoveryFinished);
    }

    fn send(&self, event: ProgressEvent) {
        // The aggregator outlives every handle unless the job is torn down.
        if self.tx.send(event).is_err() {
            tracing::trace!("Progress aggregator gone, dropping {:?}", event);
        }
    }
}

/// Pure counter state machine owned by the aggregator task.
#[derive(Debug, Default)]
struct Counters {
    progress: JobProgress,
    frozen: bool,
}

impl Counters {
    fn apply(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::Discovered(n) => {
                if self.frozen {
                    tracing::warn!("Ignoring {n} items discovered after discovery finished");
                } else {
                    self.progress.known += n;
                }
            }
            ProgressEvent::Completed => {
                if !self.frozen {
                    // Completions can race ahead of the discovery message
                    // that announced them.
                    self.progress.completed += 1;
                    self.progress.known = self.progress.known.max(self.progress.completed);
                } else if self.progress.completed < self.progress.known {
                    self.progress.completed += 1;
                } else {
                    tracing::warn!("Ignoring a completion beyond the frozen total");
                }
            }
            ProgressEvent::DiscoveryFinished => self.frozen = true,
        }
    }
}

/// Rate-based heartbeat timer.
#[derive(Debug)]
pub struct HeartbeatClock {
    started: Instant,
    last: Option<Instant>,
}

impl HeartbeatClock {
    pub fn new(started: Instant) -> Self {
        Self {
            started,
            last: None,
        }
    }

    /// Produce a heartbeat line if one is due at `now`.
    pub fn poll(&mut self, now: Instant, progress: JobProgress) -> Option<String> {
        let elapsed = now.saturating_duration_since(self.started);
        if elapsed < HEARTBEAT_WARMUP {
            return None;
        }
        if let Some(last) = self.last {
            if now.saturating_duration_since(last) < HEARTBEAT_INTERVAL {
                return None;
            }
        }
        self.last = Some(now);
        Some(heartbeat_message(progress, elapsed))
    }
}

fn heartbeat_message(progress: JobProgress, elapsed: Duration) -> String {
    let percent = progress.fraction() * 100.0;
    let eta = if progress.completed == 0 {
        "unknown".to_string()
    } else {
        let per_item = elapsed.as_secs_f64() / progress.completed as f64;
        let remaining = progress.known.saturating_sub(progress.completed) as f64 * per_item;
        format_duration(Duration::from_secs_f64(remaining))
    };
    format!(
        "Processed {}/{} ({percent:.0}%) in {}, ETA {eta}",
        progress.completed,
        progress.known,
        format_duration(elapsed)
    )
}

/// Format a duration as `1h02m03s`, `2m05s` or `7s`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h{m:02}m{s:02}s")
    } else if m > 0 {
        format!("{m}m{s:02}s")
    } else {
        format!("{s}s")
    }
}

/// Spawns and owns the aggregator task.
pub struct ProgressAggregator;

impl ProgressAggregator {
    /// Start the aggregator.
    ///
    /// The task ends once every [`ProgressHandle`] has been dropped and
    /// returns the final counters.
    pub fn spawn() -> (
        ProgressHandle,
        watch::Receiver<ProgressSnapshot>,
        JoinHandle<JobProgress>,
    ) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(ProgressSnapshot::default());

        let task = tokio::spawn(async move {
            let mut counters = Counters::default();
            let mut clock = HeartbeatClock::new(Instant::now());
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    event = rx.recv() => {
                        let Some(event) = event else { break };
                        counters.apply(event);
                        snapshot_tx.send_modify(|s| {
                            s.progress = counters.progress;
                            s.fraction = counters.progress.fraction();
                            s.discovery_finished = counters.frozen;
                        });
                    }
                    _ = ticker.tick() => {
                        if let Some(line) = clock.poll(Instant::now(), counters.progress) {
                            tracing::info!("{line}");
                            snapshot_tx.send_modify(|s| s.heartbeat = Some(line));
                        }
                    }
                }
            }
            counters.progress
        });

        (ProgressHandle { tx }, snapshot_rx, task)
    }
}
