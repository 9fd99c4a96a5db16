//! Bounded-concurrency work scheduler with cooperative cancellation.
//!
//! The scheduler keeps at most `limit` items in flight and starts the next
//! queued item as soon as any in-flight item finishes. It performs no I/O of
//! its own; completions are handed back to the caller one at a time, in
//! completion order, on the caller's task.

use futures_util::FutureExt;
use std::collections::BTreeSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;

const GIB: u64 = 1024 * 1024 * 1024;

/// Shared "is this run cancelled" flag.
///
/// Cloning is cheap; every clone observes the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Worker count for a machine with `cores` logical CPUs and
/// `available_memory` bytes free.
pub fn concurrency_for(cores: usize, available_memory: u64) -> usize {
    let limit = cores.saturating_sub(2).clamp(1, 6);
    if available_memory < 16 * GIB {
        limit.min(2)
    } else if available_memory < 32 * GIB {
        limit.min(4)
    } else {
        limit
    }
}

/// Worker count derived from this machine's cores and available memory.
pub fn default_concurrency() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let mut system = sysinfo::System::new();
    system.refresh_memory();
    let available = system.available_memory();
    let limit = concurrency_for(cores, available);
    tracing::debug!(
        "Concurrency limit {} ({} cores, {:.1} GiB available)",
        limit,
        cores,
        available as f64 / GIB as f64
    );
    limit
}

/// A worker panicked instead of producing an output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerPanic(pub String);

/// Counts describing how a scheduled run ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleReport {
    /// Items handed to a worker
    pub started: usize,
    /// Items whose worker finished (including panics)
    pub completed: usize,
    /// Items never started because cancellation was observed
    pub not_started: usize,
    /// Whether cancellation stopped dispatch early
    pub cancelled: bool,
}

/// Drives a pool of at most `limit` concurrent workers.
#[derive(Debug, Clone)]
pub struct Scheduler {
    limit: usize,
    cancel: CancelToken,
}

impl Scheduler {
    /// Create a scheduler. A limit of zero is treated as one.
    pub fn new(limit: usize, cancel: CancelToken) -> Self {
        Self {
            limit: limit.max(1),
            cancel,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run `process` over `items`, calling `on_complete(index, output)` for
    /// each finished item, where `index` is the item's position in `items`.
    ///
    /// Completion order is unordered. Cancellation is checked before each
    /// item starts; in-flight items always run to completion and are
    /// reported. A task that fails to join is reported as a
    /// [`WorkerPanic`] for its item once the pool has drained.
    pub async fn run<I, O, F, Fut, C>(
        &self,
        items: Vec<I>,
        process: F,
        mut on_complete: C,
    ) -> ScheduleReport
    where
        I: Send + 'static,
        O: Send + 'static,
        F: Fn(I) -> Fut,
        Fut: Future<Output = O> + Send + 'static,
        C: FnMut(usize, Result<O, WorkerPanic>),
    {
        let total = items.len();
        let mut queue = items.into_iter().enumerate();
        let mut in_flight: JoinSet<(usize, Result<O, WorkerPanic>)> = JoinSet::new();
        let mut unreported = BTreeSet::new();
        let mut join_errors = Vec::new();
        let mut report = ScheduleReport::default();

        loop {
            while in_flight.len() < self.limit && queue.len() > 0 {
                if self.cancel.is_cancelled() {
                    report.cancelled = true;
                    break;
                }
                let Some((index, item)) = queue.next() else {
                    break;
                };
                let fut = process(item);
                in_flight.spawn(async move {
                    let output = AssertUnwindSafe(fut)
                        .catch_unwind()
                        .await
                        .map_err(|payload| WorkerPanic(panic_message(payload.as_ref())));
                    (index, output)
                });
                unreported.insert(index);
                report.started += 1;
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };
            match joined {
                Ok((index, output)) => {
                    report.completed += 1;
                    unreported.remove(&index);
                    if let Err(WorkerPanic(msg)) = &output {
                        tracing::error!("Worker for item {index} panicked: {msg}");
                    }
                    on_complete(index, output);
                }
                // The task died outside the worker's own panic guard, so its
                // index is unknown until every other task has reported.
                Err(e) => {
                    tracing::error!("Worker task failed to join: {e}");
                    join_errors.push(e.to_string());
                }
            }
        }

        for (index, message) in unreported.into_iter().zip(join_errors) {
            report.completed += 1;
            on_complete(index, Err(WorkerPanic(format!("task failed to join: {message}"))));
        }

        report.not_started = total - report.started;
        if report.cancelled {
            tracing::info!(
                "Cancelled: {} started, {} not started",
                report.started,
                report.not_started
            );
        }
        report
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
