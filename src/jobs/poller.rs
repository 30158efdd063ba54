//! Periodic job status polling
//!
//! The poller runs one status sweep, then sleeps for the configured interval,
//! then sweeps again. The next sleep only starts once a sweep has finished, so
//! a slow sweep delays the next one instead of overlapping it.
//!
//! Stopping is signalled over a `watch` channel. A sweep that is already in
//! flight runs to completion; no further sweep is scheduled after it. A
//! restarted loop waits for the loops it replaces before sweeping.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use super::client::fetch_status;
use super::gateway::Outbox;
use super::messages::OutboundMessage;
use super::registry::JobRegistry;
use super::state::StatusSnapshot;

/// Default time between two sweeps
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// A running loop task and its shutdown signal
struct LoopHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct LoopSlots {
    /// Loop that schedules further sweeps
    active: Option<LoopHandle>,

    /// Stopped loops that may still be finishing a sweep
    draining: Vec<JoinHandle<()>>,
}

/// Background status poller
pub struct StatusPoller {
    registry: Arc<JobRegistry>,
    outbox: Arc<Outbox>,
    interval: Duration,
    slots: Mutex<LoopSlots>,
}

impl StatusPoller {
    /// Create a stopped poller
    pub fn new(registry: Arc<JobRegistry>, outbox: Arc<Outbox>, interval: Duration) -> Self {
        Self {
            registry,
            outbox,
            interval,
            slots: Mutex::new(LoopSlots::default()),
        }
    }

    /// Time between two sweeps
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start the poll loop, replacing any loop that is already running
    ///
    /// Returns without waiting. The new loop awaits every previous loop before
    /// its first sweep, so two loops never sweep at the same time.
    pub async fn start(&self) {
        let mut slots = self.slots.lock().await;

        if let Some(previous) = slots.active.take() {
            let _ = previous.shutdown.send(true);
            slots.draining.push(previous.task);
        }
        let predecessors: Vec<JoinHandle<()>> = slots.draining.drain(..).collect();

        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_loop(
            self.registry.clone(),
            self.outbox.clone(),
            self.interval,
            shutdown_rx,
            predecessors,
        ));

        slots.active = Some(LoopHandle { shutdown, task });
        tracing::info!(interval_secs = self.interval.as_secs_f64(), "Status poll loop started");
    }

    /// Stop scheduling sweeps
    ///
    /// Returns without waiting for a sweep that is already running.
    pub async fn stop(&self) {
        let mut slots = self.slots.lock().await;
        slots.draining.retain(|task| !task.is_finished());

        if let Some(handle) = slots.active.take() {
            let _ = handle.shutdown.send(true);
            slots.draining.push(handle.task);
            tracing::info!("Status poll loop stopped");
        }
    }

    /// Stop scheduling sweeps and wait until no loop is sweeping
    ///
    /// Holds the loop slots while waiting; a concurrent `start` waits too.
    pub async fn stop_and_wait(&self) {
        let mut slots = self.slots.lock().await;

        if let Some(handle) = slots.active.take() {
            let _ = handle.shutdown.send(true);
            slots.draining.push(handle.task);
            tracing::info!("Status poll loop stopped");
        }
        for task in slots.draining.drain(..) {
            join_loop(task).await;
        }
    }

    /// Check whether a loop is scheduled
    pub async fn is_running(&self) -> bool {
        self.slots.lock().await.active.is_some()
    }

    /// Run one sweep now, outside the timer
    pub async fn sweep(&self, ignore_refresh_flag: bool) -> StatusSnapshot {
        sweep(&self.registry, &self.outbox, ignore_refresh_flag).await
    }
}

async fn run_loop(
    registry: Arc<JobRegistry>,
    outbox: Arc<Outbox>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
    predecessors: Vec<JoinHandle<()>>,
) {
    for task in predecessors {
        join_loop(task).await;
    }
    if *shutdown.borrow() {
        return;
    }

    loop {
        sweep(&registry, &outbox, false).await;

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.changed() => {
                tracing::debug!("Status poll loop shutting down");
                break;
            }
        }
    }
}

async fn join_loop(task: JoinHandle<()>) {
    if let Err(e) = task.await {
        tracing::error!(error = %e, "Status poll loop ended abnormally");
    }
}

/// Refresh every eligible job and emit one aggregated `job_status_all`
///
/// Failures are reported per job as `job_err` and left out of the aggregate.
async fn sweep(registry: &JobRegistry, outbox: &Outbox, ignore_refresh_flag: bool) -> StatusSnapshot {
    let mut statuses = StatusSnapshot::new();
    let mut failed = 0usize;

    for job_id in registry.all_ids().await {
        // Removed since the snapshot was taken
        let Ok(record) = registry.get(&job_id).await else {
            continue;
        };

        if !(record.refresh || ignore_refresh_flag) {
            continue;
        }

        match fetch_status(record.client.as_ref()).await {
            Ok(status) => {
                statuses.insert(job_id, status);
            }
            Err(e) => {
                failed += 1;
                tracing::error!(
                    operation = "lookup_job_status",
                    job_id = %job_id,
                    error = %e,
                    "Failed to refresh job status"
                );
                outbox
                    .emit(OutboundMessage::JobErr {
                        job_id,
                        message: e.to_string(),
                    })
                    .await;
            }
        }
    }

    tracing::debug!(refreshed = statuses.len(), failed, "Status sweep finished");
    outbox.emit(OutboundMessage::JobStatusAll(statuses.clone())).await;
    statuses
}
