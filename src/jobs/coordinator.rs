//! Job coordinator
//!
//! Orchestrates operations that span the registry, the remote services, and
//! the outbox: initializing from the workspace inventory, status lookups,
//! cancellation, deletion, and log retrieval.
//!
//! Cancel and delete coordinate two remote services. A failure in either step
//! propagates to the caller and leaves the registry as it was, so a job that
//! was cancelled but whose bookkeeping entry could not be deleted stays
//! registered.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::services::{JobClientFactory, JobDescriptor, JobInventory, JobService, ServiceError};

use super::client::{fetch_status, JobClient};
use super::gateway::Outbox;
use super::messages::OutboundMessage;
use super::poller::StatusPoller;
use super::registry::JobRegistry;
use super::state::{JobStage, JobStatus, LogLine, StatusSnapshot};
use super::summary::{JobRow, JobTable};

// ============================================================================
// Supporting Types
// ============================================================================

/// Remote capabilities the coordinator composes
#[derive(Clone)]
pub struct Services {
    pub inventory: Arc<dyn JobInventory>,
    pub job_service: Arc<dyn JobService>,
    pub client_factory: Arc<dyn JobClientFactory>,
}

/// Outcome of initializing from the workspace inventory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitReport {
    /// Jobs that were registered
    pub registered: Vec<String>,

    /// Jobs that could not be resolved
    pub failed: Vec<String>,
}

/// Outcome of a successful cancel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The remote cancel was issued
    Cancelled,

    /// The job had already finished or been cancelled; nothing was done
    AlreadyFinished(JobStage),
}

/// A slice of job logs as sent to the front end
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLogs {
    pub job_id: String,
    /// Index of the first returned line
    pub first: usize,
    /// Total number of lines the job has logged
    pub max_lines: usize,
    pub lines: Vec<LogLine>,
    /// Whether this answers a "latest lines" request
    pub latest: bool,
}

impl From<JobLogs> for OutboundMessage {
    fn from(logs: JobLogs) -> Self {
        Self::JobLogs {
            job_id: logs.job_id,
            first: logs.first,
            max_lines: logs.max_lines,
            lines: logs.lines,
            latest: logs.latest,
        }
    }
}

/// Reference to a job started outside this session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRef {
    /// Job id, optionally qualified as `prefix:job_id`
    pub job_id: String,
    pub app_id: Option<String>,
    pub tag: String,
    pub cell_id: Option<String>,
}

impl JobRef {
    /// Job id with any `prefix:` qualifier removed
    pub fn bare_job_id(&self) -> &str {
        self.job_id.rsplit(':').next().unwrap_or(&self.job_id)
    }
}

// ============================================================================
// Job Coordinator
// ============================================================================

/// Orchestrates job operations for one session
pub struct JobCoordinator {
    registry: Arc<JobRegistry>,
    outbox: Arc<Outbox>,
    poller: Arc<StatusPoller>,
    services: Services,
    start_poller_on_init: bool,
    init_lock: Mutex<()>,
}

impl JobCoordinator {
    pub fn new(
        registry: Arc<JobRegistry>,
        outbox: Arc<Outbox>,
        poller: Arc<StatusPoller>,
        services: Services,
    ) -> Self {
        Self {
            registry,
            outbox,
            poller,
            services,
            start_poller_on_init: true,
            init_lock: Mutex::new(()),
        }
    }

    /// Whether `initialize` starts the poll loop
    pub fn with_poller_on_init(mut self, enabled: bool) -> Self {
        self.start_poller_on_init = enabled;
        self
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn poller(&self) -> &Arc<StatusPoller> {
        &self.poller
    }

    pub fn outbox(&self) -> &Arc<Outbox> {
        &self.outbox
    }

    /// All registered job clients, unordered
    pub async fn jobs(&self) -> Vec<Arc<dyn JobClient>> {
        self.registry.clients().await
    }

    /// Load the jobs bound to a workspace and (re)start the poll loop
    ///
    /// A failure to list jobs aborts initialization. A job whose parameters
    /// cannot be resolved is reported with `job_init_lookup_err` and skipped.
    pub async fn initialize(&self, workspace_id: &str) -> Result<InitReport> {
        let _guard = self.init_lock.lock().await;

        let descriptors = match self.services.inventory.list_jobs(workspace_id).await {
            Ok(descriptors) => descriptors,
            Err(e) => {
                tracing::error!(
                    operation = "init",
                    workspace_id = %workspace_id,
                    error = %e,
                    "Unable to get jobs list"
                );
                self.outbox
                    .emit(OutboundMessage::JobInitErr {
                        msg: "Unable to get jobs list!".to_string(),
                        err: e.to_string(),
                    })
                    .await;
                return Err(Error::remote("list_jobs", e));
            }
        };

        // No sweep may run while the registry is rebuilt
        self.poller.stop_and_wait().await;

        let mut report = InitReport::default();
        for descriptor in descriptors {
            match self.resolve(&descriptor).await {
                Ok(client) => {
                    self.registry.register(descriptor.job_id.clone(), client).await;
                    report.registered.push(descriptor.job_id);
                }
                Err(e) => {
                    tracing::error!(
                        operation = "init",
                        job_id = %descriptor.job_id,
                        error = %e,
                        "Unable to get job info"
                    );
                    self.outbox
                        .emit(OutboundMessage::JobInitLookupErr {
                            msg: "Unable to get job info!".to_string(),
                            job_id: descriptor.job_id.clone(),
                            err: e.to_string(),
                        })
                        .await;
                    report.failed.push(descriptor.job_id);
                }
            }
        }

        tracing::info!(
            workspace_id = %workspace_id,
            registered = report.registered.len(),
            failed = report.failed.len(),
            "Jobs initialized"
        );

        if self.start_poller_on_init {
            self.poller.start().await;
        }

        Ok(report)
    }

    async fn resolve(&self, descriptor: &JobDescriptor) -> std::result::Result<Arc<dyn JobClient>, ServiceError> {
        let params = self
            .services
            .job_service
            .get_job_params(&descriptor.job_id)
            .await?;
        self.services.client_factory.build(descriptor, params)
    }

    /// Build a client for a job started outside this session
    ///
    /// The job is not registered.
    pub async fn resolve_existing(&self, job_ref: &JobRef) -> Result<Arc<dyn JobClient>> {
        let job_id = job_ref.bare_job_id();

        let mut params = self
            .services
            .job_service
            .get_job_params(job_id)
            .await
            .map_err(|e| remote_failure("get_existing_job", job_id, e))?;
        if job_ref.app_id.is_some() {
            params.app_id = job_ref.app_id.clone();
        }

        let descriptor = JobDescriptor {
            job_id: job_id.to_string(),
            owner: None,
            tag: job_ref.tag.clone(),
            cell_id: job_ref.cell_id.clone(),
            run_id: None,
        };

        self.services
            .client_factory
            .build(&descriptor, params)
            .map_err(|e| remote_failure("get_existing_job", job_id, e))
    }

    /// Look up one job and emit `job_status`
    pub async fn get_status(&self, job_id: &str) -> Result<JobStatus> {
        let client = self.registry.client(job_id).await?;

        let status = fetch_status(client.as_ref())
            .await
            .map_err(|e| remote_failure("job_status", job_id, e))?;

        let mut snapshot = StatusSnapshot::new();
        snapshot.insert(job_id.to_string(), status.clone());
        self.outbox.emit(OutboundMessage::JobStatus(snapshot)).await;

        Ok(status)
    }

    /// Run one status sweep on demand and emit `job_status_all`
    pub async fn get_all_status(&self, ignore_refresh_flag: bool) -> StatusSnapshot {
        self.poller.sweep(ignore_refresh_flag).await
    }

    /// Register a newly started job
    ///
    /// Emits the job's status followed by `new_job`. A failed status lookup is
    /// reported as `job_err`; the job stays registered either way.
    pub async fn register_new(&self, client: Arc<dyn JobClient>) {
        let job_id = client.job_id().to_string();
        self.registry.register(job_id.clone(), client).await;

        if let Err(e) = self.get_status(&job_id).await {
            self.outbox
                .emit(OutboundMessage::JobErr {
                    job_id: job_id.clone(),
                    message: e.to_string(),
                })
                .await;
        }

        self.outbox.emit(OutboundMessage::NewJob {}).await;
        tracing::info!(job_id = %job_id, "New job registered");
    }

    /// Cancel a job unless it already finished or was cancelled
    pub async fn cancel(&self, job_id: &str) -> Result<CancelOutcome> {
        let client = self.registry.client(job_id).await?;

        let state = client
            .state()
            .await
            .map_err(|e| remote_failure("cancel_job", job_id, e))?;

        if state.is_finished_or_cancelled() {
            tracing::debug!(job_id = %job_id, stage = %state.stage(), "Job already finished, not cancelling");
            return Ok(CancelOutcome::AlreadyFinished(state.stage()));
        }

        self.services
            .job_service
            .cancel_job(job_id)
            .await
            .map_err(|e| remote_failure("cancel_job", job_id, e))?;

        tracing::info!(job_id = %job_id, "Job cancelled");
        self.outbox
            .emit(OutboundMessage::JobCanceled {
                job_id: job_id.to_string(),
            })
            .await;

        Ok(CancelOutcome::Cancelled)
    }

    /// Cancel a job, delete its bookkeeping entry, then forget it
    pub async fn delete(&self, job_id: Option<&str>) -> Result<()> {
        let job_id = job_id.ok_or_else(|| Error::invalid_argument("Job id required for deletion"))?;

        if let Err(e) = self.cancel(job_id).await {
            tracing::warn!(job_id = %job_id, error = %e, "Delete aborted: job could not be cancelled");
            return Err(e);
        }

        self.services
            .inventory
            .delete_job(job_id)
            .await
            .map_err(|e| remote_failure("delete_job", job_id, e))?;

        self.registry.remove(job_id).await?;

        tracing::info!(job_id = %job_id, "Job deleted");
        self.outbox
            .emit(OutboundMessage::JobDeleted {
                job_id: job_id.to_string(),
            })
            .await;

        Ok(())
    }

    /// Fetch `num_lines` log lines starting at `first_line` and emit `job_logs`
    pub async fn get_logs(
        &self,
        job_id: &str,
        first_line: usize,
        num_lines: Option<usize>,
    ) -> Result<JobLogs> {
        let client = self.registry.client(job_id).await?;

        let (max_lines, lines) = client
            .log(first_line, num_lines)
            .await
            .map_err(|e| remote_failure("job_logs", job_id, e))?;

        let logs = JobLogs {
            job_id: job_id.to_string(),
            first: first_line,
            max_lines,
            lines,
            latest: false,
        };
        self.outbox.emit(logs.clone().into()).await;
        Ok(logs)
    }

    /// Fetch the last `num_lines` log lines (all lines when `None`) and emit `job_logs`
    pub async fn get_latest_logs(&self, job_id: &str, num_lines: Option<usize>) -> Result<JobLogs> {
        let client = self.registry.client(job_id).await?;

        let (max_lines, mut lines) = client
            .log(0, None)
            .await
            .map_err(|e| remote_failure("job_logs_latest", job_id, e))?;

        let first = match num_lines {
            Some(n) if max_lines > n => max_lines - n,
            _ => 0,
        };
        if first > 0 {
            lines = lines.split_off(first.min(lines.len()));
        }

        let logs = JobLogs {
            job_id: job_id.to_string(),
            first,
            max_lines,
            lines,
            latest: true,
        };
        self.outbox.emit(logs.clone().into()).await;
        Ok(logs)
    }

    /// Summary of every registered job, oldest first
    pub async fn list_jobs(&self) -> Result<JobTable> {
        let mut rows = Vec::new();

        for client in self.registry.clients().await {
            let job_id = client.job_id();
            let state = client
                .state()
                .await
                .map_err(|e| remote_failure("list_jobs", job_id, e))?;
            let params = client
                .parameters()
                .await
                .map_err(|e| remote_failure("list_jobs", job_id, e))?;

            rows.push(JobRow::new(job_id, &state, params.app_id, client.owner()));
        }

        Ok(JobTable::build(rows, Utc::now()))
    }

    /// Stop the poll loop
    pub async fn shutdown(&self) {
        self.poller.stop().await;
    }
}

fn remote_failure(operation: &'static str, job_id: &str, e: ServiceError) -> Error {
    tracing::error!(operation, job_id = %job_id, error = %e, "Remote job operation failed");
    Error::remote(operation, e)
}
