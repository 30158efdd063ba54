//! Remote service capabilities consumed by the job engine
//!
//! The engine talks to two remote services:
//!
//! - a **job inventory** (user and job state service) that lists the jobs bound
//!   to a workspace and keeps their bookkeeping entries
//! - a **job service** (job execution service) that knows job parameters, state,
//!   logs, and can cancel a running job
//!
//! Both are modelled as traits so the engine can run against the HTTP
//! adapters in [`http`] or against in-process fakes.

pub mod http;
pub mod remote;
pub mod rpc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::jobs::client::JobClient;
use crate::jobs::state::{JobState, LogLine};

pub use http::{HttpJobInventory, HttpJobService};
pub use remote::{RemoteJob, RemoteJobFactory};
pub use rpc::{RpcClient, RpcConfig};

/// Result type for remote service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors raised by remote service adapters
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    /// Adapter could not be constructed
    #[error("Initialization error: {0}")]
    Init(String),

    /// Transport failure (connect, timeout, reset)
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status without an RPC error body
    #[error("HTTP error ({status}): {message}")]
    Http { status: u16, message: String },

    /// The service answered with an RPC error
    #[error("RPC error ({code}): {message}")]
    Rpc { code: i64, message: String },

    /// Response body could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// Response decoded but did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ServiceError {
    /// Transport-level failures and server-side HTTP errors may succeed on retry
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Http { status, .. } => *status >= 500,
            Self::Init(_) | Self::Rpc { .. } | Self::Parse(_) | Self::InvalidResponse(_) => false,
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

// ============================================================================
// Service Data Types
// ============================================================================

/// One job as listed by the inventory for a workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    /// Job identifier
    pub job_id: String,

    /// User that submitted the job
    pub owner: Option<String>,

    /// App version tag the job was launched from
    #[serde(default = "default_tag")]
    pub tag: String,

    /// Front-end cell that started the job
    pub cell_id: Option<String>,

    /// Run identifier assigned by the front end
    pub run_id: Option<String>,
}

fn default_tag() -> String {
    "release".to_string()
}

impl JobDescriptor {
    /// Create a descriptor with default metadata
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            owner: None,
            tag: default_tag(),
            cell_id: None,
            run_id: None,
        }
    }

    /// Set the owner
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Set the cell id
    pub fn with_cell_id(mut self, cell_id: impl Into<String>) -> Self {
        self.cell_id = Some(cell_id.into());
        self
    }

    /// Set the version tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }
}

/// Input parameters a job was submitted with
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobParams {
    /// Service method the job runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// App the job was launched from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,

    /// Everything else, kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A page of job log lines
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogPage {
    /// Lines starting at the requested offset
    pub lines: Vec<LogLine>,

    /// Total number of lines the job has logged
    pub last_line_number: usize,
}

// ============================================================================
// Capabilities
// ============================================================================

/// Workspace job listing and bookkeeping (user and job state service)
#[async_trait]
pub trait JobInventory: Send + Sync {
    /// List the jobs bound to a workspace
    async fn list_jobs(&self, workspace_id: &str) -> ServiceResult<Vec<JobDescriptor>>;

    /// Delete the bookkeeping entry for a job
    async fn delete_job(&self, job_id: &str) -> ServiceResult<()>;
}

/// Job execution service
#[async_trait]
pub trait JobService: Send + Sync {
    /// Fetch the parameters a job was submitted with
    async fn get_job_params(&self, job_id: &str) -> ServiceResult<JobParams>;

    /// Cancel a running job
    async fn cancel_job(&self, job_id: &str) -> ServiceResult<()>;

    /// Fetch the current state of a job
    async fn check_job(&self, job_id: &str) -> ServiceResult<JobState>;

    /// Fetch log lines, skipping the first `skip_lines`
    async fn get_job_logs(&self, job_id: &str, skip_lines: usize) -> ServiceResult<LogPage>;
}

/// Builds a [`JobClient`] for a job resolved from the inventory
pub trait JobClientFactory: Send + Sync {
    /// Build the client from the descriptor and the job's parameters
    fn build(&self, descriptor: &JobDescriptor, params: JobParams) -> ServiceResult<Arc<dyn JobClient>>;
}
