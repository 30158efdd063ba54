//! Message contract of the host channel
//!
//! Outbound messages are serialized as `{"msg_type": ..., "content": ...}`.
//! Inbound control messages carry a `request_type` plus request-specific
//! fields and are validated here before anything is dispatched.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::state::{LogLine, StatusSnapshot};

// ============================================================================
// Outbound
// ============================================================================

/// Message pushed to the front end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msg_type", content = "content", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Listing the workspace jobs failed; initialization aborted
    JobInitErr { msg: String, err: String },

    /// One job could not be resolved during initialization
    JobInitLookupErr {
        msg: String,
        job_id: String,
        err: String,
    },

    /// Status of a single job
    JobStatus(StatusSnapshot),

    /// Status of every refreshed job
    JobStatusAll(StatusSnapshot),

    /// Refreshing one job failed during a sweep
    JobErr { job_id: String, message: String },

    /// A job was registered
    NewJob {},

    JobDeleted { job_id: String },

    JobCanceled { job_id: String },

    /// An inbound request could not be served
    JobCommError {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        job_id: Option<String>,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_type: Option<String>,
    },

    /// A slice of job logs
    JobLogs {
        job_id: String,
        first: usize,
        max_lines: usize,
        lines: Vec<LogLine>,
        latest: bool,
    },
}

impl OutboundMessage {
    /// Wire name of the message type
    pub fn msg_type(&self) -> &'static str {
        match self {
            Self::JobInitErr { .. } => "job_init_err",
            Self::JobInitLookupErr { .. } => "job_init_lookup_err",
            Self::JobStatus(_) => "job_status",
            Self::JobStatusAll(_) => "job_status_all",
            Self::JobErr { .. } => "job_err",
            Self::NewJob {} => "new_job",
            Self::JobDeleted { .. } => "job_deleted",
            Self::JobCanceled { .. } => "job_canceled",
            Self::JobCommError { .. } => "job_comm_error",
            Self::JobLogs { .. } => "job_logs",
        }
    }

    /// Build a `job_comm_error`
    pub fn comm_error(
        job_id: Option<&str>,
        message: impl Into<String>,
        request_type: Option<&str>,
    ) -> Self {
        Self::JobCommError {
            job_id: job_id.map(String::from),
            message: message.into(),
            request_type: request_type.map(String::from),
        }
    }
}

// ============================================================================
// Inbound
// ============================================================================

/// Control request received from the front end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "request_type", rename_all = "snake_case")]
pub enum ControlRequest {
    /// Refresh every job, ignoring refresh flags
    AllStatus,
    JobStatus { job_id: String },
    StopUpdateLoop,
    StartUpdateLoop,
    /// Exclude a job from the poll loop
    StopJobUpdate { job_id: String },
    /// Include a job in the poll loop again
    StartJobUpdate { job_id: String },
    DeleteJob { job_id: String },
    CancelJob { job_id: String },
    JobLogs {
        job_id: String,
        #[serde(default)]
        first_line: usize,
        #[serde(default)]
        num_lines: Option<usize>,
    },
    JobLogsLatest {
        job_id: String,
        #[serde(default)]
        num_lines: Option<usize>,
    },
}

impl ControlRequest {
    /// Every recognized `request_type`
    pub const REQUEST_TYPES: [&'static str; 10] = [
        "all_status",
        "job_status",
        "stop_update_loop",
        "start_update_loop",
        "stop_job_update",
        "start_job_update",
        "delete_job",
        "cancel_job",
        "job_logs",
        "job_logs_latest",
    ];

    /// Validate and decode a raw inbound message
    pub fn from_value(value: &Value) -> Result<Self, RequestError> {
        let fields = value.as_object().ok_or(RequestError::NotAnObject)?;

        let request_type = match fields.get("request_type") {
            Some(Value::String(request_type)) => request_type.clone(),
            _ => return Err(RequestError::MissingRequestType),
        };

        if !Self::REQUEST_TYPES.contains(&request_type.as_str()) {
            return Err(RequestError::Unknown(request_type));
        }

        let job_id = fields.get("job_id").and_then(Value::as_str).map(String::from);
        if Self::requires_job_id(&request_type) && job_id.is_none() {
            return Err(RequestError::MissingJobId { request_type });
        }

        serde_json::from_value(value.clone()).map_err(|e| RequestError::Malformed {
            request_type,
            job_id,
            reason: e.to_string(),
        })
    }

    /// Check whether a request type needs a `job_id`
    pub fn requires_job_id(request_type: &str) -> bool {
        !matches!(
            request_type,
            "all_status" | "stop_update_loop" | "start_update_loop"
        )
    }

    /// Wire name of the request type
    pub fn request_type(&self) -> &'static str {
        match self {
            Self::AllStatus => "all_status",
            Self::JobStatus { .. } => "job_status",
            Self::StopUpdateLoop => "stop_update_loop",
            Self::StartUpdateLoop => "start_update_loop",
            Self::StopJobUpdate { .. } => "stop_job_update",
            Self::StartJobUpdate { .. } => "start_job_update",
            Self::DeleteJob { .. } => "delete_job",
            Self::CancelJob { .. } => "cancel_job",
            Self::JobLogs { .. } => "job_logs",
            Self::JobLogsLatest { .. } => "job_logs_latest",
        }
    }

    /// Job the request targets, if any
    pub fn job_id(&self) -> Option<&str> {
        match self {
            Self::AllStatus | Self::StopUpdateLoop | Self::StartUpdateLoop => None,
            Self::JobStatus { job_id }
            | Self::StopJobUpdate { job_id }
            | Self::StartJobUpdate { job_id }
            | Self::DeleteJob { job_id }
            | Self::CancelJob { job_id }
            | Self::JobLogs { job_id, .. }
            | Self::JobLogsLatest { job_id, .. } => Some(job_id),
        }
    }
}

/// Why an inbound message was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("Malformed message: expected a JSON object")]
    NotAnObject,

    #[error("Malformed message: missing request_type")]
    MissingRequestType,

    #[error("Unknown message \"{0}\"")]
    Unknown(String),

    #[error("Request \"{request_type}\" requires a job_id")]
    MissingJobId { request_type: String },

    #[error("Malformed \"{request_type}\" request: {reason}")]
    Malformed {
        request_type: String,
        job_id: Option<String>,
        reason: String,
    },
}

impl RequestError {
    /// Request type, when one could be read
    pub fn request_type(&self) -> Option<&str> {
        match self {
            Self::NotAnObject | Self::MissingRequestType => None,
            Self::Unknown(request_type)
            | Self::MissingJobId { request_type }
            | Self::Malformed { request_type, .. } => Some(request_type),
        }
    }

    /// Job id, when one could be read
    pub fn job_id(&self) -> Option<&str> {
        match self {
            Self::Malformed { job_id, .. } => job_id.as_deref(),
            _ => None,
        }
    }
}
