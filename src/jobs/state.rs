//! Job state documents and status snapshots

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

// ============================================================================
// Job Stage
// ============================================================================

/// Lifecycle stage of a job as observed by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStage {
    /// Accepted by the job service, not yet executing
    Submitted,
    /// Executing
    Running,
    /// Finished successfully
    Completed,
    /// Cancelled by a user
    Cancelled,
    /// Finished with an error
    Failed,
}

impl JobStage {
    /// Check if no further transitions can happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl std::fmt::Display for JobStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Submitted => write!(f, "submitted"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

// ============================================================================
// Job State
// ============================================================================

/// State document returned by the job service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobState {
    #[serde(default)]
    pub job_id: String,

    /// Raw state label from the service (e.g. `queued`, `in-progress`)
    #[serde(default)]
    pub job_state: String,

    #[serde(default, with = "int_flag")]
    pub finished: bool,

    #[serde(default, with = "int_flag")]
    pub cancelled: bool,

    /// Epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec_start_time: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_time: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complete_time: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobState {
    /// Create a state with a raw label
    pub fn new(job_id: impl Into<String>, job_state: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            job_state: job_state.into(),
            ..Default::default()
        }
    }

    /// Derive the lifecycle stage
    pub fn stage(&self) -> JobStage {
        let label = self.job_state.to_ascii_lowercase();
        if self.cancelled || label == "canceled" || label == "cancelled" {
            JobStage::Cancelled
        } else if self.finished {
            if self.error.is_some() || label == "error" || label == "suspend" {
                JobStage::Failed
            } else {
                JobStage::Completed
            }
        } else if label == "in-progress" || label == "running" || self.exec_start_time.is_some() {
            JobStage::Running
        } else {
            JobStage::Submitted
        }
    }

    /// A job that is already finished or cancelled must not be cancelled again
    pub fn is_finished_or_cancelled(&self) -> bool {
        self.finished || self.cancelled
    }
}

/// The job service encodes flags as 0/1 integers; booleans are accepted too
mod int_flag {
    use super::*;

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Bool(flag) => Ok(flag),
            Value::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
            Value::Null => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected 0/1 or boolean flag, got {other}"
            ))),
        }
    }
}

// ============================================================================
// Logs
// ============================================================================

/// A single job log line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub line: String,

    #[serde(default, with = "int_flag")]
    pub is_error: bool,
}

impl LogLine {
    pub fn new(line: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            is_error: false,
        }
    }
}

// ============================================================================
// Status Snapshot
// ============================================================================

/// Status of one job as pushed to the front end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub state: JobState,
    pub spec: Value,
    pub widget_info: Value,
    pub owner: Option<String>,
}

/// Status of several jobs keyed by job id
pub type StatusSnapshot = BTreeMap<String, JobStatus>;
