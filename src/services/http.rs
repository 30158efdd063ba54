//! HTTP adapters for the remote job services

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::jobs::state::JobState;

use super::rpc::RpcClient;
use super::{JobDescriptor, JobInventory, JobParams, JobService, LogPage, ServiceError, ServiceResult};

const INVENTORY_SERVICE: &str = "UserAndJobState";
const JOB_SERVICE: &str = "NarrativeJobService";

/// Index of the job id in an inventory tuple
const TUPLE_JOB_ID: usize = 0;
/// Index of the user tuple; its first element is the owner
const TUPLE_USER: usize = 1;
/// Index of the metadata map
const TUPLE_META: usize = 10;

// ============================================================================
// Job Inventory
// ============================================================================

/// Workspace job listing over the user and job state service
#[derive(Debug, Clone)]
pub struct HttpJobInventory {
    rpc: RpcClient,
}

impl HttpJobInventory {
    pub fn new(rpc: RpcClient) -> Self {
        Self { rpc }
    }
}

#[async_trait]
impl JobInventory for HttpJobInventory {
    async fn list_jobs(&self, workspace_id: &str) -> ServiceResult<Vec<JobDescriptor>> {
        let result = self
            .rpc
            .call_single(
                &format!("{INVENTORY_SERVICE}.list_jobs2"),
                vec![json!({
                    "authstrat": "kbaseworkspace",
                    "authparams": [workspace_id],
                })],
            )
            .await?;

        let tuples = result
            .as_array()
            .ok_or_else(|| ServiceError::InvalidResponse("job list is not an array".to_string()))?;

        tuples.iter().map(parse_job_tuple).collect()
    }

    async fn delete_job(&self, job_id: &str) -> ServiceResult<()> {
        self.rpc
            .call(&format!("{INVENTORY_SERVICE}.delete_job"), vec![json!(job_id)])
            .await?;
        Ok(())
    }
}

/// Read one job tuple from an inventory listing
pub fn parse_job_tuple(tuple: &Value) -> ServiceResult<JobDescriptor> {
    let fields = tuple
        .as_array()
        .ok_or_else(|| ServiceError::InvalidResponse("job entry is not a tuple".to_string()))?;

    let job_id = fields
        .get(TUPLE_JOB_ID)
        .and_then(Value::as_str)
        .ok_or_else(|| ServiceError::InvalidResponse("job entry has no job id".to_string()))?;

    let mut descriptor = JobDescriptor::new(job_id);

    descriptor.owner = match fields.get(TUPLE_USER) {
        Some(Value::Array(user)) => user.first().and_then(Value::as_str).map(String::from),
        Some(Value::String(user)) => Some(user.clone()),
        _ => None,
    };

    if let Some(meta) = fields.get(TUPLE_META).and_then(Value::as_object) {
        let text = |key: &str| meta.get(key).and_then(Value::as_str).map(String::from);
        if let Some(tag) = text("tag") {
            descriptor.tag = tag;
        }
        descriptor.cell_id = text("cell_id");
        descriptor.run_id = text("run_id");
    }

    Ok(descriptor)
}

// ============================================================================
// Job Service
// ============================================================================

/// Job parameters, state, logs, and cancellation over the job execution service
#[derive(Debug, Clone)]
pub struct HttpJobService {
    rpc: RpcClient,
}

impl HttpJobService {
    pub fn new(rpc: RpcClient) -> Self {
        Self { rpc }
    }

    fn method(name: &str) -> String {
        format!("{JOB_SERVICE}.{name}")
    }
}

#[async_trait]
impl JobService for HttpJobService {
    async fn get_job_params(&self, job_id: &str) -> ServiceResult<JobParams> {
        let params = self
            .rpc
            .call_single(&Self::method("get_job_params"), vec![json!(job_id)])
            .await?;
        Ok(serde_json::from_value(params)?)
    }

    async fn cancel_job(&self, job_id: &str) -> ServiceResult<()> {
        self.rpc
            .call(&Self::method("cancel_job"), vec![json!({ "job_id": job_id })])
            .await?;
        Ok(())
    }

    async fn check_job(&self, job_id: &str) -> ServiceResult<JobState> {
        let state = self
            .rpc
            .call_single(&Self::method("check_job"), vec![json!(job_id)])
            .await?;

        let mut state: JobState = serde_json::from_value(state)?;
        if state.job_id.is_empty() {
            state.job_id = job_id.to_string();
        }
        Ok(state)
    }

    async fn get_job_logs(&self, job_id: &str, skip_lines: usize) -> ServiceResult<LogPage> {
        let page = self
            .rpc
            .call_single(
                &Self::method("get_job_logs"),
                vec![json!({ "job_id": job_id, "skip_lines": skip_lines })],
            )
            .await?;
        Ok(serde_json::from_value(page)?)
    }
}
