//! Default [`JobClient`] backed by a [`JobService`]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::jobs::client::JobClient;
use crate::jobs::state::{JobStage, JobState, LogLine};

use super::{JobClientFactory, JobDescriptor, JobParams, JobService, ServiceError, ServiceResult};

/// A job tracked through the job service
///
/// Parameters are fetched once when the job is resolved and kept; state and
/// logs are always fetched live.
pub struct RemoteJob {
    job_id: String,
    owner: Option<String>,
    tag: String,
    cell_id: Option<String>,
    run_id: Option<String>,
    params: JobParams,
    service: Arc<dyn JobService>,
}

impl RemoteJob {
    pub fn new(descriptor: &JobDescriptor, params: JobParams, service: Arc<dyn JobService>) -> Self {
        Self {
            job_id: descriptor.job_id.clone(),
            owner: descriptor.owner.clone(),
            tag: descriptor.tag.clone(),
            cell_id: descriptor.cell_id.clone(),
            run_id: descriptor.run_id.clone(),
            params,
            service,
        }
    }

    pub fn app_id(&self) -> Option<&str> {
        self.params.app_id.as_deref()
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn cell_id(&self) -> Option<&str> {
        self.cell_id.as_deref()
    }

    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }
}

impl std::fmt::Debug for RemoteJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteJob")
            .field("job_id", &self.job_id)
            .field("owner", &self.owner)
            .field("app_id", &self.params.app_id)
            .field("tag", &self.tag)
            .field("cell_id", &self.cell_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl JobClient for RemoteJob {
    fn job_id(&self) -> &str {
        &self.job_id
    }

    fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    async fn state(&self) -> ServiceResult<JobState> {
        self.service.check_job(&self.job_id).await
    }

    async fn parameters(&self) -> ServiceResult<JobParams> {
        Ok(self.params.clone())
    }

    async fn log(
        &self,
        first_line: usize,
        num_lines: Option<usize>,
    ) -> ServiceResult<(usize, Vec<LogLine>)> {
        let page = self.service.get_job_logs(&self.job_id, first_line).await?;

        let mut lines = page.lines;
        if let Some(n) = num_lines {
            lines.truncate(n);
        }
        Ok((page.last_line_number, lines))
    }

    async fn app_spec(&self) -> ServiceResult<Value> {
        Ok(json!({
            "app_id": self.params.app_id,
            "method": self.params.method,
            "tag": self.tag,
        }))
    }

    fn viewer_params(&self, state: &JobState) -> Value {
        if state.stage() != JobStage::Completed {
            return Value::Null;
        }

        json!({
            "app_id": self.params.app_id,
            "tag": self.tag,
            "cell_id": self.cell_id,
            "run_id": self.run_id,
            "result": state.extra.get("result").cloned().unwrap_or(Value::Null),
        })
    }
}

/// Builds [`RemoteJob`] clients sharing one job service
#[derive(Clone)]
pub struct RemoteJobFactory {
    service: Arc<dyn JobService>,
}

impl RemoteJobFactory {
    pub fn new(service: Arc<dyn JobService>) -> Self {
        Self { service }
    }
}

impl JobClientFactory for RemoteJobFactory {
    fn build(&self, descriptor: &JobDescriptor, params: JobParams) -> ServiceResult<Arc<dyn JobClient>> {
        if descriptor.job_id.is_empty() {
            return Err(ServiceError::InvalidResponse("job descriptor has an empty job id".to_string()));
        }
        Ok(Arc::new(RemoteJob::new(descriptor, params, self.service.clone())))
    }
}
