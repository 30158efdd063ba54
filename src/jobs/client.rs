//! Per-job client capability
//!
//! A [`JobClient`] wraps the state and log calls for one remote job. The
//! registry stores one per job; every call goes through an `Arc<dyn JobClient>`
//! cloned out of the registry so no lock is held while the call is in flight.

use async_trait::async_trait;
use serde_json::Value;

use crate::services::{JobParams, ServiceResult};

use super::state::{JobState, JobStatus, LogLine};

/// Capability to query one remote job
#[async_trait]
pub trait JobClient: Send + Sync {
    /// Job identifier
    fn job_id(&self) -> &str;

    /// User that submitted the job, when known
    fn owner(&self) -> Option<&str>;

    /// Fetch the current job state
    async fn state(&self) -> ServiceResult<JobState>;

    /// Fetch the parameters the job was submitted with
    async fn parameters(&self) -> ServiceResult<JobParams>;

    /// Fetch log lines starting at `first_line`
    ///
    /// Returns the total number of lines the job has logged together with the
    /// requested slice. `num_lines = None` returns everything from `first_line`.
    async fn log(&self, first_line: usize, num_lines: Option<usize>)
        -> ServiceResult<(usize, Vec<LogLine>)>;

    /// Spec of the app the job was launched from
    async fn app_spec(&self) -> ServiceResult<Value>;

    /// Parameters for the front-end viewer of this job in the given state
    fn viewer_params(&self, state: &JobState) -> Value;
}

/// Fetch everything the front end shows for one job
pub async fn fetch_status(client: &dyn JobClient) -> ServiceResult<JobStatus> {
    let state = client.state().await?;
    let spec = client.app_spec().await?;
    let widget_info = client.viewer_params(&state);

    Ok(JobStatus {
        state,
        spec,
        widget_info,
        owner: client.owner().map(String::from),
    })
}
