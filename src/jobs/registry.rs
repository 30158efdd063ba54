//! Job registry for tracking remote jobs
//!
//! This module owns the mapping from job id to [`JobRecord`]. It is the only
//! place jobs are added, removed, or flagged for refresh. Both the poll loop and
//! inbound message handling share one registry; every operation holds the lock
//! only long enough to copy data in or out.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{Error, Result};

use super::client::JobClient;

// ============================================================================
// Job Record
// ============================================================================

/// A registered job
#[derive(Clone)]
pub struct JobRecord {
    /// Job identifier
    pub job_id: String,

    /// Client used to query the job
    pub client: Arc<dyn JobClient>,

    /// Whether the poll loop refreshes this job
    pub refresh: bool,
}

impl JobRecord {
    /// Create a record with refresh enabled
    pub fn new(job_id: impl Into<String>, client: Arc<dyn JobClient>) -> Self {
        Self {
            job_id: job_id.into(),
            client,
            refresh: true,
        }
    }
}

impl std::fmt::Debug for JobRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRecord")
            .field("job_id", &self.job_id)
            .field("owner", &self.client.owner())
            .field("refresh", &self.refresh)
            .finish()
    }
}

// ============================================================================
// Job Registry
// ============================================================================

/// Registry of all jobs tracked in a session
#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, JobRecord>>,
}

impl JobRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job, replacing any existing record with the same id
    pub async fn register(&self, job_id: impl Into<String>, client: Arc<dyn JobClient>) {
        let job_id = job_id.into();
        let record = JobRecord::new(job_id.clone(), client);
        let replaced = self.jobs.write().await.insert(job_id.clone(), record);

        tracing::debug!(job_id = %job_id, replaced = replaced.is_some(), "Job registered");
    }

    /// Get a copy of a job record
    pub async fn get(&self, job_id: &str) -> Result<JobRecord> {
        self.jobs
            .read()
            .await
            .get(job_id)
            .cloned()
            .ok_or_else(|| Error::not_found(job_id))
    }

    /// Get the client for a job
    pub async fn client(&self, job_id: &str) -> Result<Arc<dyn JobClient>> {
        self.get(job_id).await.map(|record| record.client)
    }

    /// Remove a job
    pub async fn remove(&self, job_id: &str) -> Result<JobRecord> {
        let removed = self
            .jobs
            .write()
            .await
            .remove(job_id)
            .ok_or_else(|| Error::not_found(job_id))?;

        tracing::debug!(job_id = %job_id, "Job removed from registry");
        Ok(removed)
    }

    /// Enable or disable periodic refresh for a job
    pub async fn set_refresh(&self, job_id: &str, refresh: bool) -> Result<()> {
        let mut jobs = self.jobs.write().await;

        let record = jobs
            .get_mut(job_id)
            .ok_or_else(|| Error::not_found(job_id))?;

        record.refresh = refresh;
        Ok(())
    }

    /// Snapshot of the current job ids
    ///
    /// The returned list is owned, so iterating it never observes later
    /// registrations or removals.
    pub async fn all_ids(&self) -> Vec<String> {
        self.jobs.read().await.keys().cloned().collect()
    }

    /// Check whether a job is registered
    pub async fn contains(&self, job_id: &str) -> bool {
        self.jobs.read().await.contains_key(job_id)
    }

    /// All registered clients, unordered
    pub async fn clients(&self) -> Vec<Arc<dyn JobClient>> {
        self.jobs
            .read()
            .await
            .values()
            .map(|record| record.client.clone())
            .collect()
    }

    /// Number of registered jobs
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Check if no jobs are registered
    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
