//! Test fixtures for integration tests
//!
//! In-process fakes for the remote services and job clients, plus a harness
//! that wires them into a session with an in-memory channel.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

use jobsync::jobs::{
    JobClient, JobCoordinator, JobState, LogLine, MemoryChannel, OutboundMessage, Services,
};
use jobsync::services::{
    JobClientFactory, JobDescriptor, JobInventory, JobParams, JobService, LogPage, ServiceError,
    ServiceResult,
};
use jobsync::session::JobSession;

// ============================================================================
// Concurrency Probe
// ============================================================================

/// Tracks how many state lookups run at the same time
#[derive(Debug, Default)]
pub struct Probe {
    active: AtomicUsize,
    peak: AtomicUsize,
    total: AtomicUsize,
}

impl Probe {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Lookups running right now
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.total.fetch_add(1, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Mock Job
// ============================================================================

/// Scriptable job client
pub struct MockJob {
    job_id: String,
    owner: Option<String>,
    app_id: Option<String>,
    state: Mutex<JobState>,
    log_lines: usize,
    fail_state: AtomicBool,
    delay: Option<Duration>,
    probe: Option<Arc<Probe>>,
}

impl MockJob {
    pub fn new(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            owner: Some("alice".to_string()),
            app_id: Some("assembler/run".to_string()),
            state: Mutex::new(JobState::new(job_id, "queued")),
            log_lines: 0,
            fail_state: AtomicBool::new(false),
            delay: None,
            probe: None,
        }
    }

    pub fn running(job_id: &str) -> Self {
        let job = Self::new(job_id);
        job.update_state(|state| {
            state.job_state = "in-progress".into();
            state.creation_time = Some(1_700_000_000_000);
            state.exec_start_time = Some(1_700_000_060_000);
        });
        job
    }

    pub fn finished(job_id: &str) -> Self {
        let job = Self::running(job_id);
        job.update_state(|state| {
            state.job_state = "completed".into();
            state.finished = true;
            state.finish_time = Some(1_700_000_120_000);
            state.complete_time = Some(1_700_000_121_000);
        });
        job
    }

    pub fn with_logs(mut self, lines: usize) -> Self {
        self.log_lines = lines;
        self
    }

    pub fn with_app_id(mut self, app_id: Option<&str>) -> Self {
        self.app_id = app_id.map(String::from);
        self
    }

    pub fn failing(self) -> Self {
        self.fail_state.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_probe(mut self, probe: Arc<Probe>, delay: Duration) -> Self {
        self.probe = Some(probe);
        self.delay = Some(delay);
        self
    }

    pub fn update_state(&self, update: impl FnOnce(&mut JobState)) {
        update(&mut *self.state.lock().unwrap());
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_state.store(failing, Ordering::SeqCst);
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl JobClient for MockJob {
    fn job_id(&self) -> &str {
        &self.job_id
    }

    fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    async fn state(&self) -> ServiceResult<JobState> {
        if let Some(probe) = &self.probe {
            probe.enter();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(probe) = &self.probe {
            probe.exit();
        }

        if self.fail_state.load(Ordering::SeqCst) {
            return Err(ServiceError::Network(format!("{} unreachable", self.job_id)));
        }
        Ok(self.state.lock().unwrap().clone())
    }

    async fn parameters(&self) -> ServiceResult<JobParams> {
        Ok(JobParams {
            app_id: self.app_id.clone(),
            ..Default::default()
        })
    }

    async fn log(
        &self,
        first_line: usize,
        num_lines: Option<usize>,
    ) -> ServiceResult<(usize, Vec<LogLine>)> {
        let last = match num_lines {
            Some(n) => (first_line + n).min(self.log_lines),
            None => self.log_lines,
        };
        let lines = (first_line.min(last)..last)
            .map(|i| LogLine::new(format!("line {i}")))
            .collect();
        Ok((self.log_lines, lines))
    }

    async fn app_spec(&self) -> ServiceResult<Value> {
        Ok(json!({ "app_id": self.app_id }))
    }

    fn viewer_params(&self, state: &JobState) -> Value {
        json!({ "stage": state.stage().to_string() })
    }
}

// ============================================================================
// Mock Services
// ============================================================================

/// Inventory listing a fixed set of jobs
#[derive(Default)]
pub struct MockInventory {
    pub descriptors: Mutex<Vec<JobDescriptor>>,
    pub fail_list: AtomicBool,
    pub fail_delete: AtomicBool,
    pub deleted: Mutex<Vec<String>>,
}

impl MockInventory {
    pub fn with_jobs(job_ids: &[&str]) -> Self {
        let inventory = Self::default();
        *inventory.descriptors.lock().unwrap() = job_ids
            .iter()
            .map(|id| JobDescriptor::new(*id).with_owner("alice"))
            .collect();
        inventory
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobInventory for MockInventory {
    async fn list_jobs(&self, _workspace_id: &str) -> ServiceResult<Vec<JobDescriptor>> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(ServiceError::Http {
                status: 503,
                message: "inventory down".into(),
            });
        }
        Ok(self.descriptors.lock().unwrap().clone())
    }

    async fn delete_job(&self, job_id: &str) -> ServiceResult<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(ServiceError::Rpc {
                code: -32500,
                message: "bookkeeping entry locked".into(),
            });
        }
        self.deleted.lock().unwrap().push(job_id.to_string());
        Ok(())
    }
}

/// Job service recording cancel calls
#[derive(Default)]
pub struct MockJobService {
    pub fail_params: Mutex<HashSet<String>>,
    pub fail_cancel: AtomicBool,
    pub cancelled: Mutex<Vec<String>>,
}

impl MockJobService {
    pub fn fail_params_for(&self, job_id: &str) {
        self.fail_params.lock().unwrap().insert(job_id.to_string());
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobService for MockJobService {
    async fn get_job_params(&self, job_id: &str) -> ServiceResult<JobParams> {
        if self.fail_params.lock().unwrap().contains(job_id) {
            return Err(ServiceError::Rpc {
                code: -32500,
                message: format!("no such job {job_id}"),
            });
        }
        Ok(JobParams {
            app_id: Some("assembler/run".into()),
            ..Default::default()
        })
    }

    async fn cancel_job(&self, job_id: &str) -> ServiceResult<()> {
        if self.fail_cancel.load(Ordering::SeqCst) {
            return Err(ServiceError::Network("connection reset".into()));
        }
        self.cancelled.lock().unwrap().push(job_id.to_string());
        Ok(())
    }

    async fn check_job(&self, job_id: &str) -> ServiceResult<JobState> {
        Ok(JobState::new(job_id, "queued"))
    }

    async fn get_job_logs(&self, _job_id: &str, _skip_lines: usize) -> ServiceResult<LogPage> {
        Ok(LogPage::default())
    }
}

/// Factory handing out [`MockJob`]s, keeping a handle to each
#[derive(Default)]
pub struct MockFactory {
    pub built: Mutex<HashMap<String, Arc<MockJob>>>,
    pub templates: Mutex<HashMap<String, Arc<MockJob>>>,
    pub observed: Mutex<Option<Arc<Probe>>>,
    pub active_at_build: Mutex<Vec<usize>>,
}

impl MockFactory {
    /// Hand out `job` when its id is resolved
    pub fn provide(&self, job: Arc<MockJob>) {
        self.templates
            .lock()
            .unwrap()
            .insert(job.job_id().to_string(), job);
    }

    pub fn job(&self, job_id: &str) -> Option<Arc<MockJob>> {
        self.built.lock().unwrap().get(job_id).cloned()
    }

    pub fn build_count(&self) -> usize {
        self.built.lock().unwrap().len()
    }

    /// Record how many lookups on `probe` are running each time a job is built
    pub fn observe(&self, probe: Arc<Probe>) {
        *self.observed.lock().unwrap() = Some(probe);
    }

    pub fn active_at_build(&self) -> Vec<usize> {
        self.active_at_build.lock().unwrap().clone()
    }
}

impl JobClientFactory for MockFactory {
    fn build(&self, descriptor: &JobDescriptor, _params: JobParams) -> ServiceResult<Arc<dyn JobClient>> {
        if let Some(probe) = self.observed.lock().unwrap().as_ref() {
            self.active_at_build.lock().unwrap().push(probe.active());
        }

        let job = self
            .templates
            .lock()
            .unwrap()
            .get(&descriptor.job_id)
            .cloned()
            .unwrap_or_else(|| MockJob::new(&descriptor.job_id).shared());

        self.built
            .lock()
            .unwrap()
            .insert(descriptor.job_id.clone(), job.clone());
        Ok(job as Arc<dyn JobClient>)
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Session wired to mocks and an in-memory channel
pub struct Harness {
    pub session: JobSession,
    pub messages: UnboundedReceiver<OutboundMessage>,
    pub inventory: Arc<MockInventory>,
    pub job_service: Arc<MockJobService>,
    pub factory: Arc<MockFactory>,
}

impl Harness {
    /// Poller does not start on initialize
    pub fn new() -> Self {
        Self::build(MockInventory::default(), Duration::from_secs(10), false)
    }

    pub fn with_inventory(inventory: MockInventory) -> Self {
        Self::build(inventory, Duration::from_secs(10), false)
    }

    /// Poller starts on initialize and sweeps every `interval`
    pub fn polling(inventory: MockInventory, interval: Duration) -> Self {
        Self::build(inventory, interval, true)
    }

    fn build(inventory: MockInventory, interval: Duration, start_poller: bool) -> Self {
        let inventory = Arc::new(inventory);
        let job_service = Arc::new(MockJobService::default());
        let factory = Arc::new(MockFactory::default());

        let services = Services {
            inventory: inventory.clone(),
            job_service: job_service.clone(),
            client_factory: factory.clone(),
        };

        let (channel, messages) = MemoryChannel::shared();
        let session = JobSession::builder(services)
            .channel(channel)
            .poll_interval(interval)
            .start_poller_on_init(start_poller)
            .build();

        Self {
            session,
            messages,
            inventory,
            job_service,
            factory,
        }
    }

    pub fn coordinator(&self) -> &Arc<JobCoordinator> {
        self.session.coordinator()
    }

    /// Register a job directly, bypassing initialization
    pub async fn register(&self, job: Arc<MockJob>) {
        let job_id = job.job_id().to_string();
        self.session.registry().register(job_id, job).await;
    }

    /// Every message sent so far
    pub fn drain(&mut self) -> Vec<OutboundMessage> {
        let mut drained = Vec::new();
        while let Ok(message) = self.messages.try_recv() {
            drained.push(message);
        }
        drained
    }

    /// Message types sent so far, in order
    pub fn drain_types(&mut self) -> Vec<&'static str> {
        self.drain().iter().map(OutboundMessage::msg_type).collect()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
