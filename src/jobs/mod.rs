//! Job management engine
//!
//! Tracks the remote jobs bound to a workspace and keeps a front end informed
//! about them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  control requests   ┌──────────────────┐
//! │    Front end     │ ──────────────────▶ │  MessageGateway  │
//! │                  │ ◀────── Outbox ──── │                  │
//! └──────────────────┘                     └────────┬─────────┘
//!                                                   │
//!                                          ┌────────▼─────────┐
//!                     ┌─────────────────── │  JobCoordinator  │ ─── remote services
//!                     │                    └────────┬─────────┘
//!            ┌────────▼─────────┐          ┌────────▼─────────┐
//!            │   StatusPoller   │ ───────▶ │   JobRegistry    │
//!            └──────────────────┘          └──────────────────┘
//! ```
//!
//! - [`JobRegistry`]: job id to client map, plus a per-job refresh flag
//! - [`StatusPoller`]: periodic status sweep emitting `job_status_all`
//! - [`MessageGateway`]: validates and dispatches inbound control requests
//! - [`JobCoordinator`]: initialize, status, cancel, delete, and log operations
//!
//! # Usage
//!
//! ```rust,ignore
//! use jobsync::session::JobSession;
//!
//! let session = JobSession::from_config(&config)?;
//! session.coordinator().initialize("12345").await?;
//! session.gateway().handle(&serde_json::json!({"request_type": "all_status"})).await?;
//! ```

pub mod channel;
pub mod client;
pub mod coordinator;
pub mod gateway;
pub mod messages;
pub mod poller;
pub mod registry;
pub mod state;
pub mod summary;

pub use channel::{ChannelError, ChannelResult, CommChannel, JsonLinesChannel, LogChannel, MemoryChannel};
pub use client::{fetch_status, JobClient};
pub use coordinator::{CancelOutcome, InitReport, JobCoordinator, JobLogs, JobRef, Services};
pub use gateway::{MessageGateway, Outbox};
pub use messages::{ControlRequest, OutboundMessage, RequestError};
pub use poller::{StatusPoller, DEFAULT_POLL_INTERVAL};
pub use registry::{JobRecord, JobRegistry};
pub use state::{JobStage, JobState, JobStatus, LogLine, StatusSnapshot};
pub use summary::{JobRow, JobTable};
