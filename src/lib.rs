//! jobsync - Remote job tracking and status synchronization
//!
//! Keeps an in-memory registry of remote jobs bound to a workspace, polls the
//! job service for their status, and reconciles that state with a front end
//! over a bidirectional message channel.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`error`] - Error types and classification
//! - [`jobs`] - Registry, status poller, message gateway, and coordinator
//! - [`services`] - Remote service capabilities and their HTTP adapters
//! - [`session`] - Per-session wiring of the engine components
//!
//! # Example
//!
//! ```no_run
//! use jobsync::config::Config;
//! use jobsync::jobs::MemoryChannel;
//! use jobsync::session::JobSession;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let (channel, _messages) = MemoryChannel::shared();
//!     let session = JobSession::from_config(&config, channel)?;
//!     session.coordinator().initialize("12345").await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod jobs;
pub mod services;
pub mod session;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::jobs::{
        CommChannel, ControlRequest, JobClient, JobCoordinator, JobRegistry, JobStage, JobState,
        MessageGateway, OutboundMessage, StatusPoller,
    };
    pub use crate::services::{JobClientFactory, JobDescriptor, JobInventory, JobService};
    pub use crate::session::JobSession;
}
