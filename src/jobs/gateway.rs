//! Message gateway between the engine and the front end
//!
//! The gateway owns the host channel. Its outbound half, the [`Outbox`], opens
//! the channel on first use and is shared by the coordinator and the poller.
//! The inbound half validates control requests and dispatches them.
//!
//! Requests from the front end are untrusted: a bad or stale job id, a missing
//! field, or a failing operation is answered with `job_comm_error` and never
//! raised. Only an unrecognized `request_type` is also signalled to the caller.

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, OnceCell};

use crate::error::{Error, Result};

use super::channel::{ChannelError, ChannelResult, CommChannel};
use super::coordinator::JobCoordinator;
use super::messages::{ControlRequest, OutboundMessage, RequestError};

// ============================================================================
// Outbox
// ============================================================================

type ChannelOpener = Box<dyn Fn() -> ChannelResult<Arc<dyn CommChannel>> + Send + Sync>;

/// Outbound half of the gateway
pub struct Outbox {
    opener: ChannelOpener,
    channel: OnceCell<Arc<dyn CommChannel>>,
}

impl Outbox {
    /// Create an outbox that opens its channel lazily on the first send
    pub fn new<F>(opener: F) -> Self
    where
        F: Fn() -> ChannelResult<Arc<dyn CommChannel>> + Send + Sync + 'static,
    {
        Self {
            opener: Box::new(opener),
            channel: OnceCell::new(),
        }
    }

    /// Create an outbox around an existing channel
    pub fn with_channel(channel: Arc<dyn CommChannel>) -> Self {
        Self::new(move || Ok(channel.clone()))
    }

    /// Check whether the channel has been opened
    pub fn is_open(&self) -> bool {
        self.channel.initialized()
    }

    /// Send a message, opening the channel if needed
    pub async fn send(&self, message: &OutboundMessage) -> ChannelResult<()> {
        let channel = self
            .channel
            .get_or_try_init(|| async {
                let channel = (self.opener)()?;
                tracing::debug!(channel = channel.name(), "Job channel opened");
                Ok::<_, ChannelError>(channel)
            })
            .await?;

        channel.send(message).await
    }

    /// Send a message, logging delivery failures
    pub async fn emit(&self, message: OutboundMessage) {
        if let Err(e) = self.send(&message).await {
            tracing::error!(
                msg_type = message.msg_type(),
                error = %e,
                "Failed to deliver job message"
            );
        }
    }
}

// ============================================================================
// Message Gateway
// ============================================================================

/// Inbound dispatch for front-end control requests
pub struct MessageGateway {
    coordinator: Arc<JobCoordinator>,
    outbox: Arc<Outbox>,
}

impl MessageGateway {
    pub fn new(coordinator: Arc<JobCoordinator>, outbox: Arc<Outbox>) -> Self {
        Self {
            coordinator,
            outbox,
        }
    }

    /// Outbound half
    pub fn outbox(&self) -> &Arc<Outbox> {
        &self.outbox
    }

    /// Handle one raw JSON message
    pub async fn handle_text(&self, raw: &str) -> Result<()> {
        match serde_json::from_str::<Value>(raw) {
            Ok(message) => self.handle(&message).await,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping undecodable job message");
                self.outbox
                    .emit(OutboundMessage::comm_error(
                        None,
                        format!("Malformed message: {e}"),
                        None,
                    ))
                    .await;
                Ok(())
            }
        }
    }

    /// Validate and dispatch one inbound message
    pub async fn handle(&self, message: &Value) -> Result<()> {
        let request = match ControlRequest::from_value(message) {
            Ok(request) => request,
            Err(RequestError::Unknown(request_type)) => {
                tracing::warn!(request_type = %request_type, "Unknown job request");
                self.outbox
                    .emit(OutboundMessage::comm_error(
                        None,
                        "Unknown message",
                        Some(&request_type),
                    ))
                    .await;
                return Err(Error::UnknownRequest(request_type));
            }
            Err(e) => {
                tracing::warn!(error = %e, "Rejecting malformed job request");
                self.outbox
                    .emit(OutboundMessage::comm_error(
                        e.job_id(),
                        e.to_string(),
                        e.request_type(),
                    ))
                    .await;
                return Ok(());
            }
        };

        if let Some(job_id) = request.job_id() {
            if !self.coordinator.registry().contains(job_id).await {
                tracing::warn!(
                    job_id = %job_id,
                    request_type = request.request_type(),
                    "Job request for unknown job id"
                );
                self.outbox
                    .emit(OutboundMessage::comm_error(
                        Some(job_id),
                        "Unknown job id",
                        Some(request.request_type()),
                    ))
                    .await;
                return Ok(());
            }
        }

        self.dispatch(request).await;
        Ok(())
    }

    /// Execute a validated request; failures become `job_comm_error`
    pub async fn dispatch(&self, request: ControlRequest) {
        let request_type = request.request_type();
        tracing::debug!(request_type, job_id = ?request.job_id(), "Dispatching job request");

        let result = match &request {
            ControlRequest::AllStatus => {
                self.coordinator.get_all_status(true).await;
                Ok(())
            }
            ControlRequest::JobStatus { job_id } => {
                self.coordinator.get_status(job_id).await.map(|_| ())
            }
            ControlRequest::StopUpdateLoop => {
                self.coordinator.poller().stop().await;
                Ok(())
            }
            ControlRequest::StartUpdateLoop => {
                self.coordinator.poller().start().await;
                Ok(())
            }
            ControlRequest::StopJobUpdate { job_id } => {
                self.coordinator.registry().set_refresh(job_id, false).await
            }
            ControlRequest::StartJobUpdate { job_id } => {
                self.coordinator.registry().set_refresh(job_id, true).await
            }
            ControlRequest::DeleteJob { job_id } => self.coordinator.delete(Some(job_id.as_str())).await,
            ControlRequest::CancelJob { job_id } => {
                self.coordinator.cancel(job_id).await.map(|_| ())
            }
            ControlRequest::JobLogs {
                job_id,
                first_line,
                num_lines,
            } => self
                .coordinator
                .get_logs(job_id, *first_line, *num_lines)
                .await
                .map(|_| ()),
            ControlRequest::JobLogsLatest { job_id, num_lines } => self
                .coordinator
                .get_latest_logs(job_id, *num_lines)
                .await
                .map(|_| ()),
        };

        if let Err(e) = result {
            tracing::error!(
                request_type,
                job_id = ?request.job_id(),
                error = %e,
                "Job request failed"
            );
            self.outbox
                .emit(OutboundMessage::comm_error(
                    request.job_id(),
                    e.to_string(),
                    Some(request_type),
                ))
                .await;
        }
    }

    /// Handle inbound messages until the sender side closes
    pub async fn run(&self, mut inbound: mpsc::Receiver<Value>) {
        while let Some(message) = inbound.recv().await {
            if let Err(e) = self.handle(&message).await {
                tracing::warn!(error = %e, "Job request rejected");
            }
        }
        tracing::debug!("Inbound job channel closed");
    }

    /// Handle raw inbound lines, in arrival order, until the sender side closes
    pub async fn run_text(&self, mut inbound: mpsc::Receiver<String>) {
        while let Some(line) = inbound.recv().await {
            if let Err(e) = self.handle_text(&line).await {
                tracing::warn!(error = %e, "Job request rejected");
            }
        }
        tracing::debug!("Inbound job channel closed");
    }
}
