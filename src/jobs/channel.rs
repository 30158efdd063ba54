//! Host channel transports
//!
//! A [`CommChannel`] delivers outbound messages to the front end. The engine
//! does not care about the encoding; this module provides an in-memory
//! transport, a JSON-lines transport over any async writer (stdout in the
//! binary), and a transport that only logs.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};

use super::messages::OutboundMessage;

/// Result type for channel operations
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Errors that can occur during channel operations
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The channel could not be opened
    #[error("Failed to open channel: {0}")]
    Open(String),

    /// The receiving side has gone away
    #[error("Channel closed")]
    Closed,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Write error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outbound transport to the front end
#[async_trait]
pub trait CommChannel: Send + Sync {
    /// Transport name for logs
    fn name(&self) -> &str;

    /// Deliver one message
    async fn send(&self, message: &OutboundMessage) -> ChannelResult<()>;
}

// ============================================================================
// Memory Channel
// ============================================================================

/// In-process channel backed by an unbounded mpsc queue
#[derive(Clone)]
pub struct MemoryChannel {
    tx: mpsc::UnboundedSender<OutboundMessage>,
}

impl MemoryChannel {
    /// Create the channel and the receiver the front end reads from
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Same as [`MemoryChannel::new`], boxed for an outbox
    pub fn shared() -> (Arc<dyn CommChannel>, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (channel, rx) = Self::new();
        (Arc::new(channel), rx)
    }
}

#[async_trait]
impl CommChannel for MemoryChannel {
    fn name(&self) -> &str {
        "memory"
    }

    async fn send(&self, message: &OutboundMessage) -> ChannelResult<()> {
        self.tx.send(message.clone()).map_err(|_| ChannelError::Closed)
    }
}

// ============================================================================
// JSON Lines Channel
// ============================================================================

/// Writes one JSON document per line
pub struct JsonLinesChannel<W> {
    writer: Mutex<W>,
}

impl<W> JsonLinesChannel<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Consume the channel and return the writer
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl JsonLinesChannel<tokio::io::Stdout> {
    /// Channel writing to the process stdout
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

#[async_trait]
impl<W> CommChannel for JsonLinesChannel<W>
where
    W: AsyncWrite + Unpin + Send,
{
    fn name(&self) -> &str {
        "json-lines"
    }

    async fn send(&self, message: &OutboundMessage) -> ChannelResult<()> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }
}

// ============================================================================
// Log Channel
// ============================================================================

/// Channel that only records messages in the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogChannel;

#[async_trait]
impl CommChannel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, message: &OutboundMessage) -> ChannelResult<()> {
        let content = serde_json::to_string(message)?;
        tracing::debug!(msg_type = message.msg_type(), %content, "Job message");
        Ok(())
    }
}
