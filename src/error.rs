//! Unified error handling for the jobsync crate
//!
//! This module provides the engine-level `Error` enum. Domain-specific errors
//! from the remote service adapters ([`ServiceError`]), the host channel
//! transports ([`ChannelError`]) and configuration ([`ConfigError`]) are
//! wrapped so they can cross module boundaries with a single `Result` type.
//!
//! # Architecture
//!
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum
//!
//! # Usage
//!
//! ```rust,ignore
//! use jobsync::error::{Error, ErrorCategory};
//!
//! fn report(err: &Error) {
//!     if err.category() == ErrorCategory::NotFound {
//!         tracing::warn!("stale job id: {err}");
//!     } else if err.is_recoverable() {
//!         tracing::warn!("retry later: {err}");
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

pub use crate::config::ConfigError;
pub use crate::jobs::channel::ChannelError;
pub use crate::services::ServiceError;

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Unknown job id
    NotFound,
    /// Missing or malformed argument
    InvalidArgument,
    /// Failure reported by (or while talking to) a remote service
    RemoteService,
    /// Unrecognized inbound request
    UnknownRequest,
    /// Host channel failures
    Channel,
    /// Configuration and validation errors
    Config,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Short label used in log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidArgument => "invalid_argument",
            Self::RemoteService => "remote_service",
            Self::UnknownRequest => "unknown_request",
            Self::Channel => "channel",
            Self::Config => "config",
            Self::Other => "other",
        }
    }
}

/// Unified error type for the jobsync crate
#[derive(Error, Debug)]
pub enum Error {
    /// No job with this id is registered
    #[error("No job present with id {0}")]
    NotFound(String),

    /// A required argument was missing or malformed
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A remote service call failed
    #[error("Remote service error during '{operation}': {source}")]
    RemoteService {
        operation: &'static str,
        #[source]
        source: ServiceError,
    },

    /// Inbound request type is not recognized
    #[error("Unknown job request type \"{0}\"")]
    UnknownRequest(String),

    /// Host channel errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wrap a remote failure with the operation that produced it
    pub fn remote(operation: &'static str, source: ServiceError) -> Self {
        Self::RemoteService { operation, source }
    }

    /// Create a not-found error for a job id
    pub fn not_found(job_id: impl Into<String>) -> Self {
        Self::NotFound(job_id.into())
    }

    /// Create an invalid-argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Get the error category for handling strategies
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound(_) => ErrorCategory::NotFound,
            Self::InvalidArgument(_) => ErrorCategory::InvalidArgument,
            Self::RemoteService { .. } => ErrorCategory::RemoteService,
            Self::UnknownRequest(_) => ErrorCategory::UnknownRequest,
            Self::Channel(_) => ErrorCategory::Channel,
            Self::Config(_) => ErrorCategory::Config,
            Self::Io(_) | Self::Json(_) => ErrorCategory::Other,
        }
    }

    /// Check if this error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::RemoteService { source, .. } => source.is_recoverable(),
            Self::Channel(_) => true,
            Self::Io(_) => true,
            Self::NotFound(_)
            | Self::InvalidArgument(_)
            | Self::UnknownRequest(_)
            | Self::Config(_)
            | Self::Json(_) => false,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
