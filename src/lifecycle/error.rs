//! Error types for the lifecycle orchestrator.

use std::fmt;

use thiserror::Error;

use crate::api::{InstanceId, RequestValidationError};

/// Lifecycle operation being performed, used to label errors and log events.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Operation {
    /// Instance creation.
    Create,
    /// Single status query.
    Status,
    /// Stop request.
    Stop,
    /// Start request.
    Start,
    /// Delete request.
    Delete,
}

impl Operation {
    /// Condition the operation waits for, rendered for log output.
    #[must_use]
    pub const fn target(self) -> &'static str {
        match self {
            Self::Create | Self::Start => "RUNNING",
            Self::Stop => "STOPPED",
            Self::Delete => "ABSENT",
            Self::Status => "ANY",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Status => "status",
            Self::Stop => "stop",
            Self::Start => "start",
            Self::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Errors surfaced while driving an instance through its lifecycle.
#[derive(Debug, Error)]
pub enum LifecycleError<TransportError>
where
    TransportError: std::error::Error + 'static,
{
    /// Raised when the creation request fails local validation.
    #[error("invalid instance request: {0}")]
    InvalidRequest(#[from] RequestValidationError),
    /// Raised when the service answers with an unexpected status.
    #[error("{operation} request failed: {status}")]
    Request {
        /// Operation whose request failed.
        operation: Operation,
        /// Raw status text returned by the service (for example `409 Conflict`).
        status: String,
    },
    /// Raised when a successful response lacks the expected payload.
    #[error("{operation} response did not include an instance")]
    MalformedResponse {
        /// Operation whose response was incomplete.
        operation: Operation,
    },
    /// Raised when the request never produced a response.
    #[error("{operation} request could not be sent: {source}")]
    Transport {
        /// Operation whose request failed.
        operation: Operation,
        /// Client specific error.
        #[source]
        source: TransportError,
    },
    /// Raised when the requested instance type cannot be provisioned.
    #[error("instance {instance_id} unavailable: instance type out of stock")]
    ResourceUnavailable {
        /// Instance that reported the out-of-stock state.
        instance_id: InstanceId,
        /// Instance type reported by the service, when known.
        instance_type: Option<String>,
    },
    /// Raised when polling exceeds the configured attempts or duration.
    #[error("timeout waiting for {operation} on instance {instance_id} after {attempts} polls")]
    Timeout {
        /// Operation being waited on.
        operation: Operation,
        /// Instance being polled.
        instance_id: InstanceId,
        /// Number of status queries issued after waiting.
        attempts: u32,
    },
    /// Raised when the caller cancels the operation.
    #[error("{operation} cancelled")]
    Cancelled {
        /// Operation that was interrupted.
        operation: Operation,
        /// Instance involved, if one had been assigned.
        instance_id: Option<InstanceId>,
    },
}
