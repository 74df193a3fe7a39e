//! Collaborator contract for the remote instance service.
//!
//! The orchestrator only ever talks to an [`InstanceApi`]: it submits an
//! action and receives the HTTP status together with any decoded payload.
//! Deciding which statuses count as success is left to the caller.

mod ids;

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use ids::{InstanceId, ProjectId};

/// Lifecycle state reported by the service for an instance.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    /// Accepted but not yet scheduled.
    Pending,
    /// Being provisioned on a host.
    Provisioning,
    /// Powered on.
    Running,
    /// Shutting down after a stop request.
    Stopping,
    /// Powered off.
    Stopped,
    /// Booting after a start request.
    Starting,
    /// Being torn down after a delete request.
    Deleting,
    /// The requested instance type has no capacity left.
    #[serde(alias = "out-of-stock")]
    OutOfStock,
    /// Any state this client does not recognise.
    #[serde(other)]
    Unknown,
}

impl InstanceState {
    /// Wire name of the state.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Provisioning => "provisioning",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Deleting => "deleting",
            Self::OutOfStock => "out_of_stock",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_ascii_uppercase())
    }
}

/// Instance representation returned by the service.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Instance {
    /// Identifier assigned by the service.
    pub id: InstanceId,
    /// Name supplied at creation time.
    #[serde(default)]
    pub name: Option<String>,
    /// Instance type (for example `cpu.2x`).
    #[serde(default, rename = "type")]
    pub instance_type: Option<String>,
    /// Last state reported by the service.
    pub state: InstanceState,
}

/// Parameters required to create a new instance.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct InstanceRequest {
    /// Human readable instance name.
    pub name: String,
    /// Instance type to request (for example `cpu.2x`).
    #[serde(rename = "type")]
    pub instance_type: String,
    /// Whether the instance is ephemeral.
    pub ephemeral: bool,
}

impl InstanceRequest {
    /// Starts a builder for an [`InstanceRequest`].
    #[must_use]
    pub fn builder() -> InstanceRequestBuilder {
        InstanceRequestBuilder::new()
    }

    /// Validates the request, returning the first empty required field.
    ///
    /// # Errors
    ///
    /// Returns [`RequestValidationError::MissingField`] when `name` or
    /// `instance_type` is empty.
    pub fn validate(&self) -> Result<(), RequestValidationError> {
        if self.name.is_empty() {
            return Err(RequestValidationError::MissingField("name".to_owned()));
        }
        if self.instance_type.is_empty() {
            return Err(RequestValidationError::MissingField(
                "instance_type".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`InstanceRequest`] that trims inputs and validates on build.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstanceRequestBuilder {
    name: String,
    instance_type: String,
    ephemeral: bool,
}

impl Default for InstanceRequestBuilder {
    fn default() -> Self {
        Self {
            name: String::new(),
            instance_type: String::new(),
            ephemeral: true,
        }
    }
}

impl InstanceRequestBuilder {
    /// Creates an empty builder. Instances are ephemeral unless overridden.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the instance name.
    #[must_use]
    pub fn name(mut self, value: impl Into<String>) -> Self {
        self.name = value.into();
        self
    }

    /// Sets the instance type.
    #[must_use]
    pub fn instance_type(mut self, value: impl Into<String>) -> Self {
        self.instance_type = value.into();
        self
    }

    /// Sets the ephemeral flag.
    #[must_use]
    pub const fn ephemeral(mut self, value: bool) -> Self {
        self.ephemeral = value;
        self
    }

    /// Builds and validates the [`InstanceRequest`].
    ///
    /// # Errors
    ///
    /// Returns [`RequestValidationError::MissingField`] when a required field
    /// is empty after trimming.
    pub fn build(self) -> Result<InstanceRequest, RequestValidationError> {
        let request = InstanceRequest {
            name: self.name.trim().to_owned(),
            instance_type: self.instance_type.trim().to_owned(),
            ephemeral: self.ephemeral,
        };
        request.validate()?;
        Ok(request)
    }
}

/// Errors raised while building an [`InstanceRequest`].
#[derive(Debug, Error, Eq, PartialEq)]
pub enum RequestValidationError {
    /// Raised when a required field is empty.
    #[error("missing or empty field: {0}")]
    MissingField(String),
}

/// Status and optional payload returned for a single API call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ApiResponse<T> {
    /// HTTP status returned by the service.
    pub status: StatusCode,
    /// Decoded payload, present only for successful responses with a body.
    pub body: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Response carrying a decoded payload.
    #[must_use]
    pub const fn with_body(status: StatusCode, body: T) -> Self {
        Self {
            status,
            body: Some(body),
        }
    }

    /// Response without a payload.
    #[must_use]
    pub const fn empty(status: StatusCode) -> Self {
        Self { status, body: None }
    }
}

/// Future returned by [`InstanceApi`] operations.
pub type ApiFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<ApiResponse<T>, E>> + Send + 'a>>;

/// Minimal interface implemented by instance service clients.
///
/// Transport failures surface as `Err`; every response the service actually
/// produced, including error statuses, surfaces as `Ok`.
pub trait InstanceApi {
    /// Transport level error type returned by the client.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Submits a creation request.
    fn create_instance<'a>(
        &'a self,
        project: &'a ProjectId,
        request: &'a InstanceRequest,
    ) -> ApiFuture<'a, Instance, Self::Error>;

    /// Fetches the current representation of an instance.
    fn get_instance<'a>(
        &'a self,
        project: &'a ProjectId,
        id: &'a InstanceId,
    ) -> ApiFuture<'a, Instance, Self::Error>;

    /// Requests that a running instance be stopped.
    fn stop_instance<'a>(
        &'a self,
        project: &'a ProjectId,
        id: &'a InstanceId,
    ) -> ApiFuture<'a, (), Self::Error>;

    /// Requests that a stopped instance be started.
    fn start_instance<'a>(
        &'a self,
        project: &'a ProjectId,
        id: &'a InstanceId,
    ) -> ApiFuture<'a, (), Self::Error>;

    /// Requests deletion of an instance.
    fn delete_instance<'a>(
        &'a self,
        project: &'a ProjectId,
        id: &'a InstanceId,
    ) -> ApiFuture<'a, (), Self::Error>;
}
