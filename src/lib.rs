//! Core library for the Atlas instance lifecycle tool.
//!
//! The crate exposes an instance API abstraction, an HTTP implementation for
//! the Atlas service, and an orchestrator that drives instances through
//! create, stop, start and delete while polling until each transition
//! settles.

pub mod api;
pub mod atlas;
pub mod config;
pub mod credentials;
pub mod lifecycle;
#[cfg(test)]
pub mod test_helpers;
pub mod test_support;

pub use api::{
    ApiFuture, ApiResponse, Instance, InstanceApi, InstanceId, InstanceRequest,
    InstanceRequestBuilder, InstanceState, ProjectId, RequestValidationError,
};
pub use atlas::{AtlasClient, AtlasError};
pub use config::{AtlasConfig, ConfigError, CredentialSource};
pub use credentials::{ClientCredentials, CredentialError, CredentialProvider, StaticToken};
pub use lifecycle::{LifecycleError, LifecycleOrchestrator, Operation, PollPolicy};
