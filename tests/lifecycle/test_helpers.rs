//! Shared fixtures for lifecycle BDD scenarios.

use std::time::Duration;

use atlas_lifecycle::test_support::ScriptedApi;
use atlas_lifecycle::{InstanceRequest, InstanceState, LifecycleError, PollPolicy, ProjectId};
use rstest::fixture;
use thiserror::Error;

pub const PROJECT: &str = "0b8f7e2a-4d1c-4a8e-9f3b-2c6d5e4f3a21";
pub const INSTANCE_ID: &str = "inst-1";

#[derive(Clone, Debug)]
pub struct LifecycleContext {
    pub api: ScriptedApi,
    pub project: ProjectId,
    pub policy: PollPolicy,
    pub request: InstanceRequest,
    pub outcome: Option<LifecycleOutcome>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FailureKind {
    InvalidRequest,
    Request,
    MalformedResponse,
    Transport,
    ResourceUnavailable,
    Timeout,
    Cancelled,
}

impl FailureKind {
    pub fn of<E>(err: &LifecycleError<E>) -> Self
    where
        E: std::error::Error + 'static,
    {
        match err {
            LifecycleError::InvalidRequest(_) => Self::InvalidRequest,
            LifecycleError::Request { .. } => Self::Request,
            LifecycleError::MalformedResponse { .. } => Self::MalformedResponse,
            LifecycleError::Transport { .. } => Self::Transport,
            LifecycleError::ResourceUnavailable { .. } => Self::ResourceUnavailable,
            LifecycleError::Timeout { .. } => Self::Timeout,
            LifecycleError::Cancelled { .. } => Self::Cancelled,
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        Some(match label {
            "invalid-request" => Self::InvalidRequest,
            "request" => Self::Request,
            "malformed-response" => Self::MalformedResponse,
            "transport" => Self::Transport,
            "resource-unavailable" => Self::ResourceUnavailable,
            "timeout" => Self::Timeout,
            "cancelled" => Self::Cancelled,
            _ => return None,
        })
    }
}

#[derive(Clone, Debug)]
pub enum LifecycleOutcome {
    Success { state: Option<InstanceState> },
    Failure { kind: FailureKind, message: String },
}

#[derive(Clone, Debug, Error)]
pub enum LifecycleTestError {
    #[error("invalid lifecycle fixture: {0}")]
    Fixture(String),
}

#[fixture]
pub fn lifecycle_context_result() -> Result<LifecycleContext, LifecycleTestError> {
    build_lifecycle_context()
}

#[fixture]
pub fn lifecycle_context(
    lifecycle_context_result: Result<LifecycleContext, LifecycleTestError>,
) -> LifecycleContext {
    lifecycle_context_result
        .unwrap_or_else(|err| panic!("lifecycle context fixture should initialise: {err}"))
}

fn build_lifecycle_context() -> Result<LifecycleContext, LifecycleTestError> {
    let project = ProjectId::new(PROJECT)
        .ok_or_else(|| LifecycleTestError::Fixture(String::from("empty project id")))?;
    let policy = PollPolicy::new(Duration::from_secs(5))
        .map_err(|err| LifecycleTestError::Fixture(err.to_string()))?;
    let request = InstanceRequest::builder()
        .name("example-instance-01")
        .instance_type("cpu.2x")
        .build()
        .map_err(|err| LifecycleTestError::Fixture(err.to_string()))?;

    Ok(LifecycleContext {
        api: ScriptedApi::new(),
        project,
        policy,
        request,
        outcome: None,
    })
}

pub fn parse_state(label: &str) -> InstanceState {
    serde_json::from_value(serde_json::Value::String(label.to_owned()))
        .unwrap_or(InstanceState::Unknown)
}
