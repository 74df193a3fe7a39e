//! BDD step definitions for the lifecycle orchestrator.

use atlas_lifecycle::test_support::CallKind;
use atlas_lifecycle::{ApiResponse, InstanceId, LifecycleOrchestrator};
use reqwest::StatusCode;
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::{Builder, Runtime};
use tokio_util::sync::CancellationToken;

use super::test_helpers::{
    FailureKind, INSTANCE_ID, LifecycleContext, LifecycleOutcome, parse_state,
};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[derive(Clone, Copy, Debug)]
enum Step {
    Create,
    Delete,
    Run,
}

#[given("an instance service")]
fn instance_service(lifecycle_context: LifecycleContext) -> LifecycleContext {
    lifecycle_context
}

#[given("polling allows {attempts} attempts")]
fn polling_allows(mut lifecycle_context: LifecycleContext, attempts: u32) -> LifecycleContext {
    lifecycle_context.policy = lifecycle_context.policy.with_max_attempts(Some(attempts));
    lifecycle_context
}

#[given("creation is acknowledged with state \"{state}\"")]
fn creation_acknowledged(lifecycle_context: LifecycleContext, state: String) -> LifecycleContext {
    lifecycle_context
        .api
        .push_created(INSTANCE_ID, parse_state(&state));
    lifecycle_context
}

#[given("creation is rejected with status {status}")]
fn creation_rejected(lifecycle_context: LifecycleContext, status: u16) -> LifecycleContext {
    let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    lifecycle_context.api.push_create(Ok(ApiResponse::empty(code)));
    lifecycle_context
}

#[given("the next status query reports \"{state}\"")]
fn status_reports(lifecycle_context: LifecycleContext, state: String) -> LifecycleContext {
    lifecycle_context
        .api
        .push_state(INSTANCE_ID, parse_state(&state));
    lifecycle_context
}

#[given("the next status query is not found")]
fn status_not_found(lifecycle_context: LifecycleContext) -> LifecycleContext {
    lifecycle_context.api.push_get_status(StatusCode::NOT_FOUND);
    lifecycle_context
}

#[given("stopping is acknowledged")]
fn stopping_acknowledged(lifecycle_context: LifecycleContext) -> LifecycleContext {
    lifecycle_context.api.push_stop(StatusCode::ACCEPTED);
    lifecycle_context
}

#[given("starting is acknowledged")]
fn starting_acknowledged(lifecycle_context: LifecycleContext) -> LifecycleContext {
    lifecycle_context.api.push_start(StatusCode::ACCEPTED);
    lifecycle_context
}

#[given("deletion is acknowledged")]
fn deletion_acknowledged(lifecycle_context: LifecycleContext) -> LifecycleContext {
    lifecycle_context.api.push_delete(StatusCode::NO_CONTENT);
    lifecycle_context
}

#[when("I create the instance")]
fn create_instance(lifecycle_context: LifecycleContext) -> Result<LifecycleContext, StepError> {
    drive(lifecycle_context, Step::Create)
}

#[when("I delete the instance")]
fn delete_instance(lifecycle_context: LifecycleContext) -> Result<LifecycleContext, StepError> {
    drive(lifecycle_context, Step::Delete)
}

#[when("I run the full lifecycle")]
fn run_lifecycle(lifecycle_context: LifecycleContext) -> Result<LifecycleContext, StepError> {
    drive(lifecycle_context, Step::Run)
}

#[then("the lifecycle succeeds")]
fn lifecycle_succeeds(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    match lifecycle_context.outcome {
        Some(LifecycleOutcome::Success { .. }) => Ok(()),
        Some(LifecycleOutcome::Failure { ref message, .. }) => Err(StepError::Assertion(
            format!("expected success, got failure: {message}"),
        )),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

#[then("the lifecycle succeeds with state \"{state}\"")]
fn lifecycle_succeeds_with_state(
    lifecycle_context: &LifecycleContext,
    state: String,
) -> Result<(), StepError> {
    lifecycle_succeeds(lifecycle_context)?;
    let Some(LifecycleOutcome::Success {
        state: Some(actual),
    }) = &lifecycle_context.outcome
    else {
        return Err(StepError::Assertion(String::from(
            "expected a final instance state",
        )));
    };
    if actual.to_string() == state {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected state {state}, got {actual}"
        )))
    }
}

#[then("the lifecycle fails with \"{kind}\"")]
fn lifecycle_fails_with(lifecycle_context: &LifecycleContext, kind: String) -> Result<(), StepError> {
    let expected = FailureKind::parse(&kind)
        .ok_or_else(|| StepError::Assertion(format!("unknown failure kind {kind}")))?;
    let Some(LifecycleOutcome::Failure {
        kind: actual,
        message,
    }) = &lifecycle_context.outcome
    else {
        return Err(StepError::Assertion(String::from(
            "expected failure outcome",
        )));
    };
    if *actual == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected failure kind {expected:?}, got {actual:?}: {message}"
        )))
    }
}

#[then("the service received {count} status queries")]
fn status_queries(lifecycle_context: &LifecycleContext, count: usize) -> Result<(), StepError> {
    expect_calls(lifecycle_context, CallKind::Get, count)
}

#[then("the service received {count} delete requests")]
fn delete_requests(lifecycle_context: &LifecycleContext, count: usize) -> Result<(), StepError> {
    expect_calls(lifecycle_context, CallKind::Delete, count)
}

fn expect_calls(
    lifecycle_context: &LifecycleContext,
    kind: CallKind,
    expected: usize,
) -> Result<(), StepError> {
    let actual = lifecycle_context.api.count(kind);
    if actual == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {expected} {kind:?} calls, got {actual}"
        )))
    }
}

fn paused_runtime() -> Result<Runtime, StepError> {
    Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .map_err(|err| StepError::Assertion(err.to_string()))
}

fn drive(lifecycle_context: LifecycleContext, step: Step) -> Result<LifecycleContext, StepError> {
    let runtime = paused_runtime()?;
    let orchestrator = LifecycleOrchestrator::new(
        lifecycle_context.api.clone(),
        lifecycle_context.project.clone(),
    )
    .with_poll_policy(lifecycle_context.policy);
    let request = lifecycle_context.request.clone();
    let id = InstanceId::from(INSTANCE_ID);
    let cancel = CancellationToken::new();

    let result = runtime.block_on(async {
        match step {
            Step::Create => orchestrator
                .create(&request, &cancel)
                .await
                .map(|instance| Some(instance.state)),
            Step::Delete => orchestrator.delete(&id, &cancel).await.map(|()| None),
            Step::Run => orchestrator
                .run_lifecycle(&request, &cancel)
                .await
                .map(|_| None),
        }
    });

    let outcome = match result {
        Ok(state) => LifecycleOutcome::Success { state },
        Err(err) => LifecycleOutcome::Failure {
            kind: FailureKind::of(&err),
            message: err.to_string(),
        },
    };

    Ok(LifecycleContext {
        outcome: Some(outcome),
        ..lifecycle_context
    })
}
