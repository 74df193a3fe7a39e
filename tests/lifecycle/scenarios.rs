//! BDD scenarios for the lifecycle orchestrator.

use rstest_bdd_macros::scenario;

use super::test_helpers::{LifecycleContext, LifecycleTestError, lifecycle_context_result};

type LifecycleContextResult = Result<LifecycleContext, LifecycleTestError>;

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Create waits until the instance is running"
)]
fn scenario_create_waits(lifecycle_context_result: LifecycleContextResult) {
    drop(lifecycle_context_result);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Out of stock creation is cleaned up"
)]
fn scenario_out_of_stock(lifecycle_context_result: LifecycleContextResult) {
    drop(lifecycle_context_result);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Delete treats a vanished instance as success"
)]
fn scenario_delete_not_found(lifecycle_context_result: LifecycleContextResult) {
    drop(lifecycle_context_result);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Full lifecycle runs every step in order"
)]
fn scenario_full_lifecycle(lifecycle_context_result: LifecycleContextResult) {
    drop(lifecycle_context_result);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Waiting gives up after the attempt limit"
)]
fn scenario_attempt_limit(lifecycle_context_result: LifecycleContextResult) {
    drop(lifecycle_context_result);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Unexpected acknowledgment status is reported"
)]
fn scenario_rejected_ack(lifecycle_context_result: LifecycleContextResult) {
    drop(lifecycle_context_result);
}
