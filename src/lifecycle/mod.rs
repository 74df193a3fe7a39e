//! Lifecycle orchestration for remote instances.
//!
//! Each operation submits one action request, checks the acknowledgment
//! status, and then polls the instance until it reaches the state the
//! operation waits for. Polling is bounded by a [`PollPolicy`] and every
//! request and wait races the caller's [`CancellationToken`].

mod error;
mod poll;

use std::future::Future;

use reqwest::StatusCode;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{
    ApiResponse, Instance, InstanceApi, InstanceId, InstanceRequest, InstanceState, ProjectId,
};

pub use error::{LifecycleError, Operation};
pub use poll::{DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT, PollPolicy, PollPolicyError};

/// Result of a single observation during a convergence wait.
enum Progress<T> {
    Done(T),
    Waiting(InstanceState),
}

/// Drives instances within one project scope through create, stop, start
/// and delete.
#[derive(Debug)]
pub struct LifecycleOrchestrator<A> {
    api: A,
    project: ProjectId,
    policy: PollPolicy,
}

impl<A> LifecycleOrchestrator<A>
where
    A: InstanceApi,
{
    /// Creates an orchestrator using the default [`PollPolicy`].
    #[must_use]
    pub fn new(api: A, project: ProjectId) -> Self {
        Self {
            api,
            project,
            policy: PollPolicy::default(),
        }
    }

    /// Overrides the polling policy.
    #[must_use]
    pub const fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Underlying API client.
    #[must_use]
    pub const fn api(&self) -> &A {
        &self.api
    }

    /// Project scope sent with every request.
    #[must_use]
    pub const fn project(&self) -> &ProjectId {
        &self.project
    }

    /// Creates an instance and waits until it is running.
    ///
    /// When the service reports the instance type as out of stock, the
    /// partially created instance is deleted on a best-effort basis before
    /// the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Request`] when creation is not acknowledged
    /// with `201 Created` or a status query does not return `200 OK`,
    /// [`LifecycleError::ResourceUnavailable`] when the type is out of stock,
    /// and [`LifecycleError::Timeout`] or [`LifecycleError::Cancelled`] when
    /// the wait is cut short.
    pub async fn create(
        &self,
        request: &InstanceRequest,
        cancel: &CancellationToken,
    ) -> Result<Instance, LifecycleError<A::Error>> {
        request.validate()?;
        info!(
            name = %request.name,
            instance_type = %request.instance_type,
            "creating instance"
        );

        let response = self
            .call(
                Operation::Create,
                None,
                cancel,
                self.api.create_instance(&self.project, request),
            )
            .await?;
        let instance = expect_body(Operation::Create, StatusCode::CREATED, response)?;
        let id = instance.id.clone();
        info!(instance_id = %id, "created instance");

        let outcome = match running_or_unavailable(instance) {
            Ok(progress) => {
                self.converge(Operation::Create, &id, cancel, progress, || {
                    self.creation_progress(&id, cancel)
                })
                .await
            }
            Err(err) => Err(err),
        };

        match outcome {
            Ok(instance) => {
                info!(instance_id = %id, "started instance");
                Ok(instance)
            }
            Err(err @ LifecycleError::ResourceUnavailable { .. }) => {
                warn!(instance_id = %id, "instance type out of stock; deleting instance");
                if let Err(cleanup) = self.delete(&id, cancel).await {
                    warn!(instance_id = %id, error = %cleanup, "failed to delete instance");
                }
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Fetches the current representation of an instance.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Request`] when the service does not answer
    /// with `200 OK`.
    pub async fn status(
        &self,
        id: &InstanceId,
        cancel: &CancellationToken,
    ) -> Result<Instance, LifecycleError<A::Error>> {
        self.observe(Operation::Status, id, cancel).await
    }

    /// Stops an instance and waits until it reports `stopped`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Request`] when the stop request is not
    /// acknowledged with `202 Accepted` or a status query fails, and
    /// [`LifecycleError::Timeout`] or [`LifecycleError::Cancelled`] when the
    /// wait is cut short.
    pub async fn stop(
        &self,
        id: &InstanceId,
        cancel: &CancellationToken,
    ) -> Result<(), LifecycleError<A::Error>> {
        info!(instance_id = %id, "stopping instance");
        let response = self
            .call(
                Operation::Stop,
                Some(id),
                cancel,
                self.api.stop_instance(&self.project, id),
            )
            .await?;
        expect_status(Operation::Stop, StatusCode::ACCEPTED, response)?;

        let first = self.stop_progress(id, cancel).await?;
        self.converge(Operation::Stop, id, cancel, first, || {
            self.stop_progress(id, cancel)
        })
        .await?;
        info!(instance_id = %id, "stopped instance");
        Ok(())
    }

    /// Starts a stopped instance and waits until it reports `running`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Request`] when the start request is not
    /// acknowledged with `202 Accepted` or a status query fails,
    /// [`LifecycleError::ResourceUnavailable`] when the service has no
    /// capacity to start it, and [`LifecycleError::Timeout`] or
    /// [`LifecycleError::Cancelled`] when the wait is cut short.
    pub async fn start(
        &self,
        id: &InstanceId,
        cancel: &CancellationToken,
    ) -> Result<Instance, LifecycleError<A::Error>> {
        info!(instance_id = %id, "starting instance");
        let response = self
            .call(
                Operation::Start,
                Some(id),
                cancel,
                self.api.start_instance(&self.project, id),
            )
            .await?;
        expect_status(Operation::Start, StatusCode::ACCEPTED, response)?;

        let first = self.start_progress(id, cancel).await?;
        let instance = self
            .converge(Operation::Start, id, cancel, first, || {
                self.start_progress(id, cancel)
            })
            .await?;
        info!(instance_id = %id, "started instance");
        Ok(instance)
    }

    /// Deletes an instance and waits until the service no longer knows it.
    ///
    /// A `404 Not Found` status query counts as success, including the first
    /// query after the delete request.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Request`] when the delete request is not
    /// acknowledged with `204 No Content` or a status query returns anything
    /// other than `200 OK` or `404 Not Found`, and
    /// [`LifecycleError::Timeout`] or [`LifecycleError::Cancelled`] when the
    /// wait is cut short.
    pub async fn delete(
        &self,
        id: &InstanceId,
        cancel: &CancellationToken,
    ) -> Result<(), LifecycleError<A::Error>> {
        info!(instance_id = %id, "deleting instance");
        let response = self
            .call(
                Operation::Delete,
                Some(id),
                cancel,
                self.api.delete_instance(&self.project, id),
            )
            .await?;
        expect_status(Operation::Delete, StatusCode::NO_CONTENT, response)?;

        let first = self.deletion_progress(id, cancel).await?;
        self.converge(Operation::Delete, id, cancel, first, || {
            self.deletion_progress(id, cancel)
        })
        .await?;
        info!(instance_id = %id, "deleted instance");
        Ok(())
    }

    /// Runs create, stop, start and delete in sequence, stopping at the
    /// first failure. Returns the identifier of the instance that was
    /// created and removed.
    ///
    /// # Errors
    ///
    /// Returns the first [`LifecycleError`] raised by any step.
    pub async fn run_lifecycle(
        &self,
        request: &InstanceRequest,
        cancel: &CancellationToken,
    ) -> Result<InstanceId, LifecycleError<A::Error>> {
        let instance = self.create(request, cancel).await?;
        self.stop(&instance.id, cancel).await?;
        self.start(&instance.id, cancel).await?;
        self.delete(&instance.id, cancel).await?;
        Ok(instance.id)
    }

    async fn converge<T, F, Fut>(
        &self,
        operation: Operation,
        id: &InstanceId,
        cancel: &CancellationToken,
        first: Progress<T>,
        mut observe: F,
    ) -> Result<T, LifecycleError<A::Error>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Progress<T>, LifecycleError<A::Error>>>,
    {
        let started = Instant::now();
        let mut attempts: u32 = 0;
        let mut progress = first;

        loop {
            let current = match progress {
                Progress::Done(value) => return Ok(value),
                Progress::Waiting(current) => current,
            };

            if cancel.is_cancelled() {
                return Err(cancelled(operation, Some(id)));
            }
            if self.policy.exhausted(attempts, started.elapsed()) {
                return Err(LifecycleError::Timeout {
                    operation,
                    instance_id: id.clone(),
                    attempts,
                });
            }

            info!(
                instance_id = %id,
                current = %current,
                target = operation.target(),
                "waiting for instance"
            );
            self.pause(operation, id, cancel).await?;
            attempts = attempts.saturating_add(1);
            progress = observe().await?;
        }
    }

    async fn pause(
        &self,
        operation: Operation,
        id: &InstanceId,
        cancel: &CancellationToken,
    ) -> Result<(), LifecycleError<A::Error>> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(cancelled(operation, Some(id))),
            () = sleep(self.policy.interval()) => Ok(()),
        }
    }

    async fn call<T, Fut>(
        &self,
        operation: Operation,
        id: Option<&InstanceId>,
        cancel: &CancellationToken,
        request: Fut,
    ) -> Result<ApiResponse<T>, LifecycleError<A::Error>>
    where
        Fut: Future<Output = Result<ApiResponse<T>, A::Error>>,
    {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(cancelled(operation, id)),
            result = request => result.map_err(|source| LifecycleError::Transport { operation, source }),
        }
    }

    async fn observe(
        &self,
        operation: Operation,
        id: &InstanceId,
        cancel: &CancellationToken,
    ) -> Result<Instance, LifecycleError<A::Error>> {
        let response = self
            .call(
                operation,
                Some(id),
                cancel,
                self.api.get_instance(&self.project, id),
            )
            .await?;
        let instance = expect_body(operation, StatusCode::OK, response)?;
        debug!(instance_id = %id, state = %instance.state, "observed instance");
        Ok(instance)
    }

    async fn creation_progress(
        &self,
        id: &InstanceId,
        cancel: &CancellationToken,
    ) -> Result<Progress<Instance>, LifecycleError<A::Error>> {
        let instance = self.observe(Operation::Create, id, cancel).await?;
        running_or_unavailable(instance)
    }

    async fn start_progress(
        &self,
        id: &InstanceId,
        cancel: &CancellationToken,
    ) -> Result<Progress<Instance>, LifecycleError<A::Error>> {
        let instance = self.observe(Operation::Start, id, cancel).await?;
        running_or_unavailable(instance)
    }

    async fn stop_progress(
        &self,
        id: &InstanceId,
        cancel: &CancellationToken,
    ) -> Result<Progress<()>, LifecycleError<A::Error>> {
        let instance = self.observe(Operation::Stop, id, cancel).await?;
        Ok(match instance.state {
            InstanceState::Stopped => Progress::Done(()),
            other => Progress::Waiting(other),
        })
    }

    async fn deletion_progress(
        &self,
        id: &InstanceId,
        cancel: &CancellationToken,
    ) -> Result<Progress<()>, LifecycleError<A::Error>> {
        let response = self
            .call(
                Operation::Delete,
                Some(id),
                cancel,
                self.api.get_instance(&self.project, id),
            )
            .await?;
        match response.status {
            StatusCode::NOT_FOUND => Ok(Progress::Done(())),
            StatusCode::OK => Ok(Progress::Waiting(
                response
                    .body
                    .map_or(InstanceState::Unknown, |instance| instance.state),
            )),
            other => Err(LifecycleError::Request {
                operation: Operation::Delete,
                status: other.to_string(),
            }),
        }
    }
}

fn running_or_unavailable<E>(instance: Instance) -> Result<Progress<Instance>, LifecycleError<E>>
where
    E: std::error::Error + 'static,
{
    match instance.state {
        InstanceState::Running => Ok(Progress::Done(instance)),
        InstanceState::OutOfStock => Err(LifecycleError::ResourceUnavailable {
            instance_id: instance.id,
            instance_type: instance.instance_type,
        }),
        other => Ok(Progress::Waiting(other)),
    }
}

fn expect_status<T, E>(
    operation: Operation,
    expected: StatusCode,
    response: ApiResponse<T>,
) -> Result<Option<T>, LifecycleError<E>>
where
    E: std::error::Error + 'static,
{
    if response.status != expected {
        return Err(LifecycleError::Request {
            operation,
            status: response.status.to_string(),
        });
    }
    Ok(response.body)
}

fn expect_body<T, E>(
    operation: Operation,
    expected: StatusCode,
    response: ApiResponse<T>,
) -> Result<T, LifecycleError<E>>
where
    E: std::error::Error + 'static,
{
    expect_status(operation, expected, response)?
        .ok_or(LifecycleError::MalformedResponse { operation })
}

fn cancelled<E>(operation: Operation, id: Option<&InstanceId>) -> LifecycleError<E>
where
    E: std::error::Error + 'static,
{
    LifecycleError::Cancelled {
        operation,
        instance_id: id.cloned(),
    }
}
