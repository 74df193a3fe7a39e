//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use reqwest::StatusCode;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

use crate::api::{
    ApiFuture, ApiResponse, Instance, InstanceApi, InstanceId, InstanceRequest, InstanceState,
    ProjectId,
};

/// Kind of request recorded by [`ScriptedApi`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CallKind {
    /// `POST instances`.
    Create,
    /// `GET instances/{id}`.
    Get,
    /// `POST instances/{id}/actions/stop`.
    Stop,
    /// `POST instances/{id}/actions/start`.
    Start,
    /// `DELETE instances/{id}`.
    Delete,
}

/// Records a single request made through [`ScriptedApi`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ApiCall {
    /// Request kind.
    pub kind: CallKind,
    /// Project scope passed with the request.
    pub project: ProjectId,
    /// Target instance, absent for creation.
    pub instance_id: Option<InstanceId>,
    /// Time the request was issued, on the tokio clock.
    pub at: Instant,
}

/// Errors produced by [`ScriptedApi`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ScriptedApiError {
    /// Raised when a request arrives with no scripted response left.
    #[error("no scripted response for {0:?}")]
    Exhausted(CallKind),
    /// Simulated network failure.
    #[error("simulated transport failure")]
    Transport,
}

/// Outcome queued for one scripted request.
pub type Scripted<T> = Result<ApiResponse<T>, ScriptedApiError>;

#[derive(Debug, Default)]
struct Script {
    create: VecDeque<Scripted<Instance>>,
    get: VecDeque<Scripted<Instance>>,
    stop: VecDeque<Scripted<()>>,
    start: VecDeque<Scripted<()>>,
    delete: VecDeque<Scripted<()>>,
    calls: Vec<ApiCall>,
}

/// Scripted [`InstanceApi`] that returns pre-seeded responses in FIFO order
/// per request kind and records every call.
///
/// Clones share the same script, so a test can keep a handle after moving
/// one into an orchestrator.
#[derive(Clone, Debug, Default)]
pub struct ScriptedApi {
    script: Arc<StdMutex<Script>>,
}

/// Builds an instance representation for scripting responses.
#[must_use]
pub fn instance(id: &str, state: InstanceState) -> Instance {
    Instance {
        id: InstanceId::from(id),
        name: None,
        instance_type: None,
        state,
    }
}

impl ScriptedApi {
    /// Creates an API double with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_script<T>(&self, f: impl FnOnce(&mut Script) -> T) -> T {
        let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut script)
    }

    /// Queues a `201 Created` acknowledgment carrying an instance in `state`.
    pub fn push_created(&self, id: &str, state: InstanceState) {
        self.push_create(Ok(ApiResponse::with_body(
            StatusCode::CREATED,
            instance(id, state),
        )));
    }

    /// Queues an arbitrary creation outcome.
    pub fn push_create(&self, response: Scripted<Instance>) {
        self.with_script(|script| script.create.push_back(response));
    }

    /// Queues a `200 OK` status query returning `state`.
    pub fn push_state(&self, id: &str, state: InstanceState) {
        self.push_get(Ok(ApiResponse::with_body(StatusCode::OK, instance(id, state))));
    }

    /// Queues a bodiless status query answer with `status`.
    pub fn push_get_status(&self, status: StatusCode) {
        self.push_get(Ok(ApiResponse::empty(status)));
    }

    /// Queues an arbitrary status query outcome.
    pub fn push_get(&self, response: Scripted<Instance>) {
        self.with_script(|script| script.get.push_back(response));
    }

    /// Queues the acknowledgment for the next stop request.
    pub fn push_stop(&self, status: StatusCode) {
        self.with_script(|script| script.stop.push_back(Ok(ApiResponse::empty(status))));
    }

    /// Queues the acknowledgment for the next start request.
    pub fn push_start(&self, status: StatusCode) {
        self.with_script(|script| script.start.push_back(Ok(ApiResponse::empty(status))));
    }

    /// Queues the acknowledgment for the next delete request.
    pub fn push_delete(&self, status: StatusCode) {
        self.with_script(|script| script.delete.push_back(Ok(ApiResponse::empty(status))));
    }

    /// Returns a snapshot of all calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<ApiCall> {
        self.with_script(|script| script.calls.clone())
    }

    /// Number of recorded calls of `kind`.
    #[must_use]
    pub fn count(&self, kind: CallKind) -> usize {
        self.with_script(|script| script.calls.iter().filter(|call| call.kind == kind).count())
    }

    /// Times at which calls of `kind` were issued.
    #[must_use]
    pub fn instants(&self, kind: CallKind) -> Vec<Instant> {
        self.with_script(|script| {
            script
                .calls
                .iter()
                .filter(|call| call.kind == kind)
                .map(|call| call.at)
                .collect()
        })
    }

    fn next<T>(
        &self,
        kind: CallKind,
        project: &ProjectId,
        instance_id: Option<&InstanceId>,
        pick: impl FnOnce(&mut Script) -> Option<Scripted<T>>,
    ) -> Scripted<T> {
        self.with_script(|script| {
            script.calls.push(ApiCall {
                kind,
                project: project.clone(),
                instance_id: instance_id.cloned(),
                at: Instant::now(),
            });
            pick(script).unwrap_or(Err(ScriptedApiError::Exhausted(kind)))
        })
    }
}

impl InstanceApi for ScriptedApi {
    type Error = ScriptedApiError;

    fn create_instance<'a>(
        &'a self,
        project: &'a ProjectId,
        _request: &'a InstanceRequest,
    ) -> ApiFuture<'a, Instance, Self::Error> {
        let outcome = self.next(CallKind::Create, project, None, |script| {
            script.create.pop_front()
        });
        Box::pin(async move { outcome })
    }

    fn get_instance<'a>(
        &'a self,
        project: &'a ProjectId,
        id: &'a InstanceId,
    ) -> ApiFuture<'a, Instance, Self::Error> {
        let outcome = self.next(CallKind::Get, project, Some(id), |script| {
            script.get.pop_front()
        });
        Box::pin(async move { outcome })
    }

    fn stop_instance<'a>(
        &'a self,
        project: &'a ProjectId,
        id: &'a InstanceId,
    ) -> ApiFuture<'a, (), Self::Error> {
        let outcome = self.next(CallKind::Stop, project, Some(id), |script| {
            script.stop.pop_front()
        });
        Box::pin(async move { outcome })
    }

    fn start_instance<'a>(
        &'a self,
        project: &'a ProjectId,
        id: &'a InstanceId,
    ) -> ApiFuture<'a, (), Self::Error> {
        let outcome = self.next(CallKind::Start, project, Some(id), |script| {
            script.start.pop_front()
        });
        Box::pin(async move { outcome })
    }

    fn delete_instance<'a>(
        &'a self,
        project: &'a ProjectId,
        id: &'a InstanceId,
    ) -> ApiFuture<'a, (), Self::Error> {
        let outcome = self.next(CallKind::Delete, project, Some(id), |script| {
            script.delete.pop_front()
        });
        Box::pin(async move { outcome })
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: Mutex<()> = Mutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets and clears environment variables while holding a global mutex.
    ///
    /// A `None` value removes the variable for the guard's lifetime.
    pub async fn set_vars(pairs: &[(&str, Option<&str>)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe {
                match value {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
