//! Polling bounds shared by every convergence wait.

use std::time::Duration;

use thiserror::Error;

/// Delay between status queries used when nothing else is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Overall bound for a single convergence wait.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(900);

/// Errors raised when constructing a [`PollPolicy`].
#[derive(Debug, Error, Eq, PartialEq)]
pub enum PollPolicyError {
    /// Raised when the interval is zero.
    #[error("poll interval must be greater than zero")]
    ZeroInterval,
}

/// Fixed-delay polling with optional attempt and duration bounds.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollPolicy {
    interval: Duration,
    max_attempts: Option<u32>,
    timeout: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: None,
            timeout: Some(DEFAULT_WAIT_TIMEOUT),
        }
    }
}

impl PollPolicy {
    /// Creates an unbounded policy polling every `interval`.
    ///
    /// # Errors
    ///
    /// Returns [`PollPolicyError::ZeroInterval`] when `interval` is zero.
    pub const fn new(interval: Duration) -> Result<Self, PollPolicyError> {
        if interval.is_zero() {
            return Err(PollPolicyError::ZeroInterval);
        }
        Ok(Self {
            interval,
            max_attempts: None,
            timeout: None,
        })
    }

    /// Limits the number of waits before giving up.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Limits the total time spent waiting for a single operation.
    ///
    /// A wait is not started when it would end past the bound. A status
    /// query already in flight is not interrupted; it is bounded only by the
    /// client's own request timeout, so an operation can overrun the bound
    /// by at most one request.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Delay between consecutive status queries.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Maximum number of waits, if bounded.
    #[must_use]
    pub const fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    /// Overall wait bound, if any.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether another wait is disallowed after `attempts` waits and
    /// `elapsed` time. A wait that would end past the timeout is disallowed.
    pub(crate) fn exhausted(&self, attempts: u32, elapsed: Duration) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
            || self
                .timeout
                .is_some_and(|limit| elapsed.saturating_add(self.interval) > limit)
    }
}
