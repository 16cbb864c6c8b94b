//! Workflow definition trait: a pure function of history.

use std::time::Duration;

use lumina_history::{FailureRecord, HistoryLog};

/// Default activity timeout, matching the executor's expectations for
/// short analysis steps.
pub const DEFAULT_ACTIVITY_TIMEOUT: Duration = Duration::from_secs(300);

/// Request to schedule one activity task.
///
/// The engine assigns the task id; definitions only name the activity, the
/// input payload, and which attempt this is.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRequest {
    /// Activity name to execute.
    pub activity: String,
    /// Input payload.
    pub input: serde_json::Value,
    /// Attempt number (1-based).
    pub attempt: u32,
}

impl ActivityRequest {
    /// Create a first-attempt request.
    pub fn new(activity: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            activity: activity.into(),
            input,
            attempt: 1,
        }
    }

    /// Create a retry request for a later attempt.
    pub fn retry(activity: impl Into<String>, input: serde_json::Value, attempt: u32) -> Self {
        Self {
            activity: activity.into(),
            input,
            attempt,
        }
    }
}

/// Decision produced by replaying a history log through a definition.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Schedule these tasks now (appended as one atomic batch).
    Schedule(Vec<ActivityRequest>),
    /// Pending tasks outstanding; nothing to do until an outcome arrives.
    Wait,
    /// Workflow finished with this output.
    Complete(serde_json::Value),
    /// Workflow failed.
    Fail(FailureRecord),
}

/// Retry policy for one activity class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (1 = no retries).
    pub max_attempts: u32,
    /// Base delay for exponential backoff between attempts.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy with the given attempt budget.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Check if the given attempt number is within budget.
    pub fn allows(&self, attempt: u32) -> bool {
        attempt <= self.max_attempts
    }

    /// Backoff delay before executing the given attempt.
    ///
    /// First attempts run immediately; attempt `n` (n > 1) waits
    /// `base_delay * 2^(n-2)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(2)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

/// Declarative workflow definition the engine drives.
///
/// `plan` must be a deterministic pure function of `(input, log)`: no wall
/// clock, no randomness, no external reads. Anything nondeterministic an
/// activity needs is executed once and recorded in the log as its output;
/// replaying the same log therefore reproduces identical decisions, which is
/// what makes resuming after a process restart safe.
pub trait WorkflowDefinition: Send + Sync {
    /// Get the workflow name.
    fn name(&self) -> &str;

    /// Compute the next decision from the instance input and full history.
    fn plan(&self, input: &serde_json::Value, log: &HistoryLog) -> Decision;

    /// Retry policy for an activity class.
    fn retry_policy(&self, activity: &str) -> RetryPolicy {
        let _ = activity;
        RetryPolicy::default()
    }

    /// Execution timeout for an activity class.
    fn timeout(&self, activity: &str) -> Duration {
        let _ = activity;
        DEFAULT_ACTIVITY_TIMEOUT
    }
}
