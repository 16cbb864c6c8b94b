//! Activity executor: runs scheduled tasks and produces outcome events.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, warn};

use lumina_history::HistoryEvent;

use crate::activity::ActivityRegistry;
use crate::engine::ActivityTask;
use crate::error::Error;

/// Default cap on concurrently running activities.
pub const DEFAULT_MAX_CONCURRENT: usize = 16;

/// Executes activity tasks with bounded concurrency.
///
/// The executor is the nondeterministic half of the system: it runs real
/// work, applies timeouts and retry backoff, and turns whatever happened
/// into a single terminal `HistoryEvent` for the engine to append. It never
/// touches the history store itself.
pub struct ActivityExecutor {
    registry: Arc<ActivityRegistry>,
    permits: Arc<Semaphore>,
}

impl ActivityExecutor {
    /// Create an executor over a registry with the default concurrency cap.
    pub fn new(registry: Arc<ActivityRegistry>) -> Self {
        Self::with_max_concurrent(registry, DEFAULT_MAX_CONCURRENT)
    }

    /// Create an executor with an explicit concurrency cap.
    pub fn with_max_concurrent(registry: Arc<ActivityRegistry>, max_concurrent: usize) -> Self {
        Self {
            registry,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// The registry this executor resolves activity names against.
    pub fn registry(&self) -> &Arc<ActivityRegistry> {
        &self.registry
    }

    /// Execute one task and return its terminal event.
    ///
    /// `backoff` is slept before acquiring a permit (retry attempts arrive
    /// here with their policy delay already computed). Infallible by
    /// construction: every failure mode, including an unknown activity name
    /// or a timeout, becomes an `ActivityFailed` event so the instance can
    /// always make progress.
    pub async fn execute(
        &self,
        task: &ActivityTask,
        timeout: Duration,
        backoff: Duration,
    ) -> HistoryEvent {
        if !backoff.is_zero() {
            debug!(
                task_id = task.task_id.as_u64(),
                activity = %task.activity,
                attempt = task.attempt,
                backoff_ms = backoff.as_millis() as u64,
                "Delaying retry attempt"
            );
            tokio::time::sleep(backoff).await;
        }

        let Some(activity) = self.registry.get(&task.activity) else {
            warn!(activity = %task.activity, "Activity not registered");
            return HistoryEvent::failed(
                task.task_id,
                Error::activity_not_found(&task.activity).to_string(),
            );
        };

        // Semaphore is never closed, so acquire can only fail if it were.
        let _permit = match self.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                return HistoryEvent::failed(
                    task.task_id,
                    Error::activity_failed(&task.activity, "executor shut down").to_string(),
                );
            }
        };

        debug!(
            task_id = task.task_id.as_u64(),
            activity = %task.activity,
            attempt = task.attempt,
            "Executing activity"
        );

        match tokio::time::timeout(timeout, activity.execute(&task.input)).await {
            Ok(Ok(output)) => HistoryEvent::completed(task.task_id, output),
            Ok(Err(err)) => {
                warn!(
                    task_id = task.task_id.as_u64(),
                    activity = %task.activity,
                    attempt = task.attempt,
                    error = %err,
                    "Activity failed"
                );
                HistoryEvent::failed(task.task_id, err.to_string())
            }
            Err(_) => {
                warn!(
                    task_id = task.task_id.as_u64(),
                    activity = %task.activity,
                    timeout_secs = timeout.as_secs(),
                    "Activity timed out"
                );
                HistoryEvent::failed(
                    task.task_id,
                    Error::activity_timeout(&task.activity, timeout.as_secs()).to_string(),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{FailingActivity, FnActivity};
    use lumina_history::TaskId;
    use serde_json::json;

    fn task(activity: &str) -> ActivityTask {
        ActivityTask {
            task_id: TaskId::from_seq(0),
            activity: activity.to_string(),
            input: json!({"x": 1}),
            attempt: 1,
        }
    }

    fn registry() -> Arc<ActivityRegistry> {
        let mut registry = ActivityRegistry::new();
        registry.register(Arc::new(FnActivity::new("echo", |input| Ok(input.clone()))));
        registry.register(Arc::new(FailingActivity::new("broken", "always down")));
        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_successful_execution_yields_completed_event() {
        let executor = ActivityExecutor::new(registry());
        let event = executor
            .execute(&task("echo"), Duration::from_secs(5), Duration::ZERO)
            .await;

        match event {
            HistoryEvent::ActivityCompleted { task_id, output, .. } => {
                assert_eq!(task_id, TaskId::from_seq(0));
                assert_eq!(output, json!({"x": 1}));
            }
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failure_yields_failed_event() {
        let executor = ActivityExecutor::new(registry());
        let event = executor
            .execute(&task("broken"), Duration::from_secs(5), Duration::ZERO)
            .await;

        match event {
            HistoryEvent::ActivityFailed { error, .. } => {
                assert!(error.contains("always down"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_activity_yields_failed_event() {
        let executor = ActivityExecutor::new(registry());
        let event = executor
            .execute(&task("missing"), Duration::from_secs(5), Duration::ZERO)
            .await;

        match event {
            HistoryEvent::ActivityFailed { error, .. } => {
                assert!(error.contains("not registered"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_yields_failed_event() {
        let mut registry = ActivityRegistry::new();
        registry.register(Arc::new(SlowActivity));
        let executor = ActivityExecutor::new(Arc::new(registry));

        let event = executor
            .execute(&task("slow"), Duration::from_millis(50), Duration::ZERO)
            .await;

        match event {
            HistoryEvent::ActivityFailed { error, .. } => {
                assert!(error.contains("timed out"));
            }
            other => panic!("expected timeout failure, got {other:?}"),
        }
    }

    struct SlowActivity;

    #[async_trait::async_trait]
    impl crate::activity::Activity for SlowActivity {
        async fn execute(
            &self,
            _input: &serde_json::Value,
        ) -> crate::error::Result<serde_json::Value> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(json!({}))
        }

        fn name(&self) -> &str {
            "slow"
        }
    }
}
