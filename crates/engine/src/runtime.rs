//! Per-instance runtime loop over the engine and executor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info};

use lumina_history::{HistoryStore, InstanceId, InstanceRecord};

use crate::activity::ActivityRegistry;
use crate::definition::WorkflowDefinition;
use crate::engine::{ActivityTask, Engine};
use crate::error::{Error, Result};
use crate::executor::ActivityExecutor;

/// Runtime tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Cap on concurrently running activities across all instances.
    pub max_concurrent_activities: usize,
    /// Poll interval for `run_to_completion`.
    pub poll_interval: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_concurrent_activities: crate::executor::DEFAULT_MAX_CONCURRENT,
            poll_interval: Duration::from_millis(25),
        }
    }
}

/// Drives workflow instances to completion.
///
/// Each instance gets one tokio task that owns the decision loop, so
/// decisions for an instance are made one at a time even though its
/// activities run concurrently. Suspension between fan-out and fan-in is
/// just awaiting the outcome channel; no thread is held while activities
/// run.
pub struct Runtime {
    engine: Arc<Engine>,
    executor: Arc<ActivityExecutor>,
    store: Arc<dyn HistoryStore>,
    config: RuntimeConfig,
}

impl Runtime {
    /// Create a runtime with default configuration.
    pub fn new(
        store: Arc<dyn HistoryStore>,
        definition: Arc<dyn WorkflowDefinition>,
        registry: Arc<ActivityRegistry>,
    ) -> Self {
        Self::with_config(store, definition, registry, RuntimeConfig::default())
    }

    /// Create a runtime with explicit configuration.
    pub fn with_config(
        store: Arc<dyn HistoryStore>,
        definition: Arc<dyn WorkflowDefinition>,
        registry: Arc<ActivityRegistry>,
        config: RuntimeConfig,
    ) -> Self {
        let engine = Arc::new(Engine::new(store.clone(), definition));
        let executor = Arc::new(ActivityExecutor::with_max_concurrent(
            registry,
            config.max_concurrent_activities,
        ));
        Self {
            engine,
            executor,
            store,
            config,
        }
    }

    /// The underlying history store.
    pub fn store(&self) -> &Arc<dyn HistoryStore> {
        &self.store
    }

    /// Start an instance idempotently.
    ///
    /// Creates the record and spawns the drive loop if this delivery is the
    /// first one for the derived id; redelivery of the same trigger returns
    /// `false` and spawns nothing.
    pub async fn start_instance(
        &self,
        instance_id: InstanceId,
        file_name: impl Into<String>,
        input: serde_json::Value,
    ) -> Result<bool> {
        let record = InstanceRecord::new(instance_id, file_name, input);
        let created = self.store.create_instance(&record).await?;
        if !created {
            info!(instance_id = %instance_id, "Duplicate trigger delivery, instance already exists");
            return Ok(false);
        }

        info!(
            instance_id = %instance_id,
            file_name = %record.file_name,
            workflow = self.engine.definition().name(),
            "Starting workflow instance"
        );

        let engine = self.engine.clone();
        let executor = self.executor.clone();
        tokio::spawn(async move {
            if let Err(err) = drive_instance(engine, executor, instance_id).await {
                error!(instance_id = %instance_id, error = %err, "Instance drive loop failed");
            }
        });
        Ok(true)
    }

    /// Await an instance's terminal state within a time budget.
    ///
    /// Exceeding the budget abandons the instance (marks it Failed with a
    /// timeout cause) and returns the abandoned record.
    pub async fn run_to_completion(
        &self,
        instance_id: InstanceId,
        budget: Duration,
    ) -> Result<InstanceRecord> {
        let deadline = tokio::time::Instant::now() + budget;
        loop {
            let record = self
                .store
                .load_instance(instance_id)
                .await?
                .ok_or_else(|| Error::instance_not_found(instance_id.to_string()))?;
            if record.status.is_terminal() {
                return Ok(record);
            }
            if tokio::time::Instant::now() >= deadline {
                self.engine.abandon(instance_id, "execution time budget exceeded").await?;
                return self
                    .store
                    .load_instance(instance_id)
                    .await?
                    .ok_or_else(|| Error::instance_not_found(instance_id.to_string()));
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

/// Decision loop for one instance: advance, dispatch, await an outcome,
/// repeat until terminal.
async fn drive_instance(
    engine: Arc<Engine>,
    executor: Arc<ActivityExecutor>,
    instance_id: InstanceId,
) -> Result<()> {
    let (tx, mut rx) = mpsc::channel(32);

    let mut advance = engine.advance(instance_id, None).await?;
    loop {
        dispatch(&engine, &executor, &tx, advance.scheduled);
        if advance.terminal {
            return Ok(());
        }
        let Some(outcome) = rx.recv().await else {
            // All dispatched tasks finished and nothing new was scheduled.
            return Ok(());
        };
        advance = engine.advance(instance_id, Some(outcome)).await?;
    }
}

fn dispatch(
    engine: &Arc<Engine>,
    executor: &Arc<ActivityExecutor>,
    tx: &mpsc::Sender<lumina_history::HistoryEvent>,
    tasks: Vec<ActivityTask>,
) {
    for task in tasks {
        let definition = engine.definition().clone();
        let executor = executor.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let timeout = definition.timeout(&task.activity);
            let backoff = definition.retry_policy(&task.activity).delay_for(task.attempt);
            let outcome = executor.execute(&task, timeout, backoff).await;
            // Receiver gone means the instance went terminal; drop the
            // outcome, terminal states are absorbing anyway.
            let _ = tx.send(outcome).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{FailingActivity, FlakyActivity, FnActivity};
    use crate::definition::{ActivityRequest, Decision, RetryPolicy};
    use lumina_history::{
        FailureRecord, HistoryLog, InMemoryHistoryStore, InstanceStatus, TaskOutcome,
    };
    use serde_json::json;
    use std::collections::BTreeMap;

    /// Fan out {left, right}, retry each up to two attempts, then complete
    /// with the joined map.
    struct PairDefinition;

    impl PairDefinition {
        const STEPS: [&'static str; 2] = ["left", "right"];
    }

    impl WorkflowDefinition for PairDefinition {
        fn name(&self) -> &str {
            "pair-test"
        }

        fn plan(&self, input: &serde_json::Value, log: &HistoryLog) -> Decision {
            let mut outputs = BTreeMap::new();
            let mut failed = BTreeMap::new();
            let mut to_schedule = Vec::new();
            let mut waiting = false;

            for name in Self::STEPS {
                let attempts = log.attempts(name);
                if attempts == 0 {
                    to_schedule.push(ActivityRequest::new(name, input.clone()));
                    continue;
                }
                match log.latest_outcome(name) {
                    None => waiting = true,
                    Some(TaskOutcome::Completed(output)) => {
                        outputs.insert(name.to_string(), output);
                    }
                    Some(TaskOutcome::Failed(error)) => {
                        if self.retry_policy(name).allows(attempts + 1) {
                            to_schedule.push(ActivityRequest::retry(
                                name,
                                input.clone(),
                                attempts + 1,
                            ));
                        } else {
                            failed.insert(name.to_string(), error);
                        }
                    }
                }
            }

            if !to_schedule.is_empty() {
                return Decision::Schedule(to_schedule);
            }
            if waiting {
                return Decision::Wait;
            }
            if !failed.is_empty() {
                return Decision::Fail(FailureRecord::activity_failures(failed, outputs));
            }
            Decision::Complete(json!({"joined": outputs}))
        }

        fn retry_policy(&self, _activity: &str) -> RetryPolicy {
            RetryPolicy::new(2, Duration::from_millis(1))
        }
    }

    fn runtime_with(registry: ActivityRegistry) -> (Runtime, Arc<InMemoryHistoryStore>) {
        let store = Arc::new(InMemoryHistoryStore::new());
        let runtime = Runtime::new(
            store.clone(),
            Arc::new(PairDefinition),
            Arc::new(registry),
        );
        (runtime, store)
    }

    #[tokio::test]
    async fn test_runs_fan_out_to_completion() {
        let mut registry = ActivityRegistry::new();
        registry.register(Arc::new(FnActivity::new("left", |_| Ok(json!("L")))));
        registry.register(Arc::new(FnActivity::new("right", |_| Ok(json!("R")))));
        let (runtime, _store) = runtime_with(registry);

        let id = InstanceId::new();
        assert!(runtime.start_instance(id, "a.jpg", json!({})).await.unwrap());

        let record = runtime
            .run_to_completion(id, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(record.status, InstanceStatus::Completed);
        assert_eq!(
            record.output,
            Some(json!({"joined": {"left": "L", "right": "R"}}))
        );
    }

    #[tokio::test]
    async fn test_duplicate_trigger_starts_one_instance() {
        let mut registry = ActivityRegistry::new();
        registry.register(Arc::new(FnActivity::new("left", |_| Ok(json!("L")))));
        registry.register(Arc::new(FnActivity::new("right", |_| Ok(json!("R")))));
        let (runtime, _store) = runtime_with(registry);

        let id = InstanceId::derive("a.jpg", "delivery-1");
        assert!(runtime.start_instance(id, "a.jpg", json!({})).await.unwrap());
        assert!(!runtime.start_instance(id, "a.jpg", json!({})).await.unwrap());

        let record = runtime
            .run_to_completion(id, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(record.status, InstanceStatus::Completed);
    }

    #[tokio::test]
    async fn test_transient_failure_retried_to_success() {
        let mut registry = ActivityRegistry::new();
        registry.register(Arc::new(FlakyActivity::new(
            Arc::new(FnActivity::new("left", |_| Ok(json!("L")))),
            1,
        )));
        registry.register(Arc::new(FnActivity::new("right", |_| Ok(json!("R")))));
        let (runtime, store) = runtime_with(registry);

        let id = InstanceId::new();
        runtime.start_instance(id, "a.jpg", json!({})).await.unwrap();
        let record = runtime
            .run_to_completion(id, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(record.status, InstanceStatus::Completed);
        // One failed attempt plus the successful retry are both in the log.
        let log = store.load_history(id).await.unwrap();
        assert_eq!(log.attempts("left"), 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_with_sibling_output_retained() {
        let mut registry = ActivityRegistry::new();
        registry.register(Arc::new(FailingActivity::new("left", "corrupt input")));
        registry.register(Arc::new(FnActivity::new("right", |_| Ok(json!("R")))));
        let (runtime, _store) = runtime_with(registry);

        let id = InstanceId::new();
        runtime.start_instance(id, "a.jpg", json!({})).await.unwrap();
        let record = runtime
            .run_to_completion(id, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(record.status, InstanceStatus::Failed);
        let failure = record.failure.unwrap();
        assert!(failure.failed.contains_key("left"));
        assert_eq!(failure.partial.get("right"), Some(&json!("R")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exceeded_abandons_instance() {
        // No activities registered would still produce failed events fast;
        // instead use an activity that sleeps past the budget.
        struct Stuck;

        #[async_trait::async_trait]
        impl crate::activity::Activity for Stuck {
            async fn execute(&self, _input: &serde_json::Value) -> Result<serde_json::Value> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(json!({}))
            }

            fn name(&self) -> &str {
                "left"
            }
        }

        let mut registry = ActivityRegistry::new();
        registry.register(Arc::new(Stuck));
        registry.register(Arc::new(FnActivity::new("right", |_| Ok(json!("R")))));
        let (runtime, _store) = runtime_with(registry);

        let id = InstanceId::new();
        runtime.start_instance(id, "a.jpg", json!({})).await.unwrap();
        let record = runtime
            .run_to_completion(id, Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(record.status, InstanceStatus::Failed);
        assert!(record
            .failure
            .unwrap()
            .reason
            .contains("time budget exceeded"));
    }
}
