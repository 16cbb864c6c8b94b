//! Orchestrator engine: replay the log, decide, append, repeat.

use std::sync::Arc;

use tracing::{debug, info, warn};

use lumina_history::{
    FailureRecord, HistoryEvent, HistoryStore, InstanceId, TaskId,
};

use crate::definition::{Decision, WorkflowDefinition};
use crate::error::{Error, Result};

/// A scheduled unit of work handed to the executor.
///
/// Ephemeral: exists only between its `ActivityScheduled` event and the
/// terminal event recorded for its task id.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityTask {
    /// Task id unique within the instance.
    pub task_id: TaskId,
    /// Activity name to execute.
    pub activity: String,
    /// Input payload.
    pub input: serde_json::Value,
    /// Attempt number (1-based).
    pub attempt: u32,
}

/// Outcome of one engine advance.
#[derive(Debug, Clone, PartialEq)]
pub struct Advance {
    /// Tasks scheduled by this advance, to be executed concurrently.
    pub scheduled: Vec<ActivityTask>,
    /// Whether the instance is now terminal.
    pub terminal: bool,
    /// Final output, present when the instance completed.
    pub output: Option<serde_json::Value>,
}

impl Advance {
    fn waiting() -> Self {
        Self {
            scheduled: Vec::new(),
            terminal: false,
            output: None,
        }
    }

    fn terminal(output: Option<serde_json::Value>) -> Self {
        Self {
            scheduled: Vec::new(),
            terminal: true,
            output,
        }
    }
}

/// The orchestrator engine.
///
/// Every `advance` replays the instance's full history through the workflow
/// definition to recompute the current position; the engine never trusts a
/// stored cursor. Decision-making must be serialized per instance by the
/// caller (the runtime does this); independent instances can advance in
/// parallel freely since all state is instance-scoped.
pub struct Engine {
    store: Arc<dyn HistoryStore>,
    definition: Arc<dyn WorkflowDefinition>,
}

impl Engine {
    /// Create a new engine over a history store and a workflow definition.
    pub fn new(store: Arc<dyn HistoryStore>, definition: Arc<dyn WorkflowDefinition>) -> Self {
        Self { store, definition }
    }

    /// The workflow definition this engine drives.
    pub fn definition(&self) -> &Arc<dyn WorkflowDefinition> {
        &self.definition
    }

    /// Advance an instance: append the incoming outcome (if any), replay the
    /// log, and act on the definition's decision.
    ///
    /// Returns the tasks to execute next. Fan-out groups are appended as a
    /// single atomic batch so a crash cannot leave a half-scheduled group.
    pub async fn advance(
        &self,
        instance_id: InstanceId,
        incoming: Option<HistoryEvent>,
    ) -> Result<Advance> {
        let mut record = self
            .store
            .load_instance(instance_id)
            .await?
            .ok_or_else(|| Error::instance_not_found(instance_id.to_string()))?;

        // Terminal states are absorbing: late outcomes are dropped.
        if record.status.is_terminal() {
            if let Some(event) = incoming {
                debug!(
                    instance_id = %instance_id,
                    event_type = event.event_type(),
                    "Dropping event for terminal instance"
                );
            }
            return Ok(Advance::terminal(record.output));
        }

        if let Some(event) = incoming {
            self.store.append_events(instance_id, vec![event]).await?;
        }

        let log = self.store.load_history(instance_id).await?;
        match self.definition.plan(&record.input, &log) {
            Decision::Schedule(requests) => {
                let mut events = Vec::with_capacity(requests.len());
                let mut tasks = Vec::with_capacity(requests.len());
                let mut next = log.next_task_id().as_u64();
                for request in requests {
                    let task_id = TaskId::from_seq(next);
                    next = next.saturating_add(1);
                    events.push(HistoryEvent::scheduled(
                        task_id,
                        request.activity.clone(),
                        request.input.clone(),
                        request.attempt,
                    ));
                    tasks.push(ActivityTask {
                        task_id,
                        activity: request.activity,
                        input: request.input,
                        attempt: request.attempt,
                    });
                }
                self.store.append_events(instance_id, events).await?;

                info!(
                    instance_id = %instance_id,
                    count = tasks.len(),
                    activities = ?tasks.iter().map(|t| t.activity.as_str()).collect::<Vec<_>>(),
                    "Scheduled activity tasks"
                );

                Ok(Advance {
                    scheduled: tasks,
                    terminal: false,
                    output: None,
                })
            }
            Decision::Wait => Ok(Advance::waiting()),
            Decision::Complete(output) => {
                record.complete(output.clone())?;
                self.store.save_instance(&record).await?;
                info!(instance_id = %instance_id, "Instance completed");
                Ok(Advance::terminal(Some(output)))
            }
            Decision::Fail(failure) => {
                warn!(
                    instance_id = %instance_id,
                    reason = %failure.reason,
                    "Instance failed"
                );
                record.fail(failure)?;
                self.store.save_instance(&record).await?;
                Ok(Advance::terminal(None))
            }
        }
    }

    /// Abandon a non-terminal instance, marking it failed with a timeout
    /// cause. The history log is left untouched.
    pub async fn abandon(&self, instance_id: InstanceId, reason: impl Into<String>) -> Result<()> {
        let mut record = self
            .store
            .load_instance(instance_id)
            .await?
            .ok_or_else(|| Error::instance_not_found(instance_id.to_string()))?;

        if record.status.is_terminal() {
            return Ok(());
        }

        let reason = reason.into();
        warn!(instance_id = %instance_id, reason = %reason, "Abandoning instance");
        record.fail(FailureRecord::timeout(reason))?;
        self.store.save_instance(&record).await?;
        Ok(())
    }
}
