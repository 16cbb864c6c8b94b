//! Append-only history log with invariant enforcement.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::event::HistoryEvent;
use crate::types::TaskId;

/// Terminal outcome of one scheduled task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// Task completed with an output payload.
    Completed(serde_json::Value),
    /// Task failed with an error message.
    Failed(String),
}

impl TaskOutcome {
    /// Check if the outcome is a success.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Get the output payload, if completed.
    pub fn output(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Completed(output) => Some(output),
            Self::Failed(_) => None,
        }
    }

    /// Get the error message, if failed.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Completed(_) => None,
            Self::Failed(error) => Some(error),
        }
    }
}

/// View of one scheduling entry in the log.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledTask<'a> {
    pub task_id: TaskId,
    pub activity: &'a str,
    pub input: &'a serde_json::Value,
    pub attempt: u32,
}

/// Ordered, append-only record of scheduling decisions and task outcomes
/// for one workflow instance.
///
/// Appends enforce the log invariants: task ids are unique, terminal events
/// reference a previously scheduled task, and each task has at most one
/// terminal event. Completion order between concurrently scheduled tasks is
/// unconstrained; query helpers are keyed by activity name so consumers stay
/// order-independent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryLog {
    entries: Vec<HistoryEvent>,
}

impl HistoryLog {
    /// Create a new empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a single event, validating log invariants.
    pub fn append(&mut self, event: HistoryEvent) -> Result<()> {
        self.validate(&event)?;
        self.entries.push(event);
        Ok(())
    }

    /// Append a batch of events atomically: either every event is valid and
    /// all are appended, or the log is left untouched.
    pub fn append_batch(&mut self, events: Vec<HistoryEvent>) -> Result<()> {
        let checkpoint = self.entries.len();
        for event in events {
            if let Err(e) = self.append(event) {
                self.entries.truncate(checkpoint);
                return Err(e);
            }
        }
        Ok(())
    }

    fn validate(&self, event: &HistoryEvent) -> Result<()> {
        let task_id = event.task_id();
        match event {
            HistoryEvent::ActivityScheduled { .. } => {
                if self.schedule_for(task_id).is_some() {
                    return Err(Error::DuplicateTask {
                        task_id: task_id.as_u64(),
                    });
                }
            }
            HistoryEvent::ActivityCompleted { .. } | HistoryEvent::ActivityFailed { .. } => {
                if self.schedule_for(task_id).is_none() {
                    return Err(Error::UnknownTask {
                        task_id: task_id.as_u64(),
                    });
                }
                if self.outcome_of(task_id).is_some() {
                    return Err(Error::TaskAlreadyTerminal {
                        task_id: task_id.as_u64(),
                    });
                }
            }
        }
        Ok(())
    }

    /// All entries in append order.
    pub fn entries(&self) -> &[HistoryEvent] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of scheduling events so far.
    pub fn scheduled_count(&self) -> u64 {
        self.entries
            .iter()
            .filter(|e| matches!(e, HistoryEvent::ActivityScheduled { .. }))
            .count() as u64
    }

    /// The task id the next scheduling event will receive.
    pub fn next_task_id(&self) -> TaskId {
        TaskId::from_seq(self.scheduled_count())
    }

    /// Scheduling entry for a task id.
    pub fn schedule_for(&self, task_id: TaskId) -> Option<ScheduledTask<'_>> {
        self.entries.iter().find_map(|e| match e {
            HistoryEvent::ActivityScheduled {
                task_id: id,
                activity,
                input,
                attempt,
                ..
            } if *id == task_id => Some(ScheduledTask {
                task_id,
                activity,
                input,
                attempt: *attempt,
            }),
            _ => None,
        })
    }

    /// Terminal outcome of a task, if recorded.
    pub fn outcome_of(&self, task_id: TaskId) -> Option<TaskOutcome> {
        self.entries.iter().find_map(|e| match e {
            HistoryEvent::ActivityCompleted {
                task_id: id,
                output,
                ..
            } if *id == task_id => Some(TaskOutcome::Completed(output.clone())),
            HistoryEvent::ActivityFailed {
                task_id: id, error, ..
            } if *id == task_id => Some(TaskOutcome::Failed(error.clone())),
            _ => None,
        })
    }

    /// Number of times an activity has been scheduled.
    pub fn attempts(&self, activity: &str) -> u32 {
        self.entries
            .iter()
            .filter(|e| {
                matches!(e, HistoryEvent::ActivityScheduled { activity: a, .. } if a == activity)
            })
            .count() as u32
    }

    /// The most recently scheduled task id for an activity.
    pub fn latest_task(&self, activity: &str) -> Option<TaskId> {
        self.entries.iter().rev().find_map(|e| match e {
            HistoryEvent::ActivityScheduled {
                task_id,
                activity: a,
                ..
            } if a == activity => Some(*task_id),
            _ => None,
        })
    }

    /// Terminal outcome of the latest attempt of an activity.
    ///
    /// Keyed by activity name so fan-in joins do not depend on completion
    /// order within a group.
    pub fn latest_outcome(&self, activity: &str) -> Option<TaskOutcome> {
        self.latest_task(activity)
            .and_then(|task_id| self.outcome_of(task_id))
    }

    /// Scheduled tasks without a terminal event yet.
    pub fn pending_tasks(&self) -> Vec<TaskId> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                HistoryEvent::ActivityScheduled { task_id, .. } => Some(*task_id),
                _ => None,
            })
            .filter(|task_id| self.outcome_of(*task_id).is_none())
            .collect()
    }
}
