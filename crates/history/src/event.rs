//! Orchestration history events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{EventId, TaskId};

/// One entry in an instance's append-only history.
///
/// The log made of these events is the single source of truth for workflow
/// progress: replaying it through the workflow definition reconstructs every
/// scheduling decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HistoryEvent {
    /// An activity task was scheduled.
    ActivityScheduled {
        event_id: EventId,
        task_id: TaskId,
        activity: String,
        input: serde_json::Value,
        attempt: u32,
        timestamp: DateTime<Utc>,
    },
    /// A scheduled task completed successfully.
    ActivityCompleted {
        event_id: EventId,
        task_id: TaskId,
        output: serde_json::Value,
        timestamp: DateTime<Utc>,
    },
    /// A scheduled task failed.
    ActivityFailed {
        event_id: EventId,
        task_id: TaskId,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl HistoryEvent {
    /// Create a scheduling event.
    pub fn scheduled(
        task_id: TaskId,
        activity: impl Into<String>,
        input: serde_json::Value,
        attempt: u32,
    ) -> Self {
        Self::ActivityScheduled {
            event_id: EventId::new(),
            task_id,
            activity: activity.into(),
            input,
            attempt,
            timestamp: Utc::now(),
        }
    }

    /// Create a completion event.
    pub fn completed(task_id: TaskId, output: serde_json::Value) -> Self {
        Self::ActivityCompleted {
            event_id: EventId::new(),
            task_id,
            output,
            timestamp: Utc::now(),
        }
    }

    /// Create a failure event.
    pub fn failed(task_id: TaskId, error: impl Into<String>) -> Self {
        Self::ActivityFailed {
            event_id: EventId::new(),
            task_id,
            error: error.into(),
            timestamp: Utc::now(),
        }
    }

    /// Get the event ID.
    pub fn event_id(&self) -> EventId {
        match self {
            Self::ActivityScheduled { event_id, .. }
            | Self::ActivityCompleted { event_id, .. }
            | Self::ActivityFailed { event_id, .. } => *event_id,
        }
    }

    /// Get the task ID this event refers to.
    pub fn task_id(&self) -> TaskId {
        match self {
            Self::ActivityScheduled { task_id, .. }
            | Self::ActivityCompleted { task_id, .. }
            | Self::ActivityFailed { task_id, .. } => *task_id,
        }
    }

    /// Get the timestamp.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::ActivityScheduled { timestamp, .. }
            | Self::ActivityCompleted { timestamp, .. }
            | Self::ActivityFailed { timestamp, .. } => *timestamp,
        }
    }

    /// Check if this is a terminal event for its task.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ActivityCompleted { .. } | Self::ActivityFailed { .. }
        )
    }

    /// Get the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ActivityScheduled { .. } => "activity_scheduled",
            Self::ActivityCompleted { .. } => "activity_completed",
            Self::ActivityFailed { .. } => "activity_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scheduled_event() {
        let event = HistoryEvent::scheduled(TaskId::from_seq(0), "analyze_colors", json!({}), 1);
        assert_eq!(event.task_id(), TaskId::from_seq(0));
        assert_eq!(event.event_type(), "activity_scheduled");
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_terminal_events() {
        let done = HistoryEvent::completed(TaskId::from_seq(1), json!({"ok": true}));
        let failed = HistoryEvent::failed(TaskId::from_seq(2), "decode error");
        assert!(done.is_terminal());
        assert!(failed.is_terminal());
        assert_eq!(failed.event_type(), "activity_failed");
    }

    #[test]
    fn test_event_serde_roundtrip() {
        let event = HistoryEvent::scheduled(TaskId::from_seq(3), "store_results", json!({"id": "x"}), 2);
        let encoded = serde_json::to_string(&event).expect("encode");
        let decoded: HistoryEvent = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(event, decoded);
    }
}
