//! Identifiers and instance records for orchestration history.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use ulid::Ulid;
use uuid::Uuid;

use crate::error::Error;

/// Unique identifier for a workflow instance.
///
/// Instance ids can be derived deterministically from a trigger delivery so
/// that at-least-once delivery of the same trigger creates exactly one
/// instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(Uuid);

impl InstanceId {
    /// Create a new random instance ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Derive an instance ID from a trigger delivery.
    ///
    /// Same `(file_name, delivery_id)` pair always produces the same id:
    /// a UUID v5 in a namespace derived from the file name, over the
    /// SHA-256 hash of the delivery id.
    pub fn derive(file_name: &str, delivery_id: &str) -> Self {
        let namespace = Uuid::new_v5(&Uuid::NAMESPACE_DNS, file_name.as_bytes());
        let mut hasher = Sha256::new();
        hasher.update(delivery_id.as_bytes());
        let digest = hasher.finalize();
        Self(Uuid::new_v5(&namespace, &digest))
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for InstanceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Identifier for a scheduled activity task, unique within one instance.
///
/// Task ids are sequential, assigned from the number of scheduling events
/// already in the instance's history, so replaying the same history always
/// reproduces the same ids.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TaskId(u64);

impl TaskId {
    /// Create a task ID from its sequence number.
    pub fn from_seq(seq: u64) -> Self {
        Self(seq)
    }

    /// Get the sequence number.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a history event.
///
/// Event ids identify log entries for diagnostics only; scheduling decisions
/// never consult them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(Ulid);

impl EventId {
    /// Create a new random event ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Get the inner ULID.
    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Instance status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceStatus {
    /// Instance is executing or awaiting pending tasks.
    Running,
    /// Instance completed successfully.
    Completed,
    /// Instance failed.
    Failed,
}

impl InstanceStatus {
    /// Check if the status is terminal. Terminal states are absorbing.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Check if the instance can transition to the given status.
    pub fn can_transition_to(&self, target: InstanceStatus) -> bool {
        use InstanceStatus::*;
        matches!((self, target), (Running, Completed) | (Running, Failed))
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Failure detail attached to a failed instance.
///
/// A failed fan-out does not drop sibling outputs: successful outputs from
/// the same group are retained alongside the per-activity errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Human-readable failure summary.
    pub reason: String,
    /// Failed activities, keyed by activity name.
    pub failed: BTreeMap<String, String>,
    /// Outputs of sibling activities that succeeded, keyed by activity name.
    pub partial: BTreeMap<String, serde_json::Value>,
}

impl FailureRecord {
    /// Create a failure record from per-activity errors and retained
    /// sibling outputs.
    pub fn activity_failures(
        failed: BTreeMap<String, String>,
        partial: BTreeMap<String, serde_json::Value>,
    ) -> Self {
        let names = failed.keys().cloned().collect::<Vec<_>>().join(", ");
        Self {
            reason: format!("activity failure: {names}"),
            failed,
            partial,
        }
    }

    /// Create a failure record for a single failed step.
    pub fn step_failure(activity: impl Into<String>, error: impl Into<String>) -> Self {
        let activity = activity.into();
        let error = error.into();
        let mut failed = BTreeMap::new();
        failed.insert(activity.clone(), error);
        Self {
            reason: format!("activity failure: {activity}"),
            failed,
            partial: BTreeMap::new(),
        }
    }

    /// Create a failure record for an abandoned instance.
    pub fn timeout(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            failed: BTreeMap::new(),
            partial: BTreeMap::new(),
        }
    }

    /// Attach retained sibling outputs.
    pub fn with_partial(mut self, partial: BTreeMap<String, serde_json::Value>) -> Self {
        self.partial = partial;
        self
    }
}

/// Durable record of one workflow instance.
///
/// The history log is the source of truth for progress; the record holds
/// identity, the trigger input, and the terminal outcome once reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceRecord {
    /// Unique instance identifier.
    pub id: InstanceId,
    /// File name of the triggering input.
    pub file_name: String,
    /// Trigger input payload handed to the workflow definition.
    pub input: serde_json::Value,
    /// Current status.
    pub status: InstanceStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Final output, present only when completed.
    pub output: Option<serde_json::Value>,
    /// Failure detail, present only when failed.
    pub failure: Option<FailureRecord>,
}

impl InstanceRecord {
    /// Create a new running instance record.
    pub fn new(id: InstanceId, file_name: impl Into<String>, input: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id,
            file_name: file_name.into(),
            input,
            status: InstanceStatus::Running,
            created_at: now,
            updated_at: now,
            output: None,
            failure: None,
        }
    }

    /// Transition to completed with the final output.
    pub fn complete(&mut self, output: serde_json::Value) -> crate::error::Result<()> {
        self.transition(InstanceStatus::Completed)?;
        self.output = Some(output);
        Ok(())
    }

    /// Transition to failed with failure detail.
    pub fn fail(&mut self, failure: FailureRecord) -> crate::error::Result<()> {
        self.transition(InstanceStatus::Failed)?;
        self.failure = Some(failure);
        Ok(())
    }

    fn transition(&mut self, to: InstanceStatus) -> crate::error::Result<()> {
        if !self.status.can_transition_to(to) {
            return Err(Error::invalid_transition(
                self.status.to_string(),
                to.to_string(),
            ));
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}
