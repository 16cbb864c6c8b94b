//! Error types for the history crate.

use std::fmt;

/// Result type alias for history operations.
pub type Result<T> = std::result::Result<T, Error>;

/// History error types.
#[derive(Debug, Clone)]
pub enum Error {
    /// Store operation failed.
    StoreFailed { operation: String, reason: String },
    /// Instance not found.
    InstanceNotFound { instance_id: String },
    /// A scheduled event reused an existing task id.
    DuplicateTask { task_id: u64 },
    /// A terminal event referenced a task id that was never scheduled.
    UnknownTask { task_id: u64 },
    /// A terminal event was appended for a task that already has one.
    TaskAlreadyTerminal { task_id: u64 },
    /// Invalid instance state transition.
    InvalidTransition { from: String, to: String },
    /// Serialization error.
    Serialization { reason: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StoreFailed { operation, reason } => {
                write!(f, "store operation '{operation}' failed: {reason}")
            }
            Self::InstanceNotFound { instance_id } => {
                write!(f, "instance '{instance_id}' not found")
            }
            Self::DuplicateTask { task_id } => {
                write!(f, "task id {task_id} already scheduled")
            }
            Self::UnknownTask { task_id } => {
                write!(f, "task id {task_id} was never scheduled")
            }
            Self::TaskAlreadyTerminal { task_id } => {
                write!(f, "task id {task_id} already has a terminal event")
            }
            Self::InvalidTransition { from, to } => {
                write!(f, "invalid instance transition from '{from}' to '{to}'")
            }
            Self::Serialization { reason } => {
                write!(f, "serialization error: {reason}")
            }
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Create a store failed error.
    pub fn store_failed(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StoreFailed {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create an instance not found error.
    pub fn instance_not_found(instance_id: impl Into<String>) -> Self {
        Self::InstanceNotFound {
            instance_id: instance_id.into(),
        }
    }

    /// Create an invalid transition error.
    pub fn invalid_transition(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::InvalidTransition {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Create a serialization error.
    pub fn serialization(reason: impl Into<String>) -> Self {
        Self::Serialization {
            reason: reason.into(),
        }
    }
}
