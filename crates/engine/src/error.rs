//! Error types for the engine crate.

use std::fmt;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Engine error types.
#[derive(Debug, Clone)]
pub enum Error {
    /// An activity execution failed.
    ActivityFailed { activity: String, reason: String },
    /// An activity exceeded its timeout.
    ActivityTimeout {
        activity: String,
        timeout_secs: u64,
    },
    /// No activity registered under the requested name.
    ActivityNotFound { activity: String },
    /// The aggregation step could not produce a report.
    AggregationFailed { reason: String },
    /// Persisting the final result failed.
    PersistenceFailed { reason: String },
    /// Instance not found.
    InstanceNotFound { instance_id: String },
    /// History storage error.
    History(lumina_history::Error),
    /// Serialization error.
    Serialization { reason: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ActivityFailed { activity, reason } => {
                write!(f, "activity '{activity}' failed: {reason}")
            }
            Self::ActivityTimeout {
                activity,
                timeout_secs,
            } => {
                write!(f, "activity '{activity}' timed out after {timeout_secs}s")
            }
            Self::ActivityNotFound { activity } => {
                write!(f, "activity '{activity}' not registered")
            }
            Self::AggregationFailed { reason } => {
                write!(f, "aggregation failed: {reason}")
            }
            Self::PersistenceFailed { reason } => {
                write!(f, "persistence failed: {reason}")
            }
            Self::InstanceNotFound { instance_id } => {
                write!(f, "instance '{instance_id}' not found")
            }
            Self::History(err) => {
                write!(f, "history error: {err}")
            }
            Self::Serialization { reason } => {
                write!(f, "serialization error: {reason}")
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<lumina_history::Error> for Error {
    fn from(err: lumina_history::Error) -> Self {
        Self::History(err)
    }
}

impl Error {
    /// Create an activity failed error.
    pub fn activity_failed(activity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ActivityFailed {
            activity: activity.into(),
            reason: reason.into(),
        }
    }

    /// Create an activity timeout error.
    pub fn activity_timeout(activity: impl Into<String>, timeout_secs: u64) -> Self {
        Self::ActivityTimeout {
            activity: activity.into(),
            timeout_secs,
        }
    }

    /// Create an activity not found error.
    pub fn activity_not_found(activity: impl Into<String>) -> Self {
        Self::ActivityNotFound {
            activity: activity.into(),
        }
    }

    /// Create an aggregation failed error.
    pub fn aggregation_failed(reason: impl Into<String>) -> Self {
        Self::AggregationFailed {
            reason: reason.into(),
        }
    }

    /// Create a persistence failed error.
    pub fn persistence_failed(reason: impl Into<String>) -> Self {
        Self::PersistenceFailed {
            reason: reason.into(),
        }
    }

    /// Create an instance not found error.
    pub fn instance_not_found(instance_id: impl Into<String>) -> Self {
        Self::InstanceNotFound {
            instance_id: instance_id.into(),
        }
    }

    /// Create a serialization error.
    pub fn serialization(reason: impl Into<String>) -> Self {
        Self::Serialization {
            reason: reason.into(),
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ActivityFailed { .. }
                | Self::ActivityTimeout { .. }
                | Self::PersistenceFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::activity_failed("analyze_colors", "decode error");
        assert!(err.to_string().contains("analyze_colors"));
        assert!(err.to_string().contains("decode error"));
    }

    #[test]
    fn test_is_retryable() {
        assert!(Error::activity_failed("x", "transient").is_retryable());
        assert!(Error::persistence_failed("store down").is_retryable());
        assert!(!Error::aggregation_failed("bad join input").is_retryable());
        assert!(!Error::activity_not_found("x").is_retryable());
    }
}
