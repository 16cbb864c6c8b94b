//! Durable orchestration history for workflow instances.
//!
//! This crate holds the data model the orchestrator replays from:
//!
//! - **History events**: append-only scheduling and outcome entries, one log
//!   per workflow instance. The log is the single source of truth for
//!   progress; no separate "next step" pointer exists.
//! - **Instance records**: identity, trigger input, and terminal outcome of
//!   each instance, with absorbing terminal states.
//! - **Stores**: async traits for history and result persistence with
//!   in-memory implementations. Appends are atomic per instance and result
//!   writes are idempotent upserts.

pub mod error;
pub mod event;
pub mod log;
pub mod results;
pub mod store;
pub mod types;

pub use error::{Error, Result};
pub use event::HistoryEvent;
pub use log::{HistoryLog, ScheduledTask, TaskOutcome};
pub use results::{InMemoryResultStore, ResultStore, StoredResult, RESULTS_PARTITION};
pub use store::{HistoryStore, InMemoryHistoryStore};
pub use types::{
    EventId, FailureRecord, InstanceId, InstanceRecord, InstanceStatus, TaskId,
};
