//! Replay-driven workflow orchestration engine.
//!
//! The engine turns an append-only history log into scheduling decisions:
//! a [`WorkflowDefinition`] is a pure function of `(input, log)` producing a
//! [`Decision`], the [`Engine`] appends the resulting events atomically, and
//! the [`Runtime`] multiplexes per-instance decision loops over a bounded
//! pool of [`ActivityExecutor`] workers. Because decisions depend only on
//! the log, a process can crash at any point and resume by replaying.

pub mod activity;
pub mod definition;
pub mod engine;
pub mod error;
pub mod executor;
pub mod runtime;

pub use activity::{Activity, ActivityRegistry, FailingActivity, FlakyActivity, FnActivity};
pub use definition::{
    ActivityRequest, Decision, RetryPolicy, WorkflowDefinition, DEFAULT_ACTIVITY_TIMEOUT,
};
pub use engine::{ActivityTask, Advance, Engine};
pub use error::{Error, Result};
pub use executor::{ActivityExecutor, DEFAULT_MAX_CONCURRENT};
pub use runtime::{Runtime, RuntimeConfig};
