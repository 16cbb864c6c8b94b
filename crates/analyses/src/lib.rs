//! Image analysis workflow: four parallel analyses fanned out over an
//! uploaded image, joined into a report and persisted idempotently.
//!
//! The activities here plug into the `lumina-engine` orchestrator via
//! [`ImageAnalysisWorkflow`]; everything nondeterministic (decoding, clocks,
//! storage) lives in the activities, keeping the workflow plan replayable.

pub mod colors;
pub mod input;
pub mod metadata;
pub mod objects;
pub mod persist;
pub mod report;
pub mod text;
pub mod workflow;

pub use input::{AnalysisInput, TriggerEvent};
pub use report::{AnalysisReport, AnalysisSet, ReportSummary};
pub use workflow::{ImageAnalysisWorkflow, ANALYSES, WORKFLOW_NAME};
