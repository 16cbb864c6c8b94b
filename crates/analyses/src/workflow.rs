//! The image analysis workflow definition.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use lumina_engine::{
    ActivityRegistry, ActivityRequest, Decision, RetryPolicy, WorkflowDefinition,
};
use lumina_history::{FailureRecord, HistoryLog, ResultStore, TaskOutcome};

use crate::persist::ResultWriter;
use crate::{colors, metadata, objects, persist, report, text};

/// Workflow name.
pub const WORKFLOW_NAME: &str = "image_analyzer";

/// The four analyses run in parallel during fan-out.
pub const ANALYSES: [&str; 4] = [colors::NAME, objects::NAME, text::NAME, metadata::NAME];

/// Where one activity stands after replaying the log against its retry
/// policy.
enum StepState {
    /// Never scheduled.
    Unscheduled,
    /// Scheduled, no terminal outcome yet.
    Waiting,
    /// Latest attempt failed with retry budget left; value is the next
    /// attempt number.
    Retry(u32),
    /// Latest attempt succeeded.
    Done(Value),
    /// Failed with the retry budget exhausted.
    Exhausted(String),
}

/// Fan-out/fan-in image analysis: four parallel analyses, then report
/// aggregation, then persistence.
///
/// `plan` is a pure function of the input and the history log. Each call
/// replays the whole log, so the same history always produces the same
/// decision regardless of how many times or on which process it runs.
pub struct ImageAnalysisWorkflow;

impl ImageAnalysisWorkflow {
    /// Build the activity registry this workflow executes against.
    pub fn registry(results: Arc<dyn ResultStore>) -> ActivityRegistry {
        let mut registry = ActivityRegistry::new();
        registry.register(Arc::new(colors::ColorAnalyzer));
        registry.register(Arc::new(objects::ObjectAnalyzer));
        registry.register(Arc::new(text::TextAnalyzer));
        registry.register(Arc::new(metadata::MetadataAnalyzer));
        registry.register(Arc::new(report::ReportGenerator));
        registry.register(Arc::new(ResultWriter::new(results)));
        registry
    }

    fn step_state(&self, log: &HistoryLog, activity: &str) -> StepState {
        let attempts = log.attempts(activity);
        if attempts == 0 {
            return StepState::Unscheduled;
        }
        match log.latest_outcome(activity) {
            None => StepState::Waiting,
            Some(TaskOutcome::Completed(output)) => StepState::Done(output),
            Some(TaskOutcome::Failed(error)) => {
                if self.retry_policy(activity).allows(attempts + 1) {
                    StepState::Retry(attempts + 1)
                } else {
                    StepState::Exhausted(error)
                }
            }
        }
    }

    /// Drive one sequential step, falling through to `and_then` with the
    /// step's output once it has succeeded.
    fn chain_step(
        &self,
        log: &HistoryLog,
        activity: &'static str,
        step_input: Value,
        partial: &BTreeMap<String, Value>,
        and_then: impl FnOnce(Value) -> Decision,
    ) -> Decision {
        match self.step_state(log, activity) {
            StepState::Unscheduled => {
                Decision::Schedule(vec![ActivityRequest::new(activity, step_input)])
            }
            StepState::Retry(attempt) => {
                Decision::Schedule(vec![ActivityRequest::retry(activity, step_input, attempt)])
            }
            StepState::Waiting => Decision::Wait,
            StepState::Exhausted(error) => Decision::Fail(
                FailureRecord::step_failure(activity, error).with_partial(partial.clone()),
            ),
            StepState::Done(output) => and_then(output),
        }
    }
}

impl WorkflowDefinition for ImageAnalysisWorkflow {
    fn name(&self) -> &str {
        WORKFLOW_NAME
    }

    fn plan(&self, input: &Value, log: &HistoryLog) -> Decision {
        // Fan-out: all four analyses are scheduled in one batch; the fan-in
        // below joins by activity name, so completion order is irrelevant.
        let mut outputs = BTreeMap::new();
        let mut failed = BTreeMap::new();
        let mut to_schedule = Vec::new();
        let mut waiting = false;

        for name in ANALYSES {
            match self.step_state(log, name) {
                StepState::Unscheduled => {
                    to_schedule.push(ActivityRequest::new(name, input.clone()));
                }
                StepState::Retry(attempt) => {
                    to_schedule.push(ActivityRequest::retry(name, input.clone(), attempt));
                }
                StepState::Waiting => waiting = true,
                StepState::Done(output) => {
                    outputs.insert(name.to_string(), output);
                }
                StepState::Exhausted(error) => {
                    failed.insert(name.to_string(), error);
                }
            }
        }

        if !to_schedule.is_empty() {
            return Decision::Schedule(to_schedule);
        }
        if waiting {
            return Decision::Wait;
        }
        // All siblings are terminal before the instance fails, so every
        // successful sibling's output is retained on the failure record.
        if !failed.is_empty() {
            return Decision::Fail(FailureRecord::activity_failures(failed, outputs));
        }

        // Chain: aggregate, then persist, then complete with the stored
        // acknowledgement.
        let report_input = json!({
            "id": input["id"],
            "fileName": input["fileName"],
            "blobPath": input["blobPath"],
            "colors": outputs[colors::NAME],
            "objects": outputs[objects::NAME],
            "text": outputs[text::NAME],
            "metadata": outputs[metadata::NAME],
        });

        self.chain_step(log, report::NAME, report_input, &outputs, |report_output| {
            self.chain_step(log, persist::NAME, report_output, &outputs, Decision::Complete)
        })
    }

    fn retry_policy(&self, activity: &str) -> RetryPolicy {
        match activity {
            // Aggregation is pure; a failure there is deterministic and
            // retrying cannot change it.
            report::NAME => RetryPolicy::none(),
            persist::NAME => RetryPolicy::new(3, Duration::from_millis(100)),
            _ => RetryPolicy::new(2, Duration::from_millis(100)),
        }
    }

    fn timeout(&self, activity: &str) -> Duration {
        match activity {
            persist::NAME => Duration::from_secs(30),
            _ => Duration::from_secs(120),
        }
    }
}
