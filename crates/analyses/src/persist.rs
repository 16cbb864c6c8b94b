//! Final persistence of the analysis report.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use lumina_engine::{Activity, Error, Result};
use lumina_history::{ResultStore, StoredResult};

use crate::report::AnalysisReport;

/// Activity name.
pub const NAME: &str = "store_results";

/// Persists the final report into the result store.
///
/// The upsert is keyed by report id (= instance id), so re-execution after a
/// crash or an at-least-once redelivery overwrites the same record instead
/// of duplicating it.
pub struct ResultWriter {
    results: Arc<dyn ResultStore>,
}

impl ResultWriter {
    /// Create a writer over a result store.
    pub fn new(results: Arc<dyn ResultStore>) -> Self {
        Self { results }
    }
}

#[async_trait]
impl Activity for ResultWriter {
    async fn execute(&self, input: &Value) -> Result<Value> {
        let report: AnalysisReport = serde_json::from_value(input.clone())
            .map_err(|e| Error::serialization(format!("invalid report payload: {e}")))?;

        self.results
            .put(StoredResult::new(report.id.clone(), input.clone()))
            .await
            .map_err(|e| Error::persistence_failed(e.to_string()))?;

        info!(report_id = %report.id, file_name = %report.file_name, "Results stored");

        let summary = serde_json::to_value(&report.summary)
            .map_err(|e| Error::serialization(format!("summary serialization: {e}")))?;
        Ok(json!({
            "id": report.id,
            "fileName": report.file_name,
            "status": "stored",
            "analyzedAt": report.analyzed_at,
            "summary": summary,
        }))
    }

    fn name(&self) -> &str {
        NAME
    }
}
