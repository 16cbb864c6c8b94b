//! Report aggregation: join the four analysis outputs into one document.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use lumina_engine::{Activity, Error, Result};

/// Activity name.
pub const NAME: &str = "generate_report";

/// Joined input the aggregation step receives: instance identity plus the
/// output of each fan-out analysis, keyed by name.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportInput {
    pub id: String,
    pub file_name: String,
    pub blob_path: String,
    pub colors: Value,
    pub objects: Value,
    pub text: Value,
    pub metadata: Value,
}

/// Derived headline facts about one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub image_size: String,
    pub format: String,
    pub dominant_color: String,
    pub objects_detected: u64,
    pub has_text: bool,
    pub is_grayscale: bool,
}

/// The four raw analysis outputs, carried verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSet {
    pub colors: Value,
    pub objects: Value,
    pub text: Value,
    pub metadata: Value,
}

/// The final analysis report, wire-stable camelCase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    /// Report id, equal to the workflow instance id.
    pub id: String,
    pub file_name: String,
    pub blob_path: String,
    pub analyzed_at: DateTime<Utc>,
    pub summary: ReportSummary,
    pub analyses: AnalysisSet,
}

/// Aggregates the four analysis outputs into an [`AnalysisReport`].
///
/// Pure over its input apart from the `analyzedAt` timestamp; the timestamp
/// is recorded in the history log with the rest of the output, so replays
/// see the original value.
pub struct ReportGenerator;

#[async_trait]
impl Activity for ReportGenerator {
    async fn execute(&self, input: &Value) -> Result<Value> {
        let input: ReportInput = serde_json::from_value(input.clone())
            .map_err(|e| Error::aggregation_failed(format!("invalid joined input: {e}")))?;

        let summary = ReportSummary {
            image_size: format!(
                "{}x{}",
                input.metadata["width"].as_u64().unwrap_or(0),
                input.metadata["height"].as_u64().unwrap_or(0),
            ),
            format: input.metadata["format"]
                .as_str()
                .unwrap_or("Unknown")
                .to_string(),
            dominant_color: input.colors["dominantColors"][0]["hex"]
                .as_str()
                .unwrap_or("N/A")
                .to_string(),
            objects_detected: input.objects["objectCount"].as_u64().unwrap_or(0),
            has_text: input.text["hasText"].as_bool().unwrap_or(false),
            is_grayscale: input.colors["isGrayscale"].as_bool().unwrap_or(false),
        };

        let report = AnalysisReport {
            id: input.id,
            file_name: input.file_name,
            blob_path: input.blob_path,
            analyzed_at: Utc::now(),
            summary,
            analyses: AnalysisSet {
                colors: input.colors,
                objects: input.objects,
                text: input.text,
                metadata: input.metadata,
            },
        };

        info!(report_id = %report.id, file_name = %report.file_name, "Report generated");

        serde_json::to_value(&report)
            .map_err(|e| Error::aggregation_failed(format!("report serialization: {e}")))
    }

    fn name(&self) -> &str {
        NAME
    }
}
