//! Mock object detection from image geometry.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use lumina_engine::{Activity, Result};

use crate::input::AnalysisInput;

/// Activity name.
pub const NAME: &str = "analyze_objects";

/// Pixel count above which an image counts as a high-resolution scene.
const HIGH_RES_PIXELS: u64 = 1_000_000;

/// Mock object detector: derives labels from image geometry only.
///
/// Stands in for a real vision backend; output shape matches what a real
/// detector would return so downstream aggregation is unaffected by a swap.
pub struct ObjectAnalyzer;

#[async_trait]
impl Activity for ObjectAnalyzer {
    async fn execute(&self, input: &serde_json::Value) -> Result<serde_json::Value> {
        let input = AnalysisInput::from_value(input)?;
        let image = input.decode_image(NAME)?;
        let (width, height) = (u64::from(image.width()), u64::from(image.height()));

        let mut objects = Vec::new();
        if width > height {
            objects.push(json!({"name": "landscape", "confidence": 0.85}));
        } else if height > width {
            objects.push(json!({"name": "portrait", "confidence": 0.82}));
        } else {
            objects.push(json!({"name": "square composition", "confidence": 0.90}));
        }

        if width * height > HIGH_RES_PIXELS {
            objects.push(json!({"name": "high-resolution scene", "confidence": 0.78}));
        }

        objects.push(json!({"name": "digital image", "confidence": 0.99}));

        debug!(
            file_name = %input.file_name,
            object_count = objects.len(),
            "Object analysis finished"
        );

        Ok(json!({
            "objects": objects,
            "objectCount": objects.len(),
            "note": "Mock analysis - replace with a vision backend for real detection",
        }))
    }

    fn name(&self) -> &str {
        NAME
    }
}
