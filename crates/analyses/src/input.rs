//! Trigger events and the analysis input payload.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::json;

use lumina_engine::{Error, Result};
use lumina_history::InstanceId;

/// An image upload notification, delivered at-least-once.
///
/// `delivery_id` identifies the upload event itself, not the file: the same
/// file uploaded twice is two deliveries and two instances, while a redelivery
/// of one upload carries the same id and maps to the same instance.
#[derive(Debug, Clone)]
pub struct TriggerEvent {
    /// Name of the uploaded image file.
    pub file_name: String,
    /// Raw image bytes.
    pub bytes: Vec<u8>,
    /// Delivery identifier from the transport.
    pub delivery_id: String,
}

impl TriggerEvent {
    /// Create a new trigger event.
    pub fn new(
        file_name: impl Into<String>,
        bytes: Vec<u8>,
        delivery_id: impl Into<String>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
            delivery_id: delivery_id.into(),
        }
    }

    /// The instance id this delivery maps to.
    ///
    /// Derived deterministically from file name and delivery id, so duplicate
    /// deliveries of the same trigger converge on one instance.
    pub fn instance_id(&self) -> InstanceId {
        InstanceId::derive(&self.file_name, &self.delivery_id)
    }

    /// Build the workflow input payload for this trigger.
    pub fn input(&self) -> serde_json::Value {
        json!({
            "id": self.instance_id().to_string(),
            "fileName": self.file_name,
            "blobPath": format!("images/{}", self.file_name),
            "imageData": STANDARD.encode(&self.bytes),
            "sizeKb": round2(self.bytes.len() as f64 / 1024.0),
        })
    }
}

/// Deserialized view of the workflow input payload the activities receive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisInput {
    /// Workflow instance id.
    pub id: String,
    /// Uploaded file name.
    pub file_name: String,
    /// Logical blob path of the upload.
    pub blob_path: String,
    /// Base64-encoded image bytes.
    pub image_data: String,
    /// Upload size in kilobytes.
    pub size_kb: f64,
}

impl AnalysisInput {
    /// Parse an analysis input from a raw payload.
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| Error::serialization(format!("invalid analysis input: {e}")))
    }

    /// Decode the raw image bytes.
    pub fn image_bytes(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(&self.image_data)
            .map_err(|e| Error::serialization(format!("invalid base64 image data: {e}")))
    }

    /// Decode the image itself, attributing failure to the given activity.
    pub fn decode_image(&self, activity: &str) -> Result<image::DynamicImage> {
        let bytes = self.image_bytes()?;
        image::load_from_memory(&bytes)
            .map_err(|e| Error::activity_failed(activity, format!("image decode failed: {e}")))
    }
}

/// Round to two decimal places.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Round to one decimal place.
pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
