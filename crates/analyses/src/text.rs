//! Mock OCR activity.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use lumina_engine::{Activity, Result};

use crate::input::AnalysisInput;

/// Activity name.
pub const NAME: &str = "analyze_text";

/// Mock OCR: validates the image decodes, then reports no text.
///
/// The image is still decoded so a corrupt upload fails here the same way it
/// would against a real OCR backend.
pub struct TextAnalyzer;

#[async_trait]
impl Activity for TextAnalyzer {
    async fn execute(&self, input: &serde_json::Value) -> Result<serde_json::Value> {
        let input = AnalysisInput::from_value(input)?;
        input.decode_image(NAME)?;

        debug!(file_name = %input.file_name, "Text analysis finished");

        Ok(json!({
            "hasText": false,
            "extractedText": "",
            "confidence": 0.0,
            "language": "unknown",
            "note": "Mock OCR - replace with a text extraction backend for real results",
        }))
    }

    fn name(&self) -> &str {
        NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::TriggerEvent;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    #[tokio::test]
    async fn test_reports_no_text() {
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, Rgb([0, 0, 0])))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        let input = TriggerEvent::new("img.png", bytes, "d").input();

        let output = TextAnalyzer.execute(&input).await.unwrap();
        assert_eq!(output["hasText"], false);
        assert_eq!(output["extractedText"], "");
        assert_eq!(output["language"], "unknown");
    }

    #[tokio::test]
    async fn test_corrupt_image_fails() {
        let input = TriggerEvent::new("bad.png", vec![9, 9, 9], "d").input();
        assert!(TextAnalyzer.execute(&input).await.is_err());
    }
}
