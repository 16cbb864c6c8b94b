//! Image metadata extraction.

use async_trait::async_trait;
use image::{ColorType, ImageFormat};
use serde_json::json;
use tracing::debug;

use lumina_engine::{Activity, Result};

use crate::input::{round2, AnalysisInput};

/// Activity name.
pub const NAME: &str = "analyze_metadata";

/// Extracts dimensions, format, and size facts from the image container.
pub struct MetadataAnalyzer;

#[async_trait]
impl Activity for MetadataAnalyzer {
    async fn execute(&self, input: &serde_json::Value) -> Result<serde_json::Value> {
        let input = AnalysisInput::from_value(input)?;
        let bytes = input.image_bytes()?;
        let format = image::guess_format(&bytes).ok().map(format_name);
        let image = input.decode_image(NAME)?;

        let (width, height) = (u64::from(image.width()), u64::from(image.height()));
        let total_pixels = width * height;

        debug!(
            file_name = %input.file_name,
            width,
            height,
            format = format.unwrap_or("Unknown"),
            "Metadata analysis finished"
        );

        Ok(json!({
            "width": width,
            "height": height,
            "format": format.unwrap_or("Unknown"),
            "mode": mode_name(image.color()),
            "totalPixels": total_pixels,
            "megapixels": round2(total_pixels as f64 / 1_000_000.0),
            "sizeKB": input.size_kb,
            "aspectRatio": format!("{width}:{height}"),
        }))
    }

    fn name(&self) -> &str {
        NAME
    }
}

fn format_name(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "JPEG",
        ImageFormat::Png => "PNG",
        ImageFormat::Gif => "GIF",
        ImageFormat::Bmp => "BMP",
        ImageFormat::Tiff => "TIFF",
        ImageFormat::WebP => "WEBP",
        ImageFormat::Ico => "ICO",
        _ => "Unknown",
    }
}

fn mode_name(color: ColorType) -> &'static str {
    match color {
        ColorType::L8 | ColorType::L16 => "L",
        ColorType::La8 | ColorType::La16 => "LA",
        ColorType::Rgb8 | ColorType::Rgb16 | ColorType::Rgb32F => "RGB",
        ColorType::Rgba8 | ColorType::Rgba16 | ColorType::Rgba32F => "RGBA",
        _ => "Unknown",
    }
}
