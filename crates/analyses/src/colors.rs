//! Dominant color extraction over a downsampled pixel grid.

use async_trait::async_trait;
use image::imageops::FilterType;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::debug;

use lumina_engine::{Activity, Result};

use crate::input::{round1, AnalysisInput};

/// Activity name.
pub const NAME: &str = "analyze_colors";

/// Edge length of the sampling grid.
const SAMPLE_EDGE: u32 = 50;
/// Channel quantization step: colors are bucketed to multiples of this.
const BUCKET: u8 = 32;
/// Maximum per-channel difference for a pixel to count as gray.
const GRAY_TOLERANCE: i16 = 30;
/// Fraction of gray pixels above which the image is called grayscale.
const GRAY_FRACTION: f64 = 0.9;
/// Number of dominant colors reported.
const TOP_COLORS: usize = 5;

/// Extracts the dominant color palette of an image.
///
/// The image is resampled to a fixed 50x50 grid, each channel is quantized
/// to multiples of 32, and the five most frequent buckets are reported with
/// their share of sampled pixels. Grayscale detection counts pixels whose
/// channels are within tolerance of each other.
pub struct ColorAnalyzer;

#[async_trait]
impl Activity for ColorAnalyzer {
    async fn execute(&self, input: &serde_json::Value) -> Result<serde_json::Value> {
        let input = AnalysisInput::from_value(input)?;
        let image = input.decode_image(NAME)?;
        let sampled = image
            .resize_exact(SAMPLE_EDGE, SAMPLE_EDGE, FilterType::Triangle)
            .to_rgb8();

        // BTreeMap keys give a stable tie order between equal counts.
        let mut counts: BTreeMap<(u8, u8, u8), usize> = BTreeMap::new();
        let mut gray_pixels = 0usize;
        for pixel in sampled.pixels() {
            let [r, g, b] = pixel.0;
            let bucket = (
                r / BUCKET * BUCKET,
                g / BUCKET * BUCKET,
                b / BUCKET * BUCKET,
            );
            *counts.entry(bucket).or_insert(0) += 1;

            if (i16::from(r) - i16::from(g)).abs() < GRAY_TOLERANCE
                && (i16::from(g) - i16::from(b)).abs() < GRAY_TOLERANCE
            {
                gray_pixels += 1;
            }
        }

        let total = (SAMPLE_EDGE * SAMPLE_EDGE) as usize;
        let mut ranked: Vec<((u8, u8, u8), usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let dominant: Vec<serde_json::Value> = ranked
            .into_iter()
            .take(TOP_COLORS)
            .map(|((r, g, b), count)| {
                json!({
                    "hex": format!("#{r:02x}{g:02x}{b:02x}"),
                    "rgb": {"r": r, "g": g, "b": b},
                    "percentage": round1(count as f64 / total as f64 * 100.0),
                })
            })
            .collect();

        let is_grayscale = gray_pixels as f64 / total as f64 > GRAY_FRACTION;
        debug!(
            file_name = %input.file_name,
            colors = dominant.len(),
            is_grayscale,
            "Color analysis finished"
        );

        Ok(json!({
            "dominantColors": dominant,
            "isGrayscale": is_grayscale,
            "totalPixelsSampled": total,
        }))
    }

    fn name(&self) -> &str {
        NAME
    }
}
