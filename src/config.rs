//! Configuration types for card extraction.
//!
//! Loads settings from config.json at startup. Provides the panel search
//! band, card color range, preprocessing parameters and Tesseract overrides.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::record::RecordFormat;

/// A rectangle in relative coordinates (0.0 to 1.0).
/// Used for defining image regions that scale with screenshot size.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelativeRect {
    /// X position of top-left corner (0.0 = left edge, 1.0 = right edge)
    pub x: f32,
    /// Y position of top-left corner (0.0 = top edge, 1.0 = bottom edge)
    pub y: f32,
    /// Width as fraction of image width
    pub width: f32,
    /// Height as fraction of image height
    pub height: f32,
}

impl Default for RelativeRect {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
        }
    }
}

/// Inclusive HSV bounds, OpenCV scale (H 0..180, S and V 0..255).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|i| hsv[i] >= self.lower[i] && hsv[i] <= self.upper[i])
    }
}

impl Default for HsvRange {
    /// Green card background.
    fn default() -> Self {
        Self {
            lower: [40, 40, 40],
            upper: [90, 255, 255],
        }
    }
}

/// Complete extractor configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Part of the screenshot where the card panel renders
    pub search_band: RelativeRect,
    /// Crop inside the search band used when no card-colored region is found
    pub fallback_crop: RelativeRect,
    /// Color range of the card background
    pub card_hue: HsvRange,
    /// Smallest contour area (px²) accepted as the card
    pub min_region_area: f64,
    /// Pixels added on every side of the detected card
    pub region_margin: u32,
    /// Per-channel gain applied before grayscale conversion
    pub contrast_gain: f32,
    /// Neighbourhood size for adaptive thresholding (odd)
    pub adaptive_block_size: u32,
    /// Constant subtracted from the local mean
    pub adaptive_offset: i16,
    /// Digit runs from page furniture that must never be taken as a CVV
    pub spurious_tokens: Vec<String>,
    /// Explicit Tesseract executable
    pub tesseract_path: Option<PathBuf>,
    /// Explicit tessdata directory
    pub tessdata_dir: Option<PathBuf>,
    /// Tesseract page segmentation mode
    pub tesseract_psm: u8,
    /// Tesseract language
    pub ocr_language: String,
    /// Download traineddata when none is installed
    pub download_tessdata: bool,
    /// Append-only output file
    pub record_file: PathBuf,
    /// Columns written per record
    pub record_format: RecordFormat,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            search_band: RelativeRect {
                x: 0.60,
                y: 0.0,
                width: 0.40,
                height: 0.45,
            },
            fallback_crop: RelativeRect {
                x: 0.05,
                y: 0.10,
                width: 0.90,
                height: 0.55,
            },
            card_hue: HsvRange::default(),
            min_region_area: 1000.0,
            region_margin: 10,
            contrast_gain: 1.5,
            adaptive_block_size: 11,
            adaptive_offset: 2,
            spurious_tokens: vec!["91007".to_string()],
            tesseract_path: None,
            tessdata_dir: None,
            tesseract_psm: 6,
            ocr_language: "eng".to_string(),
            download_tessdata: true,
            record_file: PathBuf::from("relay_genned.txt"),
            record_format: RecordFormat::CardAndCvv,
        }
    }
}

/// Loads configuration from `path` or returns defaults.
///
/// A missing or malformed file is logged and never fatal.
pub fn load_config(path: &Path) -> ExtractorConfig {
    crate::log(&format!("Looking for config at: {}", path.display()));

    if !path.exists() {
        crate::log("config.json not found. Using default config.");
        return ExtractorConfig::default();
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(config) => {
                crate::log(&format!("Config loaded from {}", path.display()));
                config
            }
            Err(e) => {
                crate::log(&format!(
                    "Failed to parse {}: {}. Using defaults.",
                    path.display(),
                    e
                ));
                ExtractorConfig::default()
            }
        },
        Err(e) => {
            crate::log(&format!(
                "Failed to read {}: {}. Using defaults.",
                path.display(),
                e
            ));
            ExtractorConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = load_config(&dir.path().join("config.json"));
        assert_eq!(config.min_region_area, 1000.0);
        assert_eq!(config.spurious_tokens, vec!["91007".to_string()]);
        assert_eq!(config.record_format, RecordFormat::CardAndCvv);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "region_margin": 4,
                "record_format": "full",
                "card_hue": { "lower": [100, 50, 50], "upper": [130, 255, 255] }
            }"#,
        )
        .unwrap();

        let config = load_config(&path);
        assert_eq!(config.region_margin, 4);
        assert_eq!(config.record_format, RecordFormat::Full);
        assert_eq!(config.card_hue.lower, [100, 50, 50]);
        assert_eq!(config.tesseract_psm, 6);
        assert_eq!(config.search_band.x, 0.60);
    }

    #[test]
    fn test_malformed_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let config = load_config(&path);
        assert_eq!(config.region_margin, 10);
    }

    #[test]
    fn test_hsv_range_contains() {
        let range = HsvRange::default();
        assert!(range.contains([60, 200, 150]));
        assert!(range.contains([40, 40, 40]));
        assert!(!range.contains([39, 200, 150]));
        assert!(!range.contains([60, 20, 150]));
    }
}
