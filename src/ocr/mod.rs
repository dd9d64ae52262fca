pub mod setup;
pub mod preprocess;
pub mod engine;
pub mod locate;
pub mod correct;
pub mod extract;

pub use setup::ensure_tesseract;
pub use engine::{OcrEngine, TesseractEngine};
pub use extract::parse_fields;

use image::{GrayImage, RgbaImage};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::card::CardDetails;
use crate::config::ExtractorConfig;
use crate::log;
use locate::{RoiSource, locate_card};
use preprocess::{Roi, adaptive_binarize, otsu_binarize, scale_contrast, to_grayscale};

/// Failures that abort an extraction before any OCR runs.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("image not found: {0}")]
    ImageNotFound(PathBuf),
    #[error("failed to load image {path}: {source}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Which screenshot layout the image follows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExtractionMode {
    /// Screenshot of the banking page; the card panel is located first.
    #[default]
    Panel,
    /// Whole image is read at once after a global Otsu threshold.
    FullScreen,
}

/// An image handed to the OCR engine, kept for debugging.
#[derive(Clone, Debug)]
pub struct OcrPass {
    pub name: &'static str,
    pub image: GrayImage,
}

/// Everything one extraction produced.
#[derive(Clone, Debug)]
pub struct Extraction {
    pub details: CardDetails,
    pub raw_text: String,
    pub roi: Roi,
    pub roi_source: RoiSource,
    pub crop: RgbaImage,
    pub passes: Vec<OcrPass>,
}

/// Runs one OCR pass. Engine failures are logged and read as no text.
fn recognize_or_empty(engine: &dyn OcrEngine, pass: &OcrPass) -> String {
    match engine.recognize(&pass.image) {
        Ok(text) => text,
        Err(e) => {
            log(&format!("OCR pass '{}' failed: {}", pass.name, e));
            String::new()
        }
    }
}

/// High-level function: screenshot → card fields.
///
/// Panel mode locates the card, then reads it twice (contrast-enhanced
/// grayscale and adaptive threshold) and concatenates both texts so each
/// preprocessing gets a chance at the characters it reads best. Missing
/// fields are left empty for the caller to fill in.
pub fn extract_card_details(
    img: &RgbaImage,
    mode: ExtractionMode,
    config: &ExtractorConfig,
    engine: &dyn OcrEngine,
) -> Extraction {
    let (roi, roi_source, crop, passes, raw_text) = match mode {
        ExtractionMode::Panel => {
            let located = locate_card(img, config);
            log(&format!(
                "Card crop: ({}, {}) {}x{} [{:?}]",
                located.roi.x, located.roi.y, located.roi.width, located.roi.height, located.source
            ));

            let enhanced = scale_contrast(&located.image, config.contrast_gain);
            let gray = to_grayscale(&enhanced);
            let binary =
                adaptive_binarize(&gray, config.adaptive_block_size, config.adaptive_offset);

            let passes = vec![
                OcrPass { name: "gray", image: gray },
                OcrPass { name: "binary", image: binary },
            ];
            let raw_text = passes
                .iter()
                .map(|pass| recognize_or_empty(engine, pass))
                .collect::<Vec<_>>()
                .join("\n");

            (located.roi, located.source, located.image, passes, raw_text)
        }
        ExtractionMode::FullScreen => {
            let (width, height) = img.dimensions();
            let binary = otsu_binarize(&to_grayscale(img));
            let passes = vec![OcrPass { name: "otsu", image: binary }];
            let raw_text = recognize_or_empty(engine, &passes[0]).replace(' ', "");

            let roi = Roi { x: 0, y: 0, width, height };
            (roi, RoiSource::Fallback, img.clone(), passes, raw_text)
        }
    };

    let details = parse_fields(&raw_text, config);
    log(&format!("Extracted card details: {}", details));

    Extraction {
        details,
        raw_text,
        roi,
        roi_source,
        crop,
        passes,
    }
}

/// Loads `path` and extracts card fields from it.
pub fn extract_from_path(
    path: &Path,
    mode: ExtractionMode,
    config: &ExtractorConfig,
    engine: &dyn OcrEngine,
) -> Result<Extraction, ExtractError> {
    if !path.is_file() {
        return Err(ExtractError::ImageNotFound(path.to_path_buf()));
    }

    let img = image::open(path)
        .map_err(|source| ExtractError::ImageDecode {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgba8();

    log(&format!(
        "Loaded {} ({}x{})",
        path.display(),
        img.width(),
        img.height()
    ));

    Ok(extract_card_details(&img, mode, config, engine))
}
