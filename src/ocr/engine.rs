use anyhow::{Result, anyhow};
use image::GrayImage;
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;

use super::setup::TesseractPaths;
use crate::config::ExtractorConfig;

/// Turns a preprocessed image into raw text.
pub trait OcrEngine {
    fn recognize(&self, img: &GrayImage) -> Result<String>;
}

/// Runs the Tesseract command-line tool.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    pub executable: PathBuf,
    pub tessdata: Option<PathBuf>,
    pub language: String,
    pub psm: u8,
}

impl TesseractEngine {
    pub fn new(paths: TesseractPaths, config: &ExtractorConfig) -> Self {
        Self {
            executable: paths.executable,
            tessdata: paths.tessdata,
            language: config.ocr_language.clone(),
            psm: config.tesseract_psm,
        }
    }
}

impl OcrEngine for TesseractEngine {
    /// Saves the image to a temporary PNG and reads Tesseract's stdout.
    fn recognize(&self, img: &GrayImage) -> Result<String> {
        let temp_input = NamedTempFile::with_suffix(".png")?;
        img.save(temp_input.path())?;

        let mut command = Command::new(&self.executable);
        command.arg(temp_input.path()).arg("stdout");
        if let Some(tessdata) = &self.tessdata {
            command.arg("--tessdata-dir").arg(tessdata);
        }
        let output = command
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(self.psm.to_string())
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
