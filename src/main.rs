//! Card Field Extractor
//!
//! Reads a virtual card's number, expiration and CVV off a screenshot of a
//! banking page using Tesseract, asks the operator for anything it could
//! not read, and appends the result to a local record file.

mod card;
mod config;
mod fallback;
mod ocr;
mod paths;
mod record;

use anyhow::{Context, Result, anyhow};
use chrono::Local;
use clap::Parser;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::fallback::{StdinPrompt, complete_manually};
use crate::ocr::locate::RoiSource;
use crate::ocr::setup::TesseractPaths;
use crate::ocr::{ExtractionMode, Extraction, TesseractEngine, extract_from_path};
use crate::record::{RecordFormat, append_record};

const LOG_FILE: &str = "cardgen_ocr.log";

/// Logs a message to both console and log file with timestamp.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    print!("{}", line);
    let log_path = paths::get_logs_dir().join(LOG_FILE);
    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        let _ = file.write_all(line.as_bytes());
    }
}

/// Extract virtual card details from a screenshot
#[derive(Parser, Debug)]
#[command(name = "cardgen-ocr")]
#[command(about = "Reads card number, expiration and CVV from a card panel screenshot")]
struct Args {
    /// Screenshot to read (PNG)
    image: PathBuf,

    /// Config file (defaults to config.json next to the executable)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Record file to append to (overrides config)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Columns written to the record file (overrides config)
    #[arg(short, long, value_enum)]
    format: Option<RecordFormat>,

    /// Read the whole screenshot instead of locating the card panel
    #[arg(long)]
    full_screen: bool,

    /// Do not ask for fields that could not be read
    #[arg(long)]
    no_prompt: bool,

    /// Save the card crop and OCR input images here
    #[arg(long)]
    debug_dir: Option<PathBuf>,
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = if let Some(loc) = panic_info.location() {
            format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column())
        } else {
            String::new()
        };
        let log_msg = format!("[PANIC]{} {}\n", location, msg);
        eprintln!("{}", log_msg);
        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(paths::get_logs_dir().join(LOG_FILE))
        {
            let _ = file.write_all(log_msg.as_bytes());
        }
    }));
}

/// Writes the crop and every OCR input image to `dir`.
fn save_debug_images(dir: &Path, extraction: &Extraction) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let crop_path = dir.join("card_area_only.png");
    extraction
        .crop
        .save(&crop_path)
        .with_context(|| format!("Failed to save {}", crop_path.display()))?;

    let text_path = dir.join("raw_ocr.txt");
    std::fs::write(&text_path, &extraction.raw_text)
        .with_context(|| format!("Failed to save {}", text_path.display()))?;

    for pass in &extraction.passes {
        let path = dir.join(format!("ocr_input_{}.png", pass.name));
        pass.image
            .save(&path)
            .with_context(|| format!("Failed to save {}", path.display()))?;
    }

    let roi = extraction.roi;
    let source = match extraction.roi_source {
        RoiSource::Detected { area } => format!("detected, area {:.0}", area),
        RoiSource::Fallback => "fallback".to_string(),
    };
    log(&format!(
        "Debug images saved to {} (crop ({}, {}) {}x{}, {})",
        dir.display(),
        roi.x,
        roi.y,
        roi.width,
        roi.height,
        source
    ));
    Ok(())
}

fn main() -> Result<()> {
    install_panic_hook();
    let args = Args::parse();

    paths::ensure_directories()?;

    let config_path = args.config.clone().unwrap_or_else(paths::get_config_path);
    let config = config::load_config(&config_path);

    // Without Tesseract every pass reads nothing and the operator fills the fields in
    let tesseract = ocr::ensure_tesseract(&config).unwrap_or_else(|e| {
        log(&format!("Warning: Failed to setup Tesseract: {}", e));
        log("OCR will not find anything; fields must be entered manually.");
        TesseractPaths {
            executable: PathBuf::from("tesseract"),
            tessdata: None,
        }
    });
    let engine = TesseractEngine::new(tesseract, &config);

    let mode = if args.full_screen {
        ExtractionMode::FullScreen
    } else {
        ExtractionMode::Panel
    };

    log(&format!("Extracting card details from: {}", args.image.display()));
    let extraction = match extract_from_path(&args.image, mode, &config, &engine) {
        Ok(extraction) => extraction,
        Err(e) => {
            log(&format!("Error: {}", e));
            return Err(e.into());
        }
    };

    if let Some(dir) = &args.debug_dir {
        if let Err(e) = save_debug_images(dir, &extraction) {
            log(&format!("Warning: {:#}", e));
        }
    }

    let details = if args.no_prompt || extraction.details.is_complete() {
        extraction.details
    } else {
        complete_manually(extraction.details, &mut StdinPrompt)
    };

    if details.card_number.is_none() {
        log("FAILED: No card number extracted or entered, nothing recorded");
        return Err(anyhow!("no card number for {}", args.image.display()));
    }

    let output = args.output.unwrap_or_else(|| config.record_file.clone());
    let format = args.format.unwrap_or(config.record_format);
    append_record(&output, &details, format)?;

    log(&format!("Card details saved to {} ({})", output.display(), details));
    Ok(())
}
