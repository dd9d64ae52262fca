//! Append-only record file for extracted cards.
//!
//! Each extraction appends one comma-joined line. The file is opened in
//! append mode for every write so earlier records survive a crash.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::card::CardDetails;

const DELIMITER: char = ',';

/// Columns written per record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RecordFormat {
    /// `card_number,cvv`
    #[default]
    CardAndCvv,
    /// `card_number,month,year,cvv`
    Full,
}

/// Formats one record line (without trailing newline).
///
/// Missing values are written as empty columns. Values containing the
/// delimiter are rejected since the file has no escaping.
pub fn format_record(details: &CardDetails, format: RecordFormat) -> Result<String> {
    let card = details.card_number.as_deref().unwrap_or("");
    let cvv = details.cvv.as_deref().unwrap_or("");

    let columns: Vec<&str> = match format {
        RecordFormat::CardAndCvv => vec![card, cvv],
        RecordFormat::Full => vec![
            card,
            details.exp_month().unwrap_or(""),
            details.exp_year().unwrap_or(""),
            cvv,
        ],
    };

    if let Some(bad) = columns.iter().find(|c| c.contains(DELIMITER)) {
        return Err(anyhow!(
            "Value {:?} contains the record delimiter '{}'",
            bad,
            DELIMITER
        ));
    }

    Ok(columns.join(&DELIMITER.to_string()))
}

/// Appends one record to `path`, creating the file if needed.
///
/// Nothing is written unless a card number is present.
pub fn append_record(path: &Path, details: &CardDetails, format: RecordFormat) -> Result<()> {
    if details.card_number.is_none() {
        return Err(anyhow!("No card number, record not written"));
    }

    let line = format_record(details, format)?;

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {} for append", path.display()))?;

    writeln!(file, "{}", line).context("Failed to write record")?;
    Ok(())
}
