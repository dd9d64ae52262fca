//! Manual entry for fields the extractor could not read.
//!
//! Each missing field is asked for exactly once. Whatever the operator
//! types is accepted as-is; an empty answer leaves the field empty.

use std::io::{self, BufRead, Write};

use crate::card::{CardDetails, Field};
use crate::log;

/// Source of operator-supplied values.
pub trait ManualInput {
    /// Asks for one field. `None` means no value was given.
    fn prompt(&mut self, field: Field) -> Option<String>;
}

/// Reads answers line by line from stdin.
pub struct StdinPrompt;

impl ManualInput for StdinPrompt {
    fn prompt(&mut self, field: Field) -> Option<String> {
        print!("Please enter {} manually: ", field.label());
        let _ = io::stdout().flush();

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                let value = line.trim();
                if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                }
            }
        }
    }
}

/// Fills the empty fields of `details` from `input`.
///
/// Month and year are asked for and kept separately, so a month typed
/// without a year still reaches the record.
pub fn complete_manually(mut details: CardDetails, input: &mut dyn ManualInput) -> CardDetails {
    let missing = details.missing_fields();
    if missing.is_empty() {
        return details;
    }

    log(&format!(
        "Could not extract {} field(s) automatically, asking for manual entry",
        missing.len()
    ));

    for field in missing {
        let value = input.prompt(field);
        if value.is_none() {
            log(&format!("No manual value for {}", field.label()));
        }
        match field {
            Field::CardNumber => details.card_number = value,
            Field::ExpMonth => details.exp_month = value,
            Field::ExpYear => details.exp_year = value,
            Field::Cvv => details.cvv = value,
        }
    }

    details
}
