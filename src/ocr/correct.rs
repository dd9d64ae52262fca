//! OCR error correction for digit fields.
//!
//! The card UI's font makes Tesseract confuse a handful of letters with
//! digits. The confusion table and the known misreads are kept as plain
//! data so they can be extended without touching the parsers.

/// Recognized character → intended digit.
pub const DIGIT_CONFUSIONS: &[(char, char)] = &[
    ('O', '0'),
    ('o', '0'),
    ('Q', '0'),
    ('D', '0'),
    ('C', '0'),
    ('I', '1'),
    ('l', '1'),
    ('i', '1'),
    ('Z', '2'),
    ('z', '2'),
    ('S', '5'),
    ('s', '5'),
    ('G', '6'),
    ('B', '8'),
    ('b', '8'),
];

/// Whole-token misreads of the CVV label plus value, matched case-insensitively.
pub const KNOWN_CVV_MISREADS: &[(&str, &str)] = &[
    ("CWO7B", "078"),
    ("CVO7B", "078"),
    ("CWOTB", "078"),
    ("O7B", "078"),
];

pub const CVV_LEN: usize = 3;

/// Maps a confusable character to its digit. Tries the character as-is, then uppercased.
pub fn confused_digit(c: char) -> Option<char> {
    let lookup = |c: char| {
        DIGIT_CONFUSIONS
            .iter()
            .find(|(from, _)| *from == c)
            .map(|(_, to)| *to)
    };
    lookup(c).or_else(|| c.to_uppercase().next().and_then(lookup))
}

/// Converts a raw CVV candidate into digits.
///
/// Digits are kept, confusable letters are mapped, anything else is dropped.
/// When fewer than three digits survive and the raw token had at least three
/// characters, the remaining positions are re-read from the raw token (or
/// default to '0'). The result is cut to three characters, so it may still be
/// shorter than three when the raw token was short.
pub fn clean_cvv(raw: &str) -> String {
    let upper = raw.to_uppercase();
    if let Some((_, fixed)) = KNOWN_CVV_MISREADS.iter().find(|(bad, _)| *bad == upper) {
        return fixed.to_string();
    }

    let mut cleaned: String = raw
        .chars()
        .filter_map(|c| {
            if c.is_ascii_digit() {
                Some(c)
            } else {
                confused_digit(c)
            }
        })
        .collect();

    let raw_chars: Vec<char> = raw.chars().collect();
    let have = cleaned.chars().count();
    if have < CVV_LEN && raw_chars.len() >= CVV_LEN {
        for i in have..CVV_LEN {
            let fill = raw_chars
                .get(i)
                .and_then(|&c| confused_digit(c))
                .unwrap_or('0');
            cleaned.push(fill);
        }
    }

    cleaned.chars().take(CVV_LEN).collect()
}

/// Repairs a two-digit month read with a '9' in place of a '0'.
///
/// Only applies when the month is above 12; the first digit is tried before
/// the second. Anything that is not two digits is returned unchanged.
pub fn correct_month(month: &str) -> String {
    let Ok(value) = month.parse::<u32>() else {
        return month.to_string();
    };
    if value <= 12 || month.len() != 2 {
        return month.to_string();
    }

    let digits: Vec<char> = month.chars().collect();
    if digits[0] == '9' {
        format!("0{}", digits[1])
    } else if digits[1] == '9' {
        format!("{}0", digits[0])
    } else {
        month.to_string()
    }
}

/// Whether `month` is a two-digit month in 01..=12.
pub fn is_valid_month(month: &str) -> bool {
    month.len() == 2
        && month.chars().all(|c| c.is_ascii_digit())
        && matches!(month.parse::<u32>(), Ok(1..=12))
}

/// Undoes the UI's zero glyph being read as '@'.
pub fn normalize_raw_text(text: &str) -> String {
    text.replace("@@", "00").replace('@', "0")
}
