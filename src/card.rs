//! Extracted card field types.

use std::fmt;

/// One of the four values read off a virtual-card panel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    CardNumber,
    ExpMonth,
    ExpYear,
    Cvv,
}

impl Field {
    /// Label shown to the operator when asking for a manual value.
    pub fn label(self) -> &'static str {
        match self {
            Field::CardNumber => "card number",
            Field::ExpMonth => "expiration month (MM)",
            Field::ExpYear => "expiration year (YY)",
            Field::Cvv => "CVV",
        }
    }
}

/// Expiration date as printed on the card (MM/YY).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expiry {
    pub month: String,
    pub year: String,
}

/// How much a parsed value can be trusted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Confidence {
    /// Pattern matched the text verbatim.
    Exact,
    /// OCR character confusions were corrected to get the value.
    Corrected,
    /// Picked by elimination or loose token collection. May be wrong.
    Heuristic,
}

/// A parsed value together with the strategy that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldMatch<T> {
    pub value: T,
    pub confidence: Confidence,
    pub strategy: &'static str,
}

impl<T> FieldMatch<T> {
    pub fn new(value: T, confidence: Confidence, strategy: &'static str) -> Self {
        Self {
            value,
            confidence,
            strategy,
        }
    }
}

/// Best-effort result of one extraction pass. Empty fields need a manual value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CardDetails {
    pub card_number: Option<String>,
    pub exp_month: Option<String>,
    pub exp_year: Option<String>,
    pub cvv: Option<String>,
}

impl CardDetails {
    /// Fields still empty, in the order the operator is asked for them.
    pub fn missing_fields(&self) -> Vec<Field> {
        let mut missing = Vec::new();
        if self.card_number.is_none() {
            missing.push(Field::CardNumber);
        }
        if self.exp_month.is_none() {
            missing.push(Field::ExpMonth);
        }
        if self.exp_year.is_none() {
            missing.push(Field::ExpYear);
        }
        if self.cvv.is_none() {
            missing.push(Field::Cvv);
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    pub fn exp_month(&self) -> Option<&str> {
        self.exp_month.as_deref()
    }

    pub fn exp_year(&self) -> Option<&str> {
        self.exp_year.as_deref()
    }

    /// Stores both halves of a parsed expiration date.
    pub fn set_expiry(&mut self, expiry: Expiry) {
        self.exp_month = Some(expiry.month);
        self.exp_year = Some(expiry.year);
    }
}

/// Masks everything but the last four digits, for log lines.
pub fn mask_card_number(number: &str) -> String {
    let len = number.chars().count();
    if len <= 4 {
        return "*".repeat(len);
    }
    let tail: String = number.chars().skip(len - 4).collect();
    format!("{}{}", "*".repeat(len - 4), tail)
}

impl fmt::Display for CardDetails {
    /// Log-safe summary: masked card number, expiry, CVV presence only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let card = self
            .card_number
            .as_deref()
            .map(mask_card_number)
            .unwrap_or_else(|| "<missing>".to_string());
        let expiry = match (self.exp_month(), self.exp_year()) {
            (None, None) => "<missing>".to_string(),
            (month, year) => format!("{}/{}", month.unwrap_or("??"), year.unwrap_or("??")),
        };
        let cvv = if self.cvv.is_some() { "***" } else { "<missing>" };
        write!(f, "card={} exp={} cvv={}", card, expiry, cvv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_order() {
        let details = CardDetails::default();
        assert_eq!(
            details.missing_fields(),
            vec![Field::CardNumber, Field::ExpMonth, Field::ExpYear, Field::Cvv]
        );
        assert!(!details.is_complete());
    }

    #[test]
    fn test_complete_details() {
        let details = CardDetails {
            card_number: Some("4111111111111111".to_string()),
            exp_month: Some("03".to_string()),
            exp_year: Some("29".to_string()),
            cvv: Some("348".to_string()),
        };
        assert!(details.is_complete());
        assert_eq!(details.exp_month(), Some("03"));
        assert_eq!(details.exp_year(), Some("29"));
    }

    #[test]
    fn test_display_masks_sensitive_values() {
        let details = CardDetails {
            card_number: Some("4111111111111234".to_string()),
            cvv: Some("348".to_string()),
            ..CardDetails::default()
        };
        let shown = details.to_string();
        assert_eq!(shown, "card=************1234 exp=<missing> cvv=***");
        assert!(!shown.contains("348"));
    }

    #[test]
    fn test_partial_expiry() {
        let mut details = CardDetails {
            exp_month: Some("03".to_string()),
            ..CardDetails::default()
        };
        assert_eq!(
            details.missing_fields(),
            vec![Field::CardNumber, Field::ExpYear, Field::Cvv]
        );
        assert!(details.to_string().contains("exp=03/??"));

        details.set_expiry(Expiry {
            month: "04".to_string(),
            year: "30".to_string(),
        });
        assert_eq!(details.exp_month(), Some("04"));
        assert_eq!(details.exp_year(), Some("30"));
    }

    #[test]
    fn test_mask_short_number() {
        assert_eq!(mask_card_number("123"), "***");
    }
}
