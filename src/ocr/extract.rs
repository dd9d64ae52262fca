//! Card field parsers over raw OCR text.
//!
//! Each field has an ordered list of strategies, most specific first. The
//! first strategy that yields a well-formed value wins; permissive patterns
//! come last because they can latch onto unrelated digits on the page.

use regex::Regex;

use super::correct::{CVV_LEN, clean_cvv, correct_month, is_valid_month, normalize_raw_text};
use crate::card::{CardDetails, Confidence, Expiry, FieldMatch, mask_card_number};
use crate::config::ExtractorConfig;
use crate::log;

/// What earlier parsers already claimed, for strategies that work by elimination.
#[derive(Clone, Copy, Debug, Default)]
pub struct FieldContext<'a> {
    pub card_number: Option<&'a str>,
    pub expiry: Option<&'a Expiry>,
    pub spurious_tokens: &'a [String],
}

type StrategyFn<T> = Box<dyn Fn(&str, &FieldContext<'_>) -> Option<FieldMatch<T>>>;

/// One way of reading a field out of the text.
pub struct Strategy<T> {
    pub name: &'static str,
    run: StrategyFn<T>,
}

impl<T> Strategy<T> {
    pub fn new(
        name: &'static str,
        run: impl Fn(&str, &FieldContext<'_>) -> Option<FieldMatch<T>> + 'static,
    ) -> Self {
        Self {
            name,
            run: Box::new(run),
        }
    }

    pub fn run(&self, text: &str, ctx: &FieldContext) -> Option<FieldMatch<T>> {
        (self.run)(text, ctx)
    }
}

/// Runs `strategies` in order and returns the first match, tagged with its strategy name.
pub fn first_success<T>(
    strategies: &[Strategy<T>],
    text: &str,
    ctx: &FieldContext,
) -> Option<FieldMatch<T>> {
    strategies.iter().find_map(|s| {
        s.run(text, ctx).map(|m| FieldMatch {
            strategy: s.name,
            ..m
        })
    })
}

fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            log(&format!("Invalid pattern {:?}: {}", pattern, e));
            None
        }
    }
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.chars().all(|c| c.is_ascii_digit())
}

const CARD_GROUPED: &str = r"([0-9]{4}[ -]*[0-9]{4}[ -]*[0-9]{4}[ -]*[0-9]{4})";
const CARD_WHITESPACE_GROUPS: &str = r"([0-9]{4})\s*([0-9]{4})\s*([0-9]{4})\s*([0-9]{4})";
const FOUR_DIGIT_TOKEN: &str = r"\b[0-9]{4}\b";

pub const CARD_NUMBER_LEN: usize = 16;

/// Card number strategies, most specific first.
pub fn card_number_strategies() -> Vec<Strategy<String>> {
    vec![
        Strategy::new("grouped", |text, _| {
            let re = compile(CARD_GROUPED)?;
            let found = re.find(text)?;
            let number: String = found.as_str().chars().filter(|c| c.is_ascii_digit()).collect();
            Some(FieldMatch::new(number, Confidence::Exact, "grouped"))
        }),
        Strategy::new("whitespace_groups", |text, _| {
            let re = compile(CARD_WHITESPACE_GROUPS)?;
            let caps = re.captures(text)?;
            let number: String = (1..=4).filter_map(|i| caps.get(i)).map(|m| m.as_str()).collect();
            Some(FieldMatch::new(number, Confidence::Exact, "whitespace_groups"))
        }),
        Strategy::new("four_digit_tokens", |text, _| {
            let re = compile(FOUR_DIGIT_TOKEN)?;
            let tokens: Vec<&str> = re.find_iter(text).map(|m| m.as_str()).take(4).collect();
            if tokens.len() < 4 {
                return None;
            }
            Some(FieldMatch::new(tokens.concat(), Confidence::Heuristic, "four_digit_tokens"))
        }),
    ]
}

pub fn parse_card_number(text: &str) -> Option<FieldMatch<String>> {
    first_success(&card_number_strategies(), text, &FieldContext::default())
        .filter(|m| is_digits(&m.value, CARD_NUMBER_LEN))
}

const EXP_SLASH: &str = r"([0-9]{2})/([0-9]{2})";
const EXP_THRU: &str = r"THRU[^0-9]*([0-9]{2})/([0-9]{2})";
const EXP_SPACED: &str = r"([0-9]{2})\s*/\s*([0-9]{2})";

/// First match of `pattern` whose month is valid after correction.
fn expiry_by_pattern(text: &str, pattern: &str, name: &'static str) -> Option<FieldMatch<Expiry>> {
    let re = compile(pattern)?;
    re.captures_iter(text).find_map(|caps| {
        let raw_month = caps.get(1)?.as_str();
        let year = caps.get(2)?.as_str();
        let month = correct_month(raw_month);
        if !is_valid_month(&month) {
            return None;
        }
        let confidence = if month == raw_month {
            Confidence::Exact
        } else {
            Confidence::Corrected
        };
        Some(FieldMatch::new(
            Expiry {
                month,
                year: year.to_string(),
            },
            confidence,
            name,
        ))
    })
}

/// Expiration strategies, most specific first.
pub fn expiry_strategies() -> Vec<Strategy<Expiry>> {
    vec![
        Strategy::new("slash", |text, _| expiry_by_pattern(text, EXP_SLASH, "slash")),
        Strategy::new("thru_label", |text, _| expiry_by_pattern(text, EXP_THRU, "thru_label")),
        Strategy::new("spaced_slash", |text, _| {
            expiry_by_pattern(text, EXP_SPACED, "spaced_slash")
        }),
    ]
}

pub fn parse_expiry(text: &str) -> Option<FieldMatch<Expiry>> {
    first_success(&expiry_strategies(), text, &FieldContext::default())
}

/// Label-anchored CVV patterns, most specific first.
const CVV_LABEL_PATTERNS: &[(&str, &str)] = &[
    ("cvv_digits", r"[Cc][Vv][Vv][^0-9]*([0-9]{3})"),
    ("cv_digits", r"[Cc][Vv][^0-9]*([0-9]{3})"),
    ("cw_digits", r"[Cc][Ww][^0-9]*([0-9]{3})"),
    ("cvv_digit_run", r"[Cc][Vv][Vv]\s*([0-9]+)"),
    ("cvv_token", r"[Cc][Vv][Vv]\s*(\S+)"),
    ("cw_token", r"[Cc][Ww]\s*(\S+)"),
];

const CVV_LABEL: &str = r"[Cc][VvWw]";
const CVV_NEARBY_TOKEN: &str = r"[O0]?[0-9IlB][0-9IlB8]";
const THREE_DIGIT_TOKEN: &str = r"\b[0-9]{3}\b";

/// Characters after a CV/CW label searched by the proximity strategy.
const PROXIMITY_WINDOW: usize = 15;

fn is_cvv(value: &str) -> bool {
    is_digits(value, CVV_LEN)
}

fn cleaned_cvv_match(raw: &str, name: &'static str) -> Option<FieldMatch<String>> {
    let cvv = clean_cvv(raw);
    if !is_cvv(&cvv) {
        return None;
    }
    let confidence = if cvv == raw {
        Confidence::Exact
    } else {
        Confidence::Corrected
    };
    Some(FieldMatch::new(cvv, confidence, name))
}

fn cvv_by_label(text: &str, pattern: &str, name: &'static str) -> Option<FieldMatch<String>> {
    let re = compile(pattern)?;
    re.captures_iter(text)
        .find_map(|caps| cleaned_cvv_match(caps.get(1)?.as_str(), name))
}

/// Looks a few characters past each CV/CW label for a digit-like token.
fn cvv_by_proximity(text: &str) -> Option<FieldMatch<String>> {
    let label = compile(CVV_LABEL)?;
    let token = compile(CVV_NEARBY_TOKEN)?;

    label.find_iter(text).find_map(|m| {
        let tail = &text[m.start()..];
        let end = tail
            .char_indices()
            .nth(PROXIMITY_WINDOW)
            .map(|(i, _)| i)
            .unwrap_or(tail.len());
        let found = token.find(&tail[..end])?;
        cleaned_cvv_match(found.as_str(), "proximity")
    })
}

/// Picks the first standalone 3-digit token not already claimed by another field.
///
/// Known page-furniture numbers are removed first. This can return a wrong
/// value with no way to tell, hence the `Heuristic` confidence.
fn cvv_by_elimination(text: &str, ctx: &FieldContext) -> Option<FieldMatch<String>> {
    let re = compile(THREE_DIGIT_TOKEN)?;

    let mut remaining = text.to_string();
    for token in ctx.spurious_tokens.iter().filter(|t| !t.is_empty()) {
        remaining = remaining.replace(token.as_str(), "");
    }

    let expiry_digits = ctx.expiry.map(|e| {
        let year_head: String = e.year.chars().take(1).collect();
        format!("{}{}", e.month, year_head)
    });

    re.find_iter(&remaining)
        .map(|m| m.as_str())
        .find(|seq| {
            let in_card = ctx.card_number.is_some_and(|card| card.contains(seq));
            let is_expiry = expiry_digits.as_deref() == Some(*seq);
            !in_card && !is_expiry
        })
        .map(|seq| FieldMatch::new(seq.to_string(), Confidence::Heuristic, "elimination"))
}

/// CVV strategies: label patterns, then proximity, then elimination.
pub fn cvv_strategies() -> Vec<Strategy<String>> {
    let mut strategies: Vec<Strategy<String>> = CVV_LABEL_PATTERNS
        .iter()
        .map(|&(name, pattern)| {
            Strategy::new(name, move |text, _| cvv_by_label(text, pattern, name))
        })
        .collect();
    strategies.push(Strategy::new("proximity", |text, _| cvv_by_proximity(text)));
    strategies.push(Strategy::new("elimination", cvv_by_elimination));
    strategies
}

pub fn parse_cvv(text: &str, ctx: &FieldContext) -> Option<FieldMatch<String>> {
    first_success(&cvv_strategies(), text, ctx)
}

fn log_match<T>(field: &str, found: &Option<FieldMatch<T>>, shown: impl Fn(&T) -> String) {
    match found {
        Some(m) => log(&format!(
            "Found {}: {} (strategy: {}, {:?})",
            field,
            shown(&m.value),
            m.strategy,
            m.confidence
        )),
        None => log(&format!("Could not extract {} automatically", field)),
    }
}

/// Parses all fields from raw OCR text.
pub fn parse_fields(raw_text: &str, config: &ExtractorConfig) -> CardDetails {
    let text = normalize_raw_text(raw_text);

    let card = parse_card_number(&text);
    log_match("card number", &card, |n| mask_card_number(n));

    let expiry = parse_expiry(&text);
    log_match("expiration date", &expiry, |e| format!("{}/{}", e.month, e.year));

    let ctx = FieldContext {
        card_number: card.as_ref().map(|m| m.value.as_str()),
        expiry: expiry.as_ref().map(|m| &m.value),
        spurious_tokens: &config.spurious_tokens,
    };
    let cvv = parse_cvv(&text, &ctx);
    log_match("CVV", &cvv, |_| "***".to_string());

    let mut details = CardDetails {
        card_number: card.map(|m| m.value),
        cvv: cvv.map(|m| m.value),
        ..CardDetails::default()
    };
    if let Some(m) = expiry {
        details.set_expiry(m.value);
    }
    details
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_context() -> FieldContext<'static> {
        FieldContext::default()
    }

    #[test]
    fn test_card_number_spaced_groups() {
        let found = parse_card_number("VISA\n4111 1111 1111 1111\nVALID").unwrap();
        assert_eq!(found.value, "4111111111111111");
        assert_eq!(found.strategy, "grouped");
        assert_eq!(found.confidence, Confidence::Exact);
    }

    #[test]
    fn test_card_number_dashed_groups() {
        let found = parse_card_number("5555-4444-3333-2222").unwrap();
        assert_eq!(found.value, "5555444433332222");
    }

    #[test]
    fn test_card_number_groups_split_across_lines() {
        let found = parse_card_number("4111 1111\n1111 1111").unwrap();
        assert_eq!(found.value, "4111111111111111");
        assert_eq!(found.strategy, "whitespace_groups");
    }

    #[test]
    fn test_card_number_from_scattered_tokens() {
        let text = "Ref 1234 on card ending 5678, branch 9012 / desk 3456";
        let found = parse_card_number(text).unwrap();
        assert_eq!(found.value, "1234567890123456");
        assert_eq!(found.strategy, "four_digit_tokens");
        assert_eq!(found.confidence, Confidence::Heuristic);
    }

    #[test]
    fn test_card_number_too_few_tokens() {
        assert!(parse_card_number("1234 and 5678 only, 91007").is_none());
    }

    #[test]
    fn test_card_strategy_order_is_first_success() {
        // Both a grouped number and loose tokens are present; grouped wins
        let text = "0000 x 1111 x 2222 x 3333\n4111 1111 1111 1111";
        let found = first_success(&card_number_strategies(), text, &no_context()).unwrap();
        assert_eq!(found.value, "4111111111111111");
    }

    #[test]
    fn test_expiry_plain() {
        let found = parse_expiry("VALID THRU 03/29").unwrap();
        assert_eq!(found.value.month, "03");
        assert_eq!(found.value.year, "29");
        assert_eq!(found.confidence, Confidence::Exact);
    }

    #[test]
    fn test_expiry_nine_confusion_corrected() {
        let found = parse_expiry("EXP 91/29").unwrap();
        assert_eq!(found.value.month, "01");
        assert_eq!(found.value.year, "29");
        assert_eq!(found.confidence, Confidence::Corrected);
    }

    #[test]
    fn test_expiry_nine_month_untouched() {
        let found = parse_expiry("09/29").unwrap();
        assert_eq!(found.value.month, "09");
        assert_eq!(found.value.year, "29");
    }

    #[test]
    fn test_expiry_spaced() {
        let found = parse_expiry("EXP 03 / 29").unwrap();
        assert_eq!(found.value.month, "03");
        assert_eq!(found.strategy, "spaced_slash");
    }

    #[test]
    fn test_expiry_skips_uncorrectable_month() {
        // 45 cannot be repaired, the next candidate is used
        let found = parse_expiry("45/67 then 11/28").unwrap();
        assert_eq!(found.value.month, "11");
        assert_eq!(found.value.year, "28");
    }

    #[test]
    fn test_expiry_missing() {
        assert!(parse_expiry("no date here 0329").is_none());
    }

    #[test]
    fn test_cvv_labelled() {
        let found = parse_cvv("CVV 078", &no_context()).unwrap();
        assert_eq!(found.value, "078");
        assert_eq!(found.strategy, "cvv_digits");
        assert_eq!(found.confidence, Confidence::Exact);
    }

    #[test]
    fn test_cvv_known_misread_token() {
        let found = parse_cvv("CWO7B", &no_context()).unwrap();
        assert_eq!(found.value, "078");
        assert_eq!(found.strategy, "cw_token");
    }

    #[test]
    fn test_cvv_cw_label() {
        let found = parse_cvv("CW: 512", &no_context()).unwrap();
        assert_eq!(found.value, "512");
    }

    #[test]
    fn test_cvv_proximity() {
        let found = parse_cvv("CVV: O3l", &no_context()).unwrap();
        assert_eq!(found.value, "031");
        assert_eq!(found.strategy, "proximity");
    }

    #[test]
    fn test_cvv_proximity_clean_digits_are_exact() {
        // The stray "5" after the label defeats the label patterns
        let found = parse_cvv("CW 5 078", &no_context()).unwrap();
        assert_eq!(found.value, "078");
        assert_eq!(found.strategy, "proximity");
        assert_eq!(found.confidence, Confidence::Exact);

        let corrected = parse_cvv("CVV: O3l", &no_context()).unwrap();
        assert_eq!(corrected.confidence, Confidence::Corrected);
    }

    #[test]
    fn test_cvv_elimination_skips_claimed_digits() {
        let spurious = vec!["91007".to_string()];
        // The street number "123" also appears inside the card number
        let ctx = FieldContext {
            card_number: Some("4111111111231111"),
            expiry: None,
            spurious_tokens: &spurious,
        };
        let text = "123 Main St\nArcadia CA 91007\nSecurity code\n348";

        let found = parse_cvv(text, &ctx).unwrap();
        assert_eq!(found.value, "348");
        assert_eq!(found.strategy, "elimination");
        assert_eq!(found.confidence, Confidence::Heuristic);
    }

    #[test]
    fn test_cvv_elimination_zip_and_code() {
        let spurious = vec!["91007".to_string()];
        let ctx = FieldContext {
            spurious_tokens: &spurious,
            ..FieldContext::default()
        };
        let found = parse_cvv("Pasadena 91007 balance 348", &ctx).unwrap();
        assert_eq!(found.value, "348");
    }

    #[test]
    fn test_cvv_elimination_skips_expiry_digits() {
        let expiry = Expiry {
            month: "03".to_string(),
            year: "29".to_string(),
        };
        let ctx = FieldContext {
            expiry: Some(&expiry),
            ..FieldContext::default()
        };
        let found = parse_cvv("032 then 348", &ctx).unwrap();
        assert_eq!(found.value, "348");
    }

    #[test]
    fn test_cvv_missing() {
        assert!(parse_cvv("nothing useful 12 4567", &no_context()).is_none());
    }

    #[test]
    fn test_parse_fields_full_panel_text() {
        let text = "Virtual card\n4111 1111 1111 1111\nVALID THRU 03/29\nCVV 348\nArcadia CA 91007";
        let details = parse_fields(text, &ExtractorConfig::default());

        assert_eq!(details.card_number.as_deref(), Some("4111111111111111"));
        assert_eq!(details.exp_month(), Some("03"));
        assert_eq!(details.exp_year(), Some("29"));
        assert_eq!(details.cvv.as_deref(), Some("348"));
    }

    #[test]
    fn test_parse_fields_at_sign_zeros() {
        let text = "4111 1111 1111 1111\n@3/29\nCVV @78";
        let details = parse_fields(text, &ExtractorConfig::default());

        assert_eq!(details.exp_month(), Some("03"));
        assert_eq!(details.cvv.as_deref(), Some("078"));
    }

    #[test]
    fn test_parse_fields_empty_text() {
        let details = parse_fields("", &ExtractorConfig::default());
        assert_eq!(details, CardDetails::default());
    }
}
