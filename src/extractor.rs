//! Entity extraction
//!
//! Pulls an amount and an account number out of free text using ordered
//! pattern rules. Extraction is total: no match simply omits the field.

use crate::models::Entities;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Labeled account pattern: a keyword ("account", "a/c", "acct", ...)
    /// followed by 5-16 digits. Must win over bare digit runs, which are
    /// ambiguous (phone numbers, card digits).
    static ref ACCOUNT_RE: Regex = Regex::new(
        r"(?i)(?:account|acct|a/c|a c|a\.c\.|acc)\s*(?:no[:#]?\s*)?[:#]?\s*([0-9]{5,16})"
    )
    .expect("invalid account pattern");

    /// Bare run of 6-16 consecutive digits.
    static ref BARE_DIGITS_RE: Regex =
        Regex::new(r"\b([0-9]{6,16})\b").expect("invalid digit pattern");

    /// Currency marker immediately followed by a number.
    static ref MARKER_NUMBER_RE: Regex = Regex::new(
        r"(?i)(?:₹|\$|rs\.?|rupees|rupee|inr)\s*([0-9][0-9,\.]*)"
    )
    .expect("invalid marker-number pattern");

    /// Number immediately followed by a currency word.
    static ref NUMBER_MARKER_RE: Regex = Regex::new(
        r"(?i)([0-9][0-9,\.]*)\s*(?:rupees|rupee|rs\.?|inr|\$)"
    )
    .expect("invalid number-marker pattern");

    /// First numeric token anywhere in the text.
    static ref FIRST_NUMBER_RE: Regex =
        Regex::new(r"([0-9][0-9,\.]*)").expect("invalid number pattern");
}

const CURRENCY_MARKERS: &[&str] = &["₹", "rs", "rs.", "rupee", "rupees", "inr", "$"];

/// Extract amount and account number entities from raw text.
pub fn extract(text: &str) -> Entities {
    Entities {
        amount: extract_amount(text),
        account_number: extract_account_number(text),
    }
}

fn extract_account_number(text: &str) -> Option<String> {
    if let Some(caps) = ACCOUNT_RE.captures(text) {
        return Some(caps[1].to_string());
    }

    // Fallback: the longest bare digit run, first occurrence on ties.
    BARE_DIGITS_RE
        .find_iter(text)
        .fold(None::<&str>, |best, m| match best {
            Some(b) if b.len() >= m.as_str().len() => Some(b),
            _ => Some(m.as_str()),
        })
        .map(|s| s.to_string())
}

fn extract_amount(text: &str) -> Option<f64> {
    // Without a currency marker, digits are never money; they could be an
    // account number or card digits.
    let low = text.to_lowercase();
    if !CURRENCY_MARKERS.iter().any(|m| low.contains(m)) {
        return None;
    }

    if let Some(caps) = MARKER_NUMBER_RE.captures(text) {
        if let Some(amount) = parse_number(&caps[1]) {
            return Some(amount);
        }
    }

    if let Some(caps) = NUMBER_MARKER_RE.captures(text) {
        if let Some(amount) = parse_number(&caps[1]) {
            return Some(amount);
        }
    }

    // A marker exists somewhere but neither ordered pattern matched; take
    // the first bare number in the text.
    FIRST_NUMBER_RE
        .captures(text)
        .and_then(|caps| parse_number(&caps[1]))
}

/// Strip thousands separators and whitespace, then parse.
fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
    cleaned.parse::<f64>().ok()
}
