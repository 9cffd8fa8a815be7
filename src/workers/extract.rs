//! Field extraction helpers shared by the local workers

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid extraction pattern {pattern}: {e}"))
}

static INCOME_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        regex(r"(?i)(?:annual|yearly|gross)?\s*income[:\s]*(?:of\s+)?\$?(\d[\d,]*(?:\.\d+)?)"),
        regex(r"(?i)\$?(\d[\d,]*(?:\.\d+)?)\s*(?:annual\s+|yearly\s+|gross\s+)?income"),
    ]
});

static DEBT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        regex(r"(?i)debt[:\s]*(?:of\s+)?\$?(\d[\d,]*(?:\.\d+)?)"),
        regex(r"(?i)\$?(\d[\d,]*(?:\.\d+)?)\s*(?:monthly\s+|in\s+)?debts?\b"),
    ]
});

static CREDIT_SCORE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        regex(r"(?i)(?:credit|fico)[_\s]*score[:\s]*(?:of\s+)?(\d{3})\b"),
        regex(r"(?i)\b(\d{3})\s*(?:credit|fico)[_\s]*score"),
    ]
});

/// Parse "$1,234.50" style amounts
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    cleaned.parse().ok()
}

/// First capture of the first pattern that matches, parsed as an amount
pub fn capture_amount(text: &str, patterns: &[Regex]) -> Option<f64> {
    patterns
        .iter()
        .filter_map(|re| re.captures(text))
        .find_map(|caps| caps.get(1).and_then(|m| parse_amount(m.as_str())))
}

/// First capture of the first pattern that matches, trimmed
pub fn capture_text(text: &str, patterns: &[Regex]) -> Option<String> {
    patterns
        .iter()
        .filter_map(|re| re.captures(text))
        .find_map(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
        .filter(|s| !s.is_empty())
}

pub fn income_from_text(text: &str) -> Option<f64> {
    capture_amount(text, &INCOME_PATTERNS)
}

pub fn debt_from_text(text: &str) -> Option<f64> {
    capture_amount(text, &DEBT_PATTERNS)
}

pub fn credit_score_from_text(text: &str) -> Option<f64> {
    capture_amount(text, &CREDIT_SCORE_PATTERNS)
}

/// Numeric value of the first present field, accepting numbers or numeric strings
pub fn number_field(map: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| match map.get(*key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_amount(s),
        _ => None,
    })
}

pub fn string_field(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// JSON number for an amount, as an integer when it has no fractional part
pub fn amount_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}
