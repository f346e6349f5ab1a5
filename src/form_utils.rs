/// Helpers for turning raw HTML form fields into validated values.
///
/// HTML inputs always arrive as strings; empty strings stand for "not
/// provided" and are normalised to `None` here.
use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::sync::OnceLock;

use crate::error::AppError;

pub fn deserialize_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    Ok(non_empty(s.as_deref()))
}

/// Trimmed copy of the input, or `None` when it is missing or blank.
pub fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Largest amount a single expense may carry: 10 billion in major units.
/// Keeps sums over any realistic number of expenses well inside `i64`.
pub const MAX_AMOUNT_CENTS: i64 = 1_000_000_000_000;

/// Accept only amounts in `1..=MAX_AMOUNT_CENTS`.
pub fn validate_amount_cents(cents: i64) -> Result<i64, AppError> {
    if cents <= 0 {
        return Err(AppError::Validation("Amount must be greater than zero".into()));
    }
    if cents > MAX_AMOUNT_CENTS {
        return Err(AppError::Validation("Amount is too large".into()));
    }
    Ok(cents)
}

/// Parse a decimal currency amount ("12", "12.5", "1,234.56") into cents.
///
/// Parsed exactly from the digits; more than two fractional digits is an error
/// rather than a silent rounding.
pub fn parse_amount_cents(input: &str) -> Result<i64, AppError> {
    let cleaned: String = input.trim().chars().filter(|c| *c != ',').collect();
    let cleaned = cleaned.strip_prefix('$').unwrap_or(&cleaned);
    let invalid = || AppError::Validation(format!("Invalid amount: {}", input.trim()));

    if cleaned.is_empty() {
        return Err(AppError::Validation("Amount is required".into()));
    }

    let (negative, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned),
    };

    let (whole, fraction) = match digits.split_once('.') {
        Some((w, f)) => (w, f),
        None => (digits, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }
    if fraction.len() > 2 {
        return Err(AppError::Validation(
            "Amount can have at most two decimal places".into(),
        ));
    }

    let whole_value: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let fraction_value: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().map_err(|_| invalid())? * 10,
        _ => fraction.parse().map_err(|_| invalid())?,
    };

    let cents = whole_value
        .checked_mul(100)
        .and_then(|c| c.checked_add(fraction_value))
        .ok_or_else(invalid)?;

    Ok(if negative { -cents } else { cents })
}

/// Normalise an optional ISO 4217 currency code ("usd" -> "USD").
pub fn parse_currency(input: Option<&str>) -> Result<Option<String>, AppError> {
    match non_empty(input) {
        None => Ok(None),
        Some(code) if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) => {
            Ok(Some(code.to_ascii_uppercase()))
        }
        Some(code) => Err(AppError::Validation(format!(
            "Invalid currency code: {}",
            code
        ))),
    }
}

pub fn is_valid_email(email: &str) -> bool {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    EMAIL_RE
        .get_or_init(|| {
            Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid")
        })
        .is_match(email)
}
