//! Money and percentage formatting shared by templates, JSON views and reports.
//!
//! Amounts are stored in minor units (cents), so formatting never has to
//! deal with floating point rounding.

/// Format cents with a currency symbol and thousands separators, e.g. `$1,234.50`.
pub fn format_money(cents: i64, currency: &str) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    format!("{}{}{}", sign, currency_symbol(currency), format_decimal(cents.abs()))
}

/// Format cents as a bare decimal number with thousands separators, e.g. `1,234.50`.
pub fn format_decimal(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs_cents = cents.abs();
    format!(
        "{}{}.{:02}",
        sign,
        format_with_thousands(abs_cents / 100),
        abs_cents % 100
    )
}

/// Format cents without separators or symbol, suitable for form inputs and CSV.
pub fn format_plain(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs_cents = cents.abs();
    format!("{}{}.{:02}", sign, abs_cents / 100, abs_cents % 100)
}

/// Format a percentage with one decimal place, e.g. `48.2%`.
pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}

/// Format a signed change with one decimal place, e.g. `+8.5%` or `-3.2%`.
pub fn format_change(value: f64) -> String {
    if value > 0.0 {
        format!("+{:.1}%", value)
    } else if value < 0.0 {
        format!("-{:.1}%", value.abs())
    } else {
        "0.0%".to_string()
    }
}

fn format_with_thousands(n: i64) -> String {
    let digits = n.to_string();
    let mut result = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// Get currency symbol for a currency code.
pub fn currency_symbol(currency: &str) -> &'static str {
    match currency.to_uppercase().as_str() {
        "USD" => "$",
        "EUR" => "\u{20ac}",
        "GBP" => "\u{00a3}",
        "JPY" => "\u{00a5}",
        "CNY" => "\u{00a5}",
        "CAD" => "C$",
        "AUD" => "A$",
        "CHF" => "CHF\u{00a0}",
        "INR" => "\u{20b9}",
        "BRL" => "R$",
        "MXN" => "MX$",
        _ => "$",
    }
}

/// Currencies offered in the settings form.
pub const SUPPORTED_CURRENCIES: &[&str] = &[
    "USD", "EUR", "GBP", "JPY", "CNY", "CAD", "AUD", "CHF", "INR", "BRL", "MXN",
];
