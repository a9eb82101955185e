//! Locale-aware numeric parsing for Russian document formats.
//!
//! Amounts arrive as "1 234,56", "1234.56" or "1234" depending on the
//! exporting system; the comma is a legal decimal separator and regular or
//! non-breaking spaces appear as thousands separators.

use rust_decimal::Decimal;
use std::str::FromStr;

use super::error::ProvodkaError;

/// Parse a decimal field, accepting comma as the decimal point and ignoring
/// space/NBSP thousands separators. Fails with [`ProvodkaError::Parsing`]
/// on anything non-numeric.
pub fn parse_ru_decimal(raw: &str, field: &str) -> Result<Decimal, ProvodkaError> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != ' ' && *c != '\u{a0}')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if cleaned.is_empty() {
        return Err(ProvodkaError::Parsing(format!("{field}: empty numeric value")));
    }
    Decimal::from_str(&cleaned).map_err(|_| {
        ProvodkaError::Parsing(format!("{field}: '{raw}' is not a number"))
    })
}

/// Same as [`parse_ru_decimal`] but treats an absent value as zero.
pub fn parse_ru_decimal_opt(raw: Option<&str>, field: &str) -> Result<Decimal, ProvodkaError> {
    match raw {
        Some(s) if !s.trim().is_empty() => parse_ru_decimal(s, field),
        _ => Ok(Decimal::ZERO),
    }
}

/// Extract the numeric percentage from a VAT rate string such as "20%",
/// "20/120" or "без НДС". MoySklad positions want a plain integer; the
/// original documents carry free-form rate text.
pub fn vat_rate_percent(rate: Option<&str>) -> u32 {
    const DEFAULT_VAT: u32 = 20;
    let Some(rate) = rate else {
        return DEFAULT_VAT;
    };
    first_digit_run(rate)
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(DEFAULT_VAT)
}

/// First contiguous run of ASCII digits in a string, if any. Used to pull a
/// счет number out of requisite text like "счет № 1234 от 01.02.2024".
pub fn first_digit_run(s: &str) -> Option<String> {
    let mut run = String::new();
    for c in s.chars() {
        if c.is_ascii_digit() {
            run.push(c);
        } else if !run.is_empty() {
            return Some(run);
        }
    }
    if run.is_empty() { None } else { Some(run) }
}
