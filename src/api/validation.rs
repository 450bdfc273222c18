//! Input validation for API requests.
//!
//! Each validator returns `Err(message)` for invalid input. Handlers collect
//! them per field with `ValidationErrorBuilder::check` from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;

use crate::db::{normalize_timestamp, parse_date, MAX_STOCK_LEVEL};

/// Maximum length of names and titles
pub const MAX_NAME_LENGTH: usize = 200;

/// Maximum length of free-text fields (notes, descriptions, messages)
pub const MAX_TEXT_LENGTH: usize = 5000;

lazy_static! {
    /// Pragmatic email check: one `@`, no whitespace, a dot in the domain
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[^\s@]+@[^\s@]+\.[^\s@]+$"
    ).unwrap();

    /// Digits with optional `+`, spaces, dashes, dots and parentheses
    static ref PHONE_REGEX: Regex = Regex::new(
        r"^\+?[0-9 ().-]{3,32}$"
    ).unwrap();

    /// Stock keeping units: letters, digits, dashes, underscores and dots
    static ref SKU_REGEX: Regex = Regex::new(
        r"^[A-Za-z0-9][A-Za-z0-9._-]{0,63}$"
    ).unwrap();
}

/// Validate a required, length-limited text field such as a name or title
pub fn validate_required(value: &str, label: &str, max: usize) -> Result<(), String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(format!("{} is required", label));
    }
    if trimmed.chars().count() > max {
        return Err(format!("{} is too long (max {} characters)", label, max));
    }
    Ok(())
}

/// Validate an optional text field; `None` and empty strings pass
pub fn validate_optional_text(value: &Option<String>, label: &str, max: usize) -> Result<(), String> {
    match value {
        Some(v) if v.trim().chars().count() > max => {
            Err(format!("{} is too long (max {} characters)", label, max))
        }
        _ => Ok(()),
    }
}

pub fn validate_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    if email.is_empty() {
        return Err("Email is required".to_string());
    }
    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }
    Ok(())
}

/// Validate an optional email; an empty string clears the field and is accepted
pub fn validate_optional_email(email: &Option<String>) -> Result<(), String> {
    match email.as_deref().map(str::trim) {
        Some(e) if !e.is_empty() => validate_email(e),
        _ => Ok(()),
    }
}

pub fn validate_optional_phone(phone: &Option<String>) -> Result<(), String> {
    match phone.as_deref().map(str::trim) {
        Some(p) if !p.is_empty() && !PHONE_REGEX.is_match(p) => {
            Err("Invalid phone number format".to_string())
        }
        _ => Ok(()),
    }
}

pub fn validate_sku(sku: &str) -> Result<(), String> {
    let sku = sku.trim();
    if sku.is_empty() {
        return Err("SKU is required".to_string());
    }
    if !SKU_REGEX.is_match(sku) {
        return Err(
            "SKU must be alphanumeric (dashes, dots and underscores allowed, max 64 characters)"
                .to_string(),
        );
    }
    Ok(())
}

/// Validate a money amount that may be zero
pub fn validate_non_negative(value: Option<f64>, label: &str) -> Result<(), String> {
    match value {
        Some(v) if !v.is_finite() => Err(format!("{} must be a number", label)),
        Some(v) if v < 0.0 => Err(format!("{} cannot be negative", label)),
        _ => Ok(()),
    }
}

/// Validate a transaction amount, which must be strictly positive
pub fn validate_amount(amount: f64) -> Result<(), String> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err("Amount must be greater than 0".to_string());
    }
    Ok(())
}

pub fn validate_stock_level(value: Option<i64>, label: &str) -> Result<(), String> {
    match value {
        Some(v) if v < 0 => Err(format!("{} cannot be negative", label)),
        Some(v) if v > MAX_STOCK_LEVEL => {
            Err(format!("{} cannot exceed {}", label, MAX_STOCK_LEVEL))
        }
        _ => Ok(()),
    }
}

/// Validate a stock adjustment: non-zero and no larger than the stock ceiling
pub fn validate_stock_delta(delta: i64) -> Result<(), String> {
    if delta == 0 {
        return Err("Delta must not be zero".to_string());
    }
    if delta.unsigned_abs() > MAX_STOCK_LEVEL.unsigned_abs() {
        return Err(format!("Delta must be between -{0} and {0}", MAX_STOCK_LEVEL));
    }
    Ok(())
}

/// Validate an inspection score in `[0, 100]`
pub fn validate_score(score: Option<f64>) -> Result<(), String> {
    match score {
        Some(s) if !s.is_finite() || !(0.0..=100.0).contains(&s) => {
            Err("Score must be between 0 and 100".to_string())
        }
        _ => Ok(()),
    }
}

/// Validate an optional `YYYY-MM-DD` date
pub fn validate_optional_date(value: &Option<String>, label: &str) -> Result<(), String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() && parse_date(v).is_none() => {
            Err(format!("{} must be a date in YYYY-MM-DD format", label))
        }
        _ => Ok(()),
    }
}

/// Parse and normalize an RFC 3339 timestamp (or a plain date)
pub fn parse_timestamp_field(value: &str, label: &str) -> Result<String, String> {
    normalize_timestamp(value.trim())
        .ok_or_else(|| format!("{} must be an RFC 3339 timestamp", label))
}

/// Both bounds must already be normalized
pub fn validate_time_range(start: &str, end: &str) -> Result<(), String> {
    if end <= start {
        return Err("End time must be after start time".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_required() {
        assert!(validate_required("Acme", "Name", MAX_NAME_LENGTH).is_ok());
        assert_eq!(
            validate_required("   ", "Name", MAX_NAME_LENGTH).unwrap_err(),
            "Name is required"
        );
        let long = "x".repeat(MAX_NAME_LENGTH + 1);
        assert!(validate_required(&long, "Name", MAX_NAME_LENGTH).is_err());
        assert!(validate_required(&"x".repeat(MAX_NAME_LENGTH), "Name", MAX_NAME_LENGTH).is_ok());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("ops@example.com").is_ok());
        assert!(validate_email("first.last+tag@sub.example.co").is_ok());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("a@b").is_err());
        assert!(validate_email("a b@example.com").is_err());
        assert!(validate_optional_email(&None).is_ok());
        assert!(validate_optional_email(&Some("".into())).is_ok());
        assert!(validate_optional_email(&Some("bad".into())).is_err());
    }

    #[test]
    fn test_validate_phone_and_sku() {
        assert!(validate_optional_phone(&Some("+1 (555) 010-0200".into())).is_ok());
        assert!(validate_optional_phone(&Some("call me".into())).is_err());
        assert!(validate_sku("PUMP-100.a_2").is_ok());
        assert!(validate_sku("-leading").is_err());
        assert!(validate_sku("has space").is_err());
    }

    #[test]
    fn test_validate_numbers() {
        assert!(validate_non_negative(Some(0.0), "Cost").is_ok());
        assert!(validate_non_negative(Some(-0.01), "Cost").is_err());
        assert!(validate_non_negative(Some(f64::NAN), "Cost").is_err());
        assert!(validate_amount(0.0).is_err());
        assert!(validate_amount(12.5).is_ok());
        assert!(validate_score(Some(100.0)).is_ok());
        assert!(validate_score(Some(100.5)).is_err());
        assert!(validate_score(None).is_ok());
        assert!(validate_stock_level(Some(-1), "Stock").is_err());
        assert!(validate_stock_level(Some(MAX_STOCK_LEVEL), "Stock").is_ok());
        assert!(validate_stock_level(Some(MAX_STOCK_LEVEL + 1), "Stock").is_err());
        assert!(validate_stock_delta(0).is_err());
        assert!(validate_stock_delta(-5).is_ok());
        assert!(validate_stock_delta(i64::MAX).is_err());
        assert!(validate_stock_delta(i64::MIN).is_err());
    }

    #[test]
    fn test_validate_times() {
        assert!(validate_optional_date(&Some("2024-02-29".into()), "Due date").is_ok());
        assert!(validate_optional_date(&Some("2023-02-29".into()), "Due date").is_err());

        let start = parse_timestamp_field("2024-05-01T10:00:00+02:00", "Start time").unwrap();
        assert_eq!(start, "2024-05-01T08:00:00Z");
        assert!(parse_timestamp_field("tomorrow", "Start time").is_err());

        assert!(validate_time_range("2024-05-01T08:00:00Z", "2024-05-01T09:00:00Z").is_ok());
        assert!(validate_time_range("2024-05-01T08:00:00Z", "2024-05-01T08:00:00Z").is_err());
    }
}
