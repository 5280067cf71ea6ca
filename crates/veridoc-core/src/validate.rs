//! Pure field validation keyed by declared data type.
//!
//! Dispatch runs through a lookup table so adding a field kind means adding
//! one row, not another branch chain. Validators return a human-readable
//! message or `None`; they never panic and never touch I/O.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{ExtractedField, FieldKind};

/// Mailbox grammar, pragmatic subset: local part, one `@`, dotted domain.
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)+$").expect("email regex")
});

static SSN_SEPARATORS: &[char] = &['-', ' ', '.'];

/// Date formats accepted for extracted date fields, most common first.
static DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%m-%d-%Y", "%Y-%m-%d", "%m/%d/%y", "%B %d, %Y"];

type Validator = fn(&str) -> Option<String>;

/// Kind → validator lookup table. `Text` is deliberately absent: it (and
/// any unrecognized kind deserialized to it) always passes.
static VALIDATORS: &[(FieldKind, Validator)] = &[
    (FieldKind::Currency, validate_currency),
    (FieldKind::Date, validate_date),
    (FieldKind::Number, validate_number),
    (FieldKind::Ssn, validate_ssn),
    (FieldKind::Email, validate_email),
];

/// Check a field's value against its declared kind.
///
/// Returns `None` when valid, otherwise a message naming the field so a
/// reviewer UI can render it without re-deriving logic.
pub fn validate_field(field: &ExtractedField) -> Option<String> {
    let validator = VALIDATORS
        .iter()
        .find(|(kind, _)| *kind == field.kind)
        .map(|(_, v)| v)?;
    validator(field.value.trim()).map(|msg| format!("{}: {}", field.name, msg))
}

/// Validate every field, collecting the messages in field order.
pub fn validate_fields(fields: &[ExtractedField]) -> Vec<String> {
    fields.iter().filter_map(validate_field).collect()
}

fn validate_currency(value: &str) -> Option<String> {
    let mut cleaned = value.replace(['$', ','], "");
    // Accounting negatives: (1,234.56)
    if cleaned.starts_with('(') && cleaned.ends_with(')') {
        cleaned = format!("-{}", &cleaned[1..cleaned.len() - 1]);
    }
    if cleaned.is_empty() {
        return Some("empty currency value".to_string());
    }
    match BigDecimal::from_str(cleaned.trim()) {
        Ok(_) => None,
        Err(_) => Some(format!("'{}' is not a valid currency amount", value)),
    }
}

fn validate_date(value: &str) -> Option<String> {
    if DATE_FORMATS
        .iter()
        .any(|fmt| NaiveDate::parse_from_str(value, fmt).is_ok())
    {
        None
    } else {
        Some(format!("'{}' is not a recognizable date", value))
    }
}

fn validate_number(value: &str) -> Option<String> {
    let cleaned = value.replace(',', "");
    match cleaned.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => None,
        _ => Some(format!("'{}' is not numeric", value)),
    }
}

fn validate_ssn(value: &str) -> Option<String> {
    let digits: String = value
        .chars()
        .filter(|c| !SSN_SEPARATORS.contains(c))
        .collect();
    if digits.len() != 9 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Some(format!("'{}' is not a 9-digit SSN", value));
    }
    // Area/group/serial of all zeros are never issued.
    if &digits[0..3] == "000" || &digits[3..5] == "00" || &digits[5..9] == "0000" {
        return Some(format!("'{}' contains an invalid zero group", value));
    }
    None
}

fn validate_email(value: &str) -> Option<String> {
    if EMAIL_RE.is_match(value) {
        None
    } else {
        Some(format!("'{}' is not a valid email address", value))
    }
}
