//! Field transforms shared by every form.

use serde_json::Value;

use super::FieldError;

/// Split a comma separated field into trimmed, non-empty entries, in typed order.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}

/// Inverse of [`split_list`] for pre-filling a form.
pub fn join_list(items: &[String]) -> String {
    items.join(", ")
}

/// Parse a free-text JSON field. Blank input means the field is not set.
pub fn parse_json(field: &'static str, raw: &str) -> Result<Option<Value>, FieldError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(raw)
        .map(Some)
        .map_err(|e| FieldError::InvalidJson {
            field,
            reason: e.to_string(),
        })
}

/// Pretty JSON for pre-filling a form; empty when unset.
pub fn format_json(value: Option<&Value>) -> String {
    value
        .and_then(|v| serde_json::to_string_pretty(v).ok())
        .unwrap_or_default()
}

/// Parse an optional base-10 integer field. Blank input is `None`.
pub fn parse_int(field: &'static str, raw: &str) -> Result<Option<i64>, FieldError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    i64::from_str_radix(raw, 10)
        .map(Some)
        .map_err(|_| FieldError::InvalidNumber {
            field,
            input: raw.to_string(),
        })
}

/// Parse an optional decimal field. Blank input is `None`; NaN and infinities are invalid.
pub fn parse_decimal(field: &'static str, raw: &str) -> Result<Option<f64>, FieldError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(FieldError::InvalidNumber {
            field,
            input: raw.to_string(),
        }),
    }
}

/// Trimmed value of a required text field.
pub fn require(field: &'static str, raw: &str) -> Result<String, FieldError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(FieldError::Required(field));
    }
    Ok(raw.to_string())
}

/// Trimmed value of an optional text field; blank is `None`.
pub fn optional(raw: &str) -> Option<String> {
    let raw = raw.trim();
    (!raw.is_empty()).then(|| raw.to_string())
}

/// A numeric field that must be present.
pub fn required_number<T>(
    field: &'static str,
    parsed: Result<Option<T>, FieldError>,
) -> Result<T, FieldError> {
    parsed?.ok_or(FieldError::Required(field))
}
