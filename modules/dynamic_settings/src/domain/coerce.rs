//! Coercion of raw string values into typed setting values

use crate::contract::{SettingValue, ValueType};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

/// Values (compared case-insensitively) that coerce to `false`.
/// Anything else that is not blank is `true`.
pub const FALSE_VALUES: [&str; 4] = ["0", "f", "false", "off"];

/// A non-blank raw value that cannot be read as its declared type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CoercionError {
    #[error("must be an integer")]
    Integer,
    #[error("must be a number")]
    Float,
    #[error("is not a valid datetime")]
    Datetime,
}

/// Missing, empty or whitespace-only
pub fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

/// Coerce a raw value to `value_type`.
///
/// Blank input yields `Ok(None)` for every type.
pub fn coerce(
    raw: Option<&str>,
    value_type: ValueType,
) -> Result<Option<SettingValue>, CoercionError> {
    let Some(raw) = raw.filter(|r| !is_blank(Some(*r))) else {
        return Ok(None);
    };

    let value = match value_type {
        ValueType::String | ValueType::Secret => SettingValue::String(raw.to_string()),
        ValueType::Integer => SettingValue::Integer(integer(raw).ok_or(CoercionError::Integer)?),
        ValueType::Float => SettingValue::Float(float(raw).ok_or(CoercionError::Float)?),
        ValueType::Boolean => match boolean(raw) {
            Some(b) => SettingValue::Boolean(b),
            None => return Ok(None),
        },
        ValueType::Datetime => {
            SettingValue::DateTime(datetime(raw).ok_or(CoercionError::Datetime)?)
        }
        ValueType::Array => SettingValue::Array(array(raw)),
    };
    Ok(Some(value))
}

pub fn integer(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}

pub fn float(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

pub fn boolean(raw: &str) -> Option<bool> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    Some(!FALSE_VALUES.iter().any(|f| f.eq_ignore_ascii_case(raw)))
}

/// Parse an absolute timestamp. Values without an offset are read as UTC.
pub fn datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f %z", "%Y-%m-%d %H:%M:%S%.f%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// One entry per line; entries are trimmed and blank lines dropped
pub fn array(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Serialize an untyped JSON value into the raw string form.
///
/// Arrays drop blank elements and are joined with newlines; empty results
/// serialize to `None`.
pub fn serialize_json(value: &serde_json::Value) -> Option<String> {
    let raw = match value {
        serde_json::Value::Null => return None,
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                serde_json::Value::String(s) => Some(s.trim().to_string()),
                serde_json::Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|item| !item.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        serde_json::Value::Object(_) => value.to_string(),
    };
    (!raw.is_empty()).then_some(raw)
}
