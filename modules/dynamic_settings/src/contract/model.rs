//! Contract models for the dynamic settings service
//!
//! These models are transport-agnostic and used for inter-module communication.
//! NO serde derives - these are pure domain models.

use super::error::SettingsError;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;
use std::fmt;

/// Maximum length of a setting key
pub const MAX_KEY_LENGTH: usize = 190;

/// Maximum length of a serialized setting value
pub const MAX_VALUE_LENGTH: usize = 4096;

/// Value type of a setting. Drives coercion of the stored raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ValueType {
    #[default]
    String,
    Integer,
    Float,
    Boolean,
    Datetime,
    Array,
    /// String-typed value whose history is never recorded in clear text
    Secret,
}

impl ValueType {
    /// All recognized value types, in display order
    pub const ALL: [ValueType; 7] = [
        ValueType::String,
        ValueType::Integer,
        ValueType::Float,
        ValueType::Boolean,
        ValueType::Datetime,
        ValueType::Array,
        ValueType::Secret,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Integer => "integer",
            ValueType::Float => "float",
            ValueType::Boolean => "boolean",
            ValueType::Datetime => "datetime",
            ValueType::Array => "array",
            ValueType::Secret => "secret",
        }
    }

    /// Parse a value type name. Matching is case-insensitive and ignores
    /// surrounding whitespace.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|vt| vt.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A coerced setting value
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    DateTime(DateTime<Utc>),
    Array(Vec<String>),
}

impl SettingValue {
    /// Canonical string form used as the stored raw value.
    ///
    /// Datetimes are written as ISO-8601 in UTC with microsecond precision,
    /// arrays are joined with newlines.
    pub fn to_raw(&self) -> String {
        match self {
            SettingValue::String(s) => s.clone(),
            SettingValue::Integer(i) => i.to_string(),
            SettingValue::Float(f) => f.to_string(),
            SettingValue::Boolean(b) => b.to_string(),
            SettingValue::DateTime(dt) => format_datetime(dt),
            SettingValue::Array(items) => items.join("\n"),
        }
    }

    /// JSON representation used by the REST layer and structured views
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            SettingValue::String(s) => serde_json::Value::String(s.clone()),
            SettingValue::Integer(i) => serde_json::Value::from(*i),
            SettingValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            SettingValue::Boolean(b) => serde_json::Value::Bool(*b),
            SettingValue::DateTime(dt) => serde_json::Value::String(format_datetime(dt)),
            SettingValue::Array(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|item| serde_json::Value::String(item.clone()))
                    .collect(),
            ),
        }
    }
}

/// Format a timestamp the way settings store it: UTC, microsecond precision
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::String(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::String(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Integer(value)
    }
}

impl From<i32> for SettingValue {
    fn from(value: i32) -> Self {
        SettingValue::Integer(i64::from(value))
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        SettingValue::Float(value)
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Boolean(value)
    }
}

impl From<DateTime<Utc>> for SettingValue {
    fn from(value: DateTime<Utc>) -> Self {
        SettingValue::DateTime(value)
    }
}

impl From<Vec<String>> for SettingValue {
    fn from(value: Vec<String>) -> Self {
        SettingValue::Array(value)
    }
}

/// Persistent form of a setting as exchanged with storage adapters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingRecord {
    /// Unique key within a namespace
    pub key: String,
    /// Declared value type
    pub value_type: ValueType,
    /// String-serialized value
    pub raw_value: Option<String>,
    /// Free-form description
    pub description: Option<String>,
    /// Tombstone flag
    pub deleted: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Append-only audit trail entry for a setting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryItem {
    /// Key of the owning setting at the time of the change
    pub key: String,
    /// Value after the change; `None` when deleted or secret
    pub value: Option<String>,
    /// Whether the change deleted the setting
    pub deleted: bool,
    /// Who made the change
    pub changed_by: Option<String>,
    /// When the change was made
    pub created_at: DateTime<Utc>,
}

/// A proposed change to one setting, as submitted to a bulk update.
///
/// Absent fields are left untouched. `value: Some(Null)` clears the value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingChange {
    /// Key the change applies to
    pub key: String,
    /// Previous key when the change renames a setting
    pub key_was: Option<String>,
    /// New value (string, number, boolean, array or null)
    pub value: Option<serde_json::Value>,
    /// New value type name
    pub value_type: Option<String>,
    /// New description
    pub description: Option<String>,
    /// Delete (`true`) or keep/restore (`false`) the setting
    pub deleted: Option<bool>,
}

impl SettingChange {
    /// Start a change for `key`
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn value(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn value_type(mut self, value_type: impl Into<String>) -> Self {
        self.value_type = Some(value_type.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn renamed_from(mut self, key_was: impl Into<String>) -> Self {
        self.key_was = Some(key_was.into());
        self
    }

    pub fn delete(mut self) -> Self {
        self.deleted = Some(true);
        self
    }

    /// Build a change from an untyped JSON object, rejecting fields that
    /// have no counterpart on a setting.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, SettingsError> {
        let object = value.as_object().ok_or_else(|| SettingsError::Validation {
            errors: BTreeMap::from([(
                String::new(),
                vec!["change must be a JSON object".to_string()],
            )]),
        })?;

        let mut change = SettingChange::default();
        for (name, field) in object {
            match name.as_str() {
                "key" => change.key = json_text(field).unwrap_or_default(),
                "key_was" => change.key_was = json_text(field),
                "value" => change.value = Some(field.clone()),
                "value_type" => change.value_type = json_text(field),
                "description" => change.description = json_text(field),
                "deleted" | "delete" => change.deleted = Some(json_truthy(field)),
                _ => {
                    return Err(SettingsError::UnknownAttribute { name: name.clone() });
                }
            }
        }
        Ok(change)
    }
}

fn json_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn json_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Null => false,
        serde_json::Value::String(s) => crate::domain::coerce::boolean(s).unwrap_or(false),
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => true,
    }
}

/// Result of a bulk update
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    /// Whether every change validated and the batch was persisted
    pub success: bool,
    /// Attempted state of every affected setting
    pub settings: Vec<SettingRecord>,
    /// Full error messages keyed by setting key; empty on success
    pub errors: BTreeMap<String, Vec<String>>,
}

/// Offset/limit cursor for history paging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageParams {
    pub key: String,
    pub offset: u64,
    pub limit: u64,
}

/// One page of a setting's history
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPage {
    /// The setting the history belongs to
    pub setting: SettingRecord,
    /// Entries, most recent first
    pub histories: Vec<HistoryItem>,
    /// Cursor for the preceding page, if any
    pub previous_page_params: Option<PageParams>,
    /// Cursor for the following page, if a full page was returned
    pub next_page_params: Option<PageParams>,
}
