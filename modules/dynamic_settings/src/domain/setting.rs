//! Setting entity: typed value, validation, change tracking and history
//! emission on save.

use super::coerce;
use super::repository::PendingWrite;
use super::validation::{self, AttributeErrors};
use crate::contract::{
    format_datetime, HistoryItem, SettingRecord, SettingValue, SettingsError, ValueType,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Tracked attributes of a setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SettingField {
    Key,
    ValueType,
    RawValue,
    Description,
    Deleted,
    UpdatedAt,
}

impl SettingField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingField::Key => "key",
            SettingField::ValueType => "value_type",
            SettingField::RawValue => "raw_value",
            SettingField::Description => "description",
            SettingField::Deleted => "deleted",
            SettingField::UpdatedAt => "updated_at",
        }
    }
}

/// Snapshot of a tracked attribute value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(Option<String>),
    Type(ValueType),
    Flag(bool),
    Timestamp(Option<DateTime<Utc>>),
}

/// `(value at last save, current value)` for every changed attribute
pub type Changes = BTreeMap<SettingField, (FieldValue, FieldValue)>;

/// One configuration key with its typed value.
///
/// Built in memory from a key or hydrated from a stored record. Setters
/// record changes until the setting is saved.
#[derive(Debug, Clone, PartialEq)]
pub struct Setting {
    key: String,
    value_type: ValueType,
    unrecognized_value_type: Option<String>,
    raw_value: Option<String>,
    description: Option<String>,
    deleted: bool,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    changed_by: Option<String>,
    persisted: Option<SettingRecord>,
    changes: Changes,
    errors: AttributeErrors,
}

impl Setting {
    /// New, unsaved setting of type `string`
    pub fn new(key: impl Into<String>) -> Self {
        let mut setting = Self {
            key: String::new(),
            value_type: ValueType::default(),
            unrecognized_value_type: None,
            raw_value: None,
            description: None,
            deleted: false,
            created_at: None,
            updated_at: None,
            changed_by: None,
            persisted: None,
            changes: Changes::new(),
            errors: AttributeErrors::new(),
        };
        setting.set_key(key);
        setting
    }

    /// Hydrate a setting from storage. The result has no pending changes.
    pub fn from_record(record: SettingRecord) -> Self {
        Self {
            key: record.key.clone(),
            value_type: record.value_type,
            unrecognized_value_type: None,
            raw_value: record.raw_value.clone(),
            description: record.description.clone(),
            deleted: record.deleted,
            created_at: Some(record.created_at),
            updated_at: Some(record.updated_at),
            changed_by: None,
            persisted: Some(record),
            changes: Changes::new(),
            errors: AttributeErrors::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn raw_value(&self) -> Option<&str> {
        self.raw_value.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn changed_by(&self) -> Option<&str> {
        self.changed_by.as_deref()
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted.is_some()
    }

    /// Coerced value; `None` when blank, deleted or not coercible
    pub fn value(&self) -> Option<SettingValue> {
        if self.deleted {
            return None;
        }
        coerce::coerce(self.raw_value.as_deref(), self.value_type)
            .ok()
            .flatten()
    }

    pub fn set_key(&mut self, key: impl Into<String>) {
        let key: String = key.into();
        let key = key.trim().to_string();
        let old = FieldValue::Text(Some(self.key.clone()));
        self.key = key.clone();
        self.track(SettingField::Key, old, FieldValue::Text(Some(key)));
    }

    pub fn set_value_type(&mut self, value_type: ValueType) {
        self.unrecognized_value_type = None;
        let old = FieldValue::Type(self.value_type);
        self.value_type = value_type;
        self.track(SettingField::ValueType, old, FieldValue::Type(value_type));
    }

    /// Set the value type by name. Unrecognized names leave the type as is
    /// and make the setting invalid.
    pub fn set_value_type_name(&mut self, name: &str) {
        match ValueType::parse(name) {
            Some(value_type) => self.set_value_type(value_type),
            None => self.unrecognized_value_type = Some(name.to_string()),
        }
    }

    pub fn set_raw_value(&mut self, raw_value: Option<String>) {
        let raw_value = raw_value.filter(|raw| !coerce::is_blank(Some(raw.as_str())));
        let old = FieldValue::Text(self.raw_value.clone());
        self.raw_value = raw_value.clone();
        self.track(SettingField::RawValue, old, FieldValue::Text(raw_value));
    }

    /// Store a typed value in its canonical string form
    pub fn set_value(&mut self, value: Option<&SettingValue>) {
        self.set_raw_value(value.map(SettingValue::to_raw));
    }

    /// Store an untyped JSON value (string, number, boolean, array or null)
    pub fn set_json_value(&mut self, value: &serde_json::Value) {
        self.set_raw_value(coerce::serialize_json(value));
    }

    pub fn set_description(&mut self, description: Option<String>) {
        let description = description.filter(|d| !d.is_empty());
        let old = FieldValue::Text(self.description.clone());
        self.description = description.clone();
        self.track(SettingField::Description, old, FieldValue::Text(description));
    }

    pub fn set_deleted(&mut self, deleted: bool) {
        let old = FieldValue::Flag(self.deleted);
        self.deleted = deleted;
        self.track(SettingField::Deleted, old, FieldValue::Flag(deleted));
    }

    /// Explicitly set the update timestamp for the next save
    pub fn set_updated_at(&mut self, updated_at: DateTime<Utc>) {
        let old = FieldValue::Timestamp(self.updated_at);
        self.updated_at = Some(updated_at);
        self.track(
            SettingField::UpdatedAt,
            old,
            FieldValue::Timestamp(Some(updated_at)),
        );
    }

    /// Annotate who is making the pending change. Cleared after save.
    pub fn set_changed_by(&mut self, changed_by: Option<String>) {
        self.changed_by = changed_by;
    }

    pub fn is_changed(&self, field: SettingField) -> bool {
        self.changes.contains_key(&field)
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn changes(&self) -> &Changes {
        &self.changes
    }

    /// Run validation, replacing any previous errors
    pub fn validate(&mut self) -> bool {
        let mut errors = AttributeErrors::new();
        validation::validate_key(&self.key, &mut errors);
        validation::validate_value_type(self.unrecognized_value_type.as_deref(), &mut errors);
        validation::validate_value(self.raw_value.as_deref(), self.value_type, &mut errors);
        self.errors = errors;
        self.errors.is_empty()
    }

    /// Errors from the last validation, keyed by attribute
    pub fn errors(&self) -> &AttributeErrors {
        &self.errors
    }

    /// Errors from the last validation as full messages
    pub fn error_messages(&self) -> Vec<String> {
        validation::full_messages(&self.errors)
    }

    /// Current state as a storage record. Unsaved timestamps fall back to `now`.
    pub fn to_record(&self, now: DateTime<Utc>) -> SettingRecord {
        SettingRecord {
            key: self.key.clone(),
            value_type: self.value_type,
            raw_value: self.raw_value.clone(),
            description: self.description.clone(),
            deleted: self.deleted,
            created_at: self.created_at.unwrap_or(now),
            updated_at: self.updated_at.unwrap_or(now),
        }
    }

    /// Validate and compute the writes that persist this setting.
    ///
    /// Returns an empty batch for a persisted setting without changes. The
    /// setting itself is not modified apart from its errors; call
    /// [`Setting::mark_saved`] once the writes are committed.
    pub fn prepare_save(&mut self, now: DateTime<Utc>) -> Result<Vec<PendingWrite>, SettingsError> {
        if !self.validate() {
            return Err(SettingsError::Validation {
                errors: BTreeMap::from([(self.key.clone(), self.error_messages())]),
            });
        }
        if self.is_persisted() && !self.has_changes() {
            return Ok(Vec::new());
        }

        let mut record = self.to_record(now);
        if !self.is_changed(SettingField::UpdatedAt) {
            record.updated_at = now;
        }

        let history = (self.is_changed(SettingField::RawValue)
            || self.is_changed(SettingField::Deleted)
            || self.is_changed(SettingField::Key))
        .then(|| HistoryItem {
            key: record.key.clone(),
            value: if record.deleted || record.value_type == ValueType::Secret {
                None
            } else {
                record.raw_value.clone()
            },
            deleted: record.deleted,
            changed_by: self.changed_by.clone(),
            created_at: now,
        });

        let redact_history = self.value_type == ValueType::Secret
            && self.is_changed(SettingField::ValueType)
            && self.is_persisted();

        let mut writes = vec![PendingWrite {
            record,
            history,
            redact_history,
        }];

        if let Some(tombstone) = self.rename_tombstone(now) {
            writes.push(tombstone);
        }
        Ok(writes)
    }

    /// Apply the outcome of a committed save: the written record becomes the
    /// persisted state, change tracking and `changed_by` are cleared.
    pub fn mark_saved(&mut self, record: SettingRecord) {
        self.created_at = Some(record.created_at);
        self.updated_at = Some(record.updated_at);
        self.persisted = Some(record);
        self.changes.clear();
        self.changed_by = None;
    }

    /// JSON view used by API responses
    pub fn as_json(&self) -> serde_json::Value {
        let mut json = serde_json::json!({
            "key": self.key,
            "value": self.value().map(|v| v.to_json()).unwrap_or(serde_json::Value::Null),
            "value_type": self.value_type.as_str(),
            "description": self.description,
            "created_at": self.created_at.as_ref().map(format_datetime),
            "updated_at": self.updated_at.as_ref().map(format_datetime),
        });
        if self.deleted {
            json["deleted"] = serde_json::Value::Bool(true);
        }
        json
    }

    /// A persisted setting whose key changed leaves a deleted record behind
    /// under its previous key.
    fn rename_tombstone(&self, now: DateTime<Utc>) -> Option<PendingWrite> {
        let original = self.persisted.as_ref()?;
        if original.key == self.key || original.deleted {
            return None;
        }
        Some(PendingWrite {
            record: SettingRecord {
                deleted: true,
                updated_at: now,
                ..original.clone()
            },
            history: Some(HistoryItem {
                key: original.key.clone(),
                value: None,
                deleted: true,
                changed_by: self.changed_by.clone(),
                created_at: now,
            }),
            redact_history: false,
        })
    }

    fn track(&mut self, field: SettingField, old: FieldValue, new: FieldValue) {
        match self.changes.get_mut(&field) {
            Some((original, _)) if *original == new => {
                self.changes.remove(&field);
            }
            Some((_, current)) => *current = new,
            None if old != new => {
                self.changes.insert(field, (old, new));
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn persisted(key: &str, value_type: ValueType, raw: &str) -> Setting {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Setting::from_record(SettingRecord {
            key: key.to_string(),
            value_type,
            raw_value: Some(raw.to_string()),
            description: None,
            deleted: false,
            created_at: at,
            updated_at: at,
        })
    }

    #[test]
    fn test_new_setting_defaults_to_string() {
        let setting = Setting::new("greeting");
        assert_eq!(setting.value_type(), ValueType::String);
        assert!(!setting.is_persisted());
        assert!(setting.is_changed(SettingField::Key));
    }

    #[test]
    fn test_integer_with_text_is_invalid_on_value_only() {
        let mut setting = Setting::new("limit");
        setting.set_value_type(ValueType::Integer);
        setting.set_raw_value(Some("abc".to_string()));

        assert!(!setting.validate());
        assert_eq!(setting.errors().len(), 1);
        assert_eq!(
            setting.errors().get("value"),
            Some(&vec!["must be an integer".to_string()])
        );
        assert_eq!(setting.value(), None);
    }

    #[test]
    fn test_blank_and_long_keys_are_invalid() {
        let mut blank = Setting::new("");
        assert!(!blank.validate());
        assert!(blank.errors().contains_key("key"));

        let mut long = Setting::new("k".repeat(200));
        assert!(!long.validate());
        assert!(long.errors().contains_key("key"));
    }

    #[test]
    fn test_unrecognized_value_type_is_invalid() {
        let mut setting = Setting::new("x");
        setting.set_value_type_name("decimal");
        assert!(!setting.validate());
        assert_eq!(
            setting.error_messages(),
            vec!["value_type is not included in the list".to_string()]
        );
    }

    #[test]
    fn test_whitespace_value_is_stored_as_blank() {
        let mut setting = persisted("motd", ValueType::String, "hello");
        setting.set_raw_value(Some("   ".to_string()));
        assert_eq!(setting.raw_value(), None);
        assert_eq!(setting.value(), None);
        assert!(setting.is_changed(SettingField::RawValue));

        setting.set_json_value(&serde_json::json!(" \t"));
        assert_eq!(setting.raw_value(), None);
    }

    #[test]
    fn test_deleted_setting_has_no_value() {
        let mut setting = persisted("flag", ValueType::Boolean, "true");
        assert_eq!(setting.value(), Some(SettingValue::Boolean(true)));
        setting.set_deleted(true);
        assert_eq!(setting.value(), None);
        assert_eq!(setting.raw_value(), Some("true"));
    }

    #[test]
    fn test_changes_record_first_old_value() {
        let mut setting = persisted("a", ValueType::String, "one");
        setting.set_raw_value(Some("two".to_string()));
        setting.set_raw_value(Some("three".to_string()));

        assert_eq!(
            setting.changes().get(&SettingField::RawValue),
            Some(&(
                FieldValue::Text(Some("one".to_string())),
                FieldValue::Text(Some("three".to_string()))
            ))
        );

        setting.set_raw_value(Some("one".to_string()));
        assert!(!setting.has_changes());
    }

    #[test]
    fn test_value_serialization() {
        let mut setting = Setting::new("list");
        setting.set_value_type(ValueType::Array);
        setting.set_value(Some(&SettingValue::Array(vec!["a".into(), "b".into()])));
        assert_eq!(setting.raw_value(), Some("a\nb"));
        assert_eq!(
            setting.value(),
            Some(SettingValue::Array(vec!["a".into(), "b".into()]))
        );

        setting.set_value_type(ValueType::Integer);
        setting.set_value(Some(&SettingValue::Integer(42)));
        assert_eq!(setting.raw_value(), Some("42"));
        assert_eq!(setting.value(), Some(SettingValue::Integer(42)));
    }

    #[test]
    fn test_prepare_save_emits_history_for_value_change() {
        let now = Utc::now();
        let mut setting = Setting::new("timeout_ms");
        setting.set_value_type(ValueType::Integer);
        setting.set_raw_value(Some("30".to_string()));
        setting.set_changed_by(Some("alice".to_string()));

        let writes = setting.prepare_save(now).unwrap();
        assert_eq!(writes.len(), 1);
        let write = &writes[0];
        assert_eq!(write.record.created_at, now);
        assert_eq!(write.record.updated_at, now);
        assert_eq!(
            write.history,
            Some(HistoryItem {
                key: "timeout_ms".to_string(),
                value: Some("30".to_string()),
                deleted: false,
                changed_by: Some("alice".to_string()),
                created_at: now,
            })
        );

        setting.mark_saved(write.record.clone());
        assert!(setting.is_persisted());
        assert!(!setting.has_changes());
        assert_eq!(setting.changed_by(), None);
    }

    #[test]
    fn test_prepare_save_description_change_has_no_history() {
        let mut setting = persisted("a", ValueType::String, "one");
        setting.set_description(Some("docs".to_string()));
        let writes = setting.prepare_save(Utc::now()).unwrap();
        assert_eq!(writes.len(), 1);
        assert!(writes[0].history.is_none());
    }

    #[test]
    fn test_prepare_save_keeps_explicit_updated_at() {
        let explicit = Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap();
        let mut setting = persisted("a", ValueType::String, "one");
        setting.set_raw_value(Some("two".to_string()));
        setting.set_updated_at(explicit);
        let writes = setting.prepare_save(Utc::now()).unwrap();
        assert_eq!(writes[0].record.updated_at, explicit);
    }

    #[test]
    fn test_prepare_save_rejects_invalid_setting() {
        let mut setting = Setting::new("n");
        setting.set_value_type(ValueType::Float);
        setting.set_raw_value(Some("many".to_string()));
        let err = setting.prepare_save(Utc::now()).unwrap_err();
        assert_eq!(
            err,
            SettingsError::Validation {
                errors: BTreeMap::from([(
                    "n".to_string(),
                    vec!["value must be a number".to_string()]
                )])
            }
        );
    }

    #[test]
    fn test_prepare_save_unchanged_persisted_setting_is_noop() {
        let mut setting = persisted("a", ValueType::String, "one");
        assert!(setting.prepare_save(Utc::now()).unwrap().is_empty());
    }

    #[test]
    fn test_key_change_on_persisted_setting_writes_tombstone() {
        let now = Utc::now();
        let mut setting = persisted("old_key", ValueType::String, "v");
        setting.set_key("new_key");
        let writes = setting.prepare_save(now).unwrap();

        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].record.key, "new_key");
        assert!(!writes[0].record.deleted);
        assert_eq!(writes[1].record.key, "old_key");
        assert!(writes[1].record.deleted);
        assert_eq!(writes[1].history.as_ref().map(|h| h.deleted), Some(true));
    }

    #[test]
    fn test_secret_history_is_redacted() {
        let mut setting = persisted("token", ValueType::String, "abc");
        setting.set_value_type(ValueType::Secret);
        setting.set_raw_value(Some("def".to_string()));
        let writes = setting.prepare_save(Utc::now()).unwrap();

        assert!(writes[0].redact_history);
        assert_eq!(writes[0].history.as_ref().and_then(|h| h.value.clone()), None);
    }

    #[test]
    fn test_as_json_marks_deleted() {
        let mut setting = persisted("a", ValueType::Integer, "5");
        assert_eq!(setting.as_json()["value"], serde_json::json!(5));
        assert!(setting.as_json().get("deleted").is_none());

        setting.set_deleted(true);
        assert_eq!(setting.as_json()["deleted"], serde_json::json!(true));
        assert_eq!(setting.as_json()["value"], serde_json::Value::Null);
    }
}
