//! Domain service - business logic orchestration

use super::cache::LocalCache;
use super::coerce;
use super::repository::{PendingWrite, SettingsStore};
use super::setting::Setting;
use crate::contract::{
    HistoryItem, HistoryPage, PageParams, SettingChange, SettingRecord, SettingValue,
    SettingsError,
};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Result of [`Service::update_settings`]
#[derive(Debug, Clone)]
pub struct BulkUpdate {
    /// Whether every change validated and the batch was committed
    pub all_valid: bool,
    /// Every affected setting in the order first touched, with validation
    /// errors attached
    pub settings: Vec<Setting>,
    /// Full error messages keyed by setting key
    pub errors: BTreeMap<String, Vec<String>>,
}

/// Domain service for settings management
pub struct Service {
    store: Arc<dyn SettingsStore>,
    cache: LocalCache,
    namespace: Option<String>,
}

impl Service {
    /// Create a new service instance. `cache` must read from `store`.
    pub fn new(store: Arc<dyn SettingsStore>, cache: LocalCache, namespace: Option<String>) -> Self {
        Self {
            store,
            cache,
            namespace,
        }
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    // ===== Cached reads =====

    /// Current value of `key`, served from the local cache
    pub async fn get(&self, key: &str) -> Option<SettingValue> {
        self.cache.get(key).await
    }

    pub async fn string(&self, key: &str, default: &str) -> String {
        self.raw(key).await.unwrap_or_else(|| default.to_string())
    }

    pub async fn integer(&self, key: &str, default: i64) -> i64 {
        self.raw(key)
            .await
            .and_then(|raw| coerce::integer(&raw))
            .unwrap_or(default)
    }

    pub async fn float(&self, key: &str, default: f64) -> f64 {
        self.raw(key)
            .await
            .and_then(|raw| coerce::float(&raw))
            .unwrap_or(default)
    }

    /// Whether `key` holds a true value; `default` when unset
    pub async fn enabled(&self, key: &str, default: bool) -> bool {
        self.raw(key)
            .await
            .and_then(|raw| coerce::boolean(&raw))
            .unwrap_or(default)
    }

    /// Whether `key` holds a false value; `default` when unset
    pub async fn disabled(&self, key: &str, default: bool) -> bool {
        !self.enabled(key, !default).await
    }

    pub async fn datetime(&self, key: &str, default: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
        self.raw(key)
            .await
            .and_then(|raw| coerce::datetime(&raw))
            .or(default)
    }

    pub async fn array(&self, key: &str, default: Vec<String>) -> Vec<String> {
        self.raw(key)
            .await
            .map(|raw| coerce::array(&raw))
            .unwrap_or(default)
    }

    /// Cached values as a nested JSON object, keys split on `.`.
    ///
    /// With a prefix, only keys below it are included and the prefix is
    /// stripped.
    pub async fn structured(&self, prefix: Option<&str>) -> serde_json::Value {
        self.cache.ensure_up_to_date().await;

        let mut entries: Vec<(String, SettingValue)> = self.cache.to_map().into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let prefix = prefix.map(|p| p.trim_end_matches('.')).filter(|p| !p.is_empty());
        let mut root = serde_json::Map::new();
        for (key, value) in entries {
            let path = match prefix {
                Some(prefix) => match key.strip_prefix(prefix).and_then(|rest| rest.strip_prefix('.')) {
                    Some(rest) => rest,
                    None => continue,
                },
                None => key.as_str(),
            };
            insert_path(&mut root, path, value.to_json());
        }
        serde_json::Value::Object(root)
    }

    async fn raw(&self, key: &str) -> Option<String> {
        self.cache.get(key).await.map(|value| value.to_raw())
    }

    // ===== Store reads =====

    /// Active setting by key
    pub async fn find(&self, key: &str) -> Result<Setting, SettingsError> {
        self.find_record(key)
            .await?
            .filter(|record| !record.deleted)
            .map(Setting::from_record)
            .ok_or_else(|| SettingsError::NotFound {
                key: key.to_string(),
            })
    }

    /// All active settings, sorted by key
    pub async fn list(&self) -> Result<Vec<Setting>, SettingsError> {
        let mut records = self
            .store
            .fetch_active(self.namespace())
            .await
            .map_err(SettingsError::storage)?;
        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records.into_iter().map(Setting::from_record).collect())
    }

    /// Most recent update time across all settings
    pub async fn last_updated_at(&self) -> Result<Option<DateTime<Utc>>, SettingsError> {
        self.cache
            .last_updated_at()
            .await
            .map_err(SettingsError::storage)
    }

    /// Settings updated at or after `since`, deleted ones included
    pub async fn updated_since(&self, since: DateTime<Utc>) -> Result<Vec<Setting>, SettingsError> {
        let mut records = self
            .store
            .fetch_updated_since(self.namespace(), since)
            .await
            .map_err(SettingsError::storage)?;
        records.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then_with(|| a.key.cmp(&b.key)));
        Ok(records.into_iter().map(Setting::from_record).collect())
    }

    /// History of `key`, most recent first
    pub async fn history(
        &self,
        key: &str,
        limit: Option<u64>,
        offset: u64,
    ) -> Result<Vec<HistoryItem>, SettingsError> {
        self.store
            .history(self.namespace(), key, limit, offset)
            .await
            .map_err(SettingsError::storage)
    }

    /// One page of history with cursors for the neighbouring pages.
    ///
    /// Negative offsets are treated as zero. Deleted settings keep their
    /// history; unknown keys are `NotFound`.
    pub async fn history_page(
        &self,
        key: &str,
        limit: u64,
        offset: i64,
    ) -> Result<HistoryPage, SettingsError> {
        let record = self
            .find_record(key)
            .await?
            .ok_or_else(|| SettingsError::NotFound {
                key: key.to_string(),
            })?;

        let offset = u64::try_from(offset).unwrap_or(0);
        let histories = self.history(&record.key, Some(limit), offset).await?;

        let previous_page_params = (offset > 0).then(|| PageParams {
            key: record.key.clone(),
            offset: offset.saturating_sub(limit),
            limit,
        });
        let next_page_params = (limit > 0 && histories.len() as u64 == limit).then(|| PageParams {
            key: record.key.clone(),
            offset: offset + limit,
            limit,
        });

        Ok(HistoryPage {
            setting: record,
            histories,
            previous_page_params,
            next_page_params,
        })
    }

    // ===== Writes =====

    /// Validate and persist one setting together with its history.
    ///
    /// A persisted setting without changes is left untouched.
    pub async fn save(&self, setting: &mut Setting) -> Result<(), SettingsError> {
        let writes = setting.prepare_save(Utc::now())?;
        let Some(primary) = writes.first().map(|write| write.record.clone()) else {
            return Ok(());
        };
        let tombstones: Vec<String> = writes
            .iter()
            .skip(1)
            .map(|write| write.record.key.clone())
            .collect();

        self.store
            .save_all(self.namespace(), writes)
            .await
            .map_err(SettingsError::storage)?;

        setting.mark_saved(primary);
        self.cache.update_setting(setting);
        for key in &tombstones {
            self.cache.mark_absent(key);
        }
        self.cache.clear_last_updated();

        tracing::debug!(key = setting.key(), "setting saved");
        Ok(())
    }

    /// Apply a batch of changes atomically.
    ///
    /// Every change is validated; the batch is committed in one store
    /// transaction only when all are valid, otherwise nothing is written and
    /// the returned errors name every invalid setting. Storage failures are
    /// returned as errors and leave both the store and the cache unchanged.
    pub async fn update_settings(
        &self,
        changes: Vec<SettingChange>,
        changed_by: Option<&str>,
    ) -> Result<BulkUpdate, SettingsError> {
        let mut staged: IndexMap<String, Setting> = IndexMap::new();
        let mut errors = BTreeMap::new();
        let mut all_valid = true;

        for change in changes {
            let key = change.key.trim().to_string();
            if key.is_empty() || is_noop(&change) {
                continue;
            }
            let deleting = change.deleted == Some(true);

            if !staged.contains_key(&key) {
                let setting = match self.find_record(&key).await? {
                    Some(record) => Setting::from_record(record),
                    None if deleting => continue,
                    None => {
                        self.seed_setting(&staged, &key, change.key_was.as_deref())
                            .await?
                    }
                };
                staged.insert(key.clone(), setting);
            }

            if let Some(key_was) = change.key_was.as_deref().map(str::trim) {
                if !key_was.is_empty() && key_was != key && !staged.contains_key(key_was) {
                    if let Some(record) = self.find_record(key_was).await? {
                        if !record.deleted {
                            let mut old = Setting::from_record(record);
                            old.set_changed_by(changed_by.map(str::to_string));
                            old.set_deleted(true);
                            staged.insert(key_was.to_string(), old);
                        }
                    }
                }
            }

            let Some(setting) = staged.get_mut(&key) else {
                continue;
            };
            setting.set_changed_by(changed_by.map(str::to_string));
            if deleting {
                setting.set_deleted(true);
                continue;
            }

            if let Some(value_type) = change.value_type.as_deref() {
                setting.set_value_type_name(value_type);
            }
            if let Some(value) = &change.value {
                setting.set_json_value(value);
            }
            if let Some(description) = change.description {
                setting.set_description(Some(description));
            }
            if setting.is_deleted() {
                setting.set_deleted(false);
            }

            if !setting.validate() {
                all_valid = false;
                errors.insert(key, setting.error_messages());
            }
        }

        let now = Utc::now();
        let mut writes: Vec<PendingWrite> = Vec::new();
        let mut committed: Vec<Option<SettingRecord>> = Vec::with_capacity(staged.len());
        for setting in staged.values_mut() {
            match setting.prepare_save(now) {
                Ok(batch) => {
                    committed.push(batch.first().map(|write| write.record.clone()));
                    writes.extend(batch);
                }
                Err(SettingsError::Validation { errors: invalid }) => {
                    all_valid = false;
                    committed.push(None);
                    errors.extend(invalid);
                }
                Err(err) => return Err(err),
            }
        }

        if !all_valid {
            tracing::debug!(invalid = errors.len(), "bulk update rejected");
            return Ok(BulkUpdate {
                all_valid,
                settings: staged.into_values().collect(),
                errors,
            });
        }

        let written = writes.len();
        if written > 0 {
            self.store
                .save_all(self.namespace(), writes)
                .await
                .map_err(SettingsError::storage)?;
        }

        for (setting, record) in staged.values_mut().zip(committed) {
            if let Some(record) = record {
                setting.mark_saved(record);
                self.cache.update_setting(setting);
            }
        }
        self.cache.clear_last_updated();

        tracing::info!(
            namespace = ?self.namespace,
            settings = staged.len(),
            writes = written,
            changed_by,
            "bulk settings update committed"
        );

        Ok(BulkUpdate {
            all_valid,
            settings: staged.into_values().collect(),
            errors,
        })
    }

    async fn find_record(&self, key: &str) -> Result<Option<SettingRecord>, SettingsError> {
        if key.trim().is_empty() {
            return Ok(None);
        }
        self.store
            .find_by_key(self.namespace(), key)
            .await
            .map_err(SettingsError::storage)
    }

    /// A new setting for `key`; a rename carries over the type, value and
    /// description of the setting it replaces. The old key's staged state
    /// takes precedence over the store, so chained renames in one batch
    /// carry values along the chain.
    async fn seed_setting(
        &self,
        staged: &IndexMap<String, Setting>,
        key: &str,
        key_was: Option<&str>,
    ) -> Result<Setting, SettingsError> {
        let mut setting = Setting::new(key);
        let Some(key_was) = key_was.map(str::trim).filter(|k| !k.is_empty() && *k != key) else {
            return Ok(setting);
        };

        let previous = match staged.get(key_was) {
            Some(staged) if staged.is_deleted() => None,
            Some(staged) => Some(staged.to_record(Utc::now())),
            None => self.find_record(key_was).await?.filter(|r| !r.deleted),
        };
        if let Some(previous) = previous {
            setting.set_value_type(previous.value_type);
            setting.set_raw_value(previous.raw_value);
            setting.set_description(previous.description);
        }
        Ok(setting)
    }
}

/// A change that carries no field at all
fn is_noop(change: &SettingChange) -> bool {
    let blank_value = match &change.value {
        None | Some(serde_json::Value::Null) => true,
        Some(serde_json::Value::String(s)) => coerce::is_blank(Some(s.as_str())),
        Some(serde_json::Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    };
    blank_value
        && change.value_type.as_deref().map_or(true, str::is_empty)
        && change.description.as_deref().map_or(true, str::is_empty)
        && change.deleted.is_none()
}

fn insert_path(
    root: &mut serde_json::Map<String, serde_json::Value>,
    path: &str,
    value: serde_json::Value,
) {
    let parts: Vec<&str> = path.split('.').filter(|part| !part.is_empty()).collect();
    let Some((last, parents)) = parts.split_last() else {
        return;
    };

    let mut current = root;
    for part in parents {
        let entry = current
            .entry(part.to_string())
            .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
        if !entry.is_object() {
            *entry = serde_json::Value::Object(serde_json::Map::new());
        }
        let serde_json::Value::Object(next) = entry else {
            return;
        };
        current = next;
    }
    current.insert(last.to_string(), value);
}
