//! Native client trait for inter-module communication
//!
//! This trait defines the API that other modules use to read and edit settings.
//! NO HTTP - direct function calls for performance.

use super::error::SettingsError;
use super::model::{HistoryPage, SettingChange, SettingRecord, SettingValue, UpdateOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Settings service API for inter-module communication
#[async_trait]
pub trait SettingsApi: Send + Sync {
    /// Current value of a setting, served from the local cache.
    /// Never fails; unavailable storage reads as `None`.
    async fn get(&self, key: &str) -> Option<SettingValue>;

    /// Get an active setting by key
    async fn get_setting(&self, key: &str) -> Result<SettingRecord, SettingsError>;

    /// All active settings, sorted by key
    async fn list_settings(&self) -> Result<Vec<SettingRecord>, SettingsError>;

    /// Apply a batch of changes all-or-nothing
    async fn update_settings(
        &self,
        changes: Vec<SettingChange>,
        changed_by: Option<&str>,
    ) -> Result<UpdateOutcome, SettingsError>;

    /// One page of a setting's history, most recent first
    async fn history_page(
        &self,
        key: &str,
        limit: u64,
        offset: i64,
    ) -> Result<HistoryPage, SettingsError>;

    /// Most recent update time across all settings
    async fn last_updated_at(&self) -> Result<Option<DateTime<Utc>>, SettingsError>;

    /// Settings updated at or after `since`, including deleted ones
    async fn updated_since(&self, since: DateTime<Utc>) -> Result<Vec<SettingRecord>, SettingsError>;
}
