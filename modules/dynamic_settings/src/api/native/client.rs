//! Native client implementation - wraps domain service for in-process calls

use crate::contract::{
    HistoryPage, SettingChange, SettingRecord, SettingValue, SettingsApi, SettingsError,
    UpdateOutcome,
};
use crate::domain::Service;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Native client implementation that directly calls the domain service
///
/// This client is used for in-process communication without HTTP overhead.
#[derive(Clone)]
pub struct NativeClient {
    service: Arc<Service>,
}

impl NativeClient {
    /// Create a new native client
    pub fn new(service: Arc<Service>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl SettingsApi for NativeClient {
    async fn get(&self, key: &str) -> Option<SettingValue> {
        self.service.get(key).await
    }

    async fn get_setting(&self, key: &str) -> Result<SettingRecord, SettingsError> {
        let setting = self.service.find(key).await?;
        Ok(setting.to_record(Utc::now()))
    }

    async fn list_settings(&self) -> Result<Vec<SettingRecord>, SettingsError> {
        let now = Utc::now();
        Ok(self
            .service
            .list()
            .await?
            .iter()
            .map(|setting| setting.to_record(now))
            .collect())
    }

    async fn update_settings(
        &self,
        changes: Vec<SettingChange>,
        changed_by: Option<&str>,
    ) -> Result<UpdateOutcome, SettingsError> {
        let result = self.service.update_settings(changes, changed_by).await?;
        let now = Utc::now();
        Ok(UpdateOutcome {
            success: result.all_valid,
            settings: result
                .settings
                .iter()
                .map(|setting| setting.to_record(now))
                .collect(),
            errors: result.errors,
        })
    }

    async fn history_page(
        &self,
        key: &str,
        limit: u64,
        offset: i64,
    ) -> Result<HistoryPage, SettingsError> {
        self.service.history_page(key, limit, offset).await
    }

    async fn last_updated_at(&self) -> Result<Option<DateTime<Utc>>, SettingsError> {
        self.service.last_updated_at().await
    }

    async fn updated_since(&self, since: DateTime<Utc>) -> Result<Vec<SettingRecord>, SettingsError> {
        let now = Utc::now();
        Ok(self
            .service
            .updated_since(since)
            .await?
            .iter()
            .map(|setting| setting.to_record(now))
            .collect())
    }
}
