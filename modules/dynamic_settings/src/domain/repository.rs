//! Storage adapter contract
//!
//! This trait defines the interface for data access operations.
//! Implementations are in infra/storage.

use crate::contract::{HistoryItem, SettingRecord};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// One record to persist as part of a `save_all` batch, together with the
/// history entry describing the change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    /// Full state of the setting after the change
    pub record: SettingRecord,
    /// Audit entry to append in the same transaction
    pub history: Option<HistoryItem>,
    /// Null out the stored values of every existing history entry for the key
    pub redact_history: bool,
}

/// Persistence backend for settings and their history.
///
/// `namespace` partitions keys; `None` is the default partition.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// All settings, including deleted ones
    async fn fetch_all(&self, namespace: Option<&str>) -> Result<Vec<SettingRecord>>;

    /// Settings that are not deleted
    async fn fetch_active(&self, namespace: Option<&str>) -> Result<Vec<SettingRecord>>;

    /// Settings (including deleted ones) updated at or after `since`
    async fn fetch_updated_since(
        &self,
        namespace: Option<&str>,
        since: DateTime<Utc>,
    ) -> Result<Vec<SettingRecord>>;

    /// Find a setting by key, whether deleted or not
    async fn find_by_key(&self, namespace: Option<&str>, key: &str)
        -> Result<Option<SettingRecord>>;

    /// Most recent `updated_at` across all settings, `None` when empty
    async fn last_updated_at(&self, namespace: Option<&str>) -> Result<Option<DateTime<Utc>>>;

    /// Persist a batch of records and their history atomically: either every
    /// write is applied or none is.
    async fn save_all(&self, namespace: Option<&str>, writes: Vec<PendingWrite>) -> Result<()>;

    /// History for a key, most recent first
    async fn history(
        &self,
        namespace: Option<&str>,
        key: &str,
        limit: Option<u64>,
        offset: u64,
    ) -> Result<Vec<HistoryItem>>;

    /// Whether loads may run on a background task without starving callers
    /// (for example because the backend has spare pooled connections)
    fn supports_async_load(&self) -> bool {
        false
    }
}
