//! In-process settings store
//!
//! Keeps everything behind one lock so a `save_all` batch is applied
//! atomically. Suitable for tests and single-process deployments.

use crate::contract::{HistoryItem, SettingRecord};
use crate::domain::repository::{PendingWrite, SettingsStore};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

type RecordKey = (String, String);

struct StoredHistory {
    namespace: String,
    item: HistoryItem,
}

#[derive(Default)]
struct MemoryState {
    settings: HashMap<RecordKey, SettingRecord>,
    /// Insertion order breaks ties between entries with equal timestamps
    history: Vec<StoredHistory>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn select(
        &self,
        namespace: Option<&str>,
        filter: impl Fn(&SettingRecord) -> bool,
    ) -> Vec<SettingRecord> {
        let namespace = namespace.unwrap_or_default();
        let state = self.state.read();
        let mut records: Vec<SettingRecord> = state
            .settings
            .iter()
            .filter(|((ns, _), record)| ns == namespace && filter(record))
            .map(|(_, record)| record.clone())
            .collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        records
    }
}

#[async_trait]
impl SettingsStore for InMemoryStore {
    async fn fetch_all(&self, namespace: Option<&str>) -> Result<Vec<SettingRecord>> {
        Ok(self.select(namespace, |_| true))
    }

    async fn fetch_active(&self, namespace: Option<&str>) -> Result<Vec<SettingRecord>> {
        Ok(self.select(namespace, |record| !record.deleted))
    }

    async fn fetch_updated_since(
        &self,
        namespace: Option<&str>,
        since: DateTime<Utc>,
    ) -> Result<Vec<SettingRecord>> {
        Ok(self.select(namespace, |record| record.updated_at >= since))
    }

    async fn find_by_key(&self, namespace: Option<&str>, key: &str) -> Result<Option<SettingRecord>> {
        let id = (namespace.unwrap_or_default().to_string(), key.to_string());
        Ok(self.state.read().settings.get(&id).cloned())
    }

    async fn last_updated_at(&self, namespace: Option<&str>) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .select(namespace, |_| true)
            .iter()
            .map(|record| record.updated_at)
            .max())
    }

    async fn save_all(&self, namespace: Option<&str>, writes: Vec<PendingWrite>) -> Result<()> {
        let namespace = namespace.unwrap_or_default().to_string();
        let mut state = self.state.write();

        for write in writes {
            if write.redact_history {
                for stored in state.history.iter_mut() {
                    if stored.namespace == namespace && stored.item.key == write.record.key {
                        stored.item.value = None;
                    }
                }
            }
            if let Some(item) = write.history {
                state.history.push(StoredHistory {
                    namespace: namespace.clone(),
                    item,
                });
            }
            state
                .settings
                .insert((namespace.clone(), write.record.key.clone()), write.record);
        }
        Ok(())
    }

    async fn history(
        &self,
        namespace: Option<&str>,
        key: &str,
        limit: Option<u64>,
        offset: u64,
    ) -> Result<Vec<HistoryItem>> {
        let namespace = namespace.unwrap_or_default();
        let state = self.state.read();

        let mut entries: Vec<(usize, &HistoryItem)> = state
            .history
            .iter()
            .enumerate()
            .filter(|(_, stored)| stored.namespace == namespace && stored.item.key == key)
            .map(|(seq, stored)| (seq, &stored.item))
            .collect();
        entries.sort_by(|a, b| b.1.created_at.cmp(&a.1.created_at).then(b.0.cmp(&a.0)));

        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = limit.map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        Ok(entries
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(_, item)| item.clone())
            .collect())
    }
}
