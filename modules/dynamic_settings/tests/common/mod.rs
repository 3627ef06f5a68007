//! Common test utilities: an instrumented store and service builders
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dynamic_settings::contract::{HistoryItem, SettingRecord, ValueType};
use dynamic_settings::domain::{CacheOptions, LocalCache, PendingWrite, Service, SettingsStore};
use dynamic_settings::InMemoryStore;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub fn print_test_header(test_name: &str, purpose: &[&str]) {
    println!("\n🧪 TEST: {}", test_name);
    if let Some(first) = purpose.first() {
        println!("📋 PURPOSE: {}", first);
    }
    for line in purpose.iter().skip(1) {
        println!("   {}", line);
    }
}

pub fn print_json(label: &str, value: &serde_json::Value) {
    println!(
        "   {}: {}",
        label,
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

/// In-memory store that counts calls and can be told to fail or stall
#[derive(Default)]
pub struct TestStore {
    inner: InMemoryStore,
    load_delay: Duration,
    async_load: bool,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fetch_active_calls: AtomicUsize,
    find_calls: AtomicUsize,
    last_updated_calls: AtomicUsize,
}

impl TestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stall every full load by `delay`
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    pub fn with_async_load(mut self) -> Self {
        self.async_load = true;
        self
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fetch_active_calls(&self) -> usize {
        self.fetch_active_calls.load(Ordering::SeqCst)
    }

    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    pub fn last_updated_calls(&self) -> usize {
        self.last_updated_calls.load(Ordering::SeqCst)
    }

    fn check_reads(&self) -> anyhow::Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            anyhow::bail!("connection refused");
        }
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for TestStore {
    async fn fetch_all(&self, namespace: Option<&str>) -> anyhow::Result<Vec<SettingRecord>> {
        self.check_reads()?;
        self.inner.fetch_all(namespace).await
    }

    async fn fetch_active(&self, namespace: Option<&str>) -> anyhow::Result<Vec<SettingRecord>> {
        self.fetch_active_calls.fetch_add(1, Ordering::SeqCst);
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }
        self.check_reads()?;
        self.inner.fetch_active(namespace).await
    }

    async fn fetch_updated_since(
        &self,
        namespace: Option<&str>,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<SettingRecord>> {
        self.check_reads()?;
        self.inner.fetch_updated_since(namespace, since).await
    }

    async fn find_by_key(
        &self,
        namespace: Option<&str>,
        key: &str,
    ) -> anyhow::Result<Option<SettingRecord>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;
        self.inner.find_by_key(namespace, key).await
    }

    async fn last_updated_at(&self, namespace: Option<&str>) -> anyhow::Result<Option<DateTime<Utc>>> {
        self.last_updated_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;
        self.inner.last_updated_at(namespace).await
    }

    async fn save_all(&self, namespace: Option<&str>, writes: Vec<PendingWrite>) -> anyhow::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("transaction aborted");
        }
        self.inner.save_all(namespace, writes).await
    }

    async fn history(
        &self,
        namespace: Option<&str>,
        key: &str,
        limit: Option<u64>,
        offset: u64,
    ) -> anyhow::Result<Vec<HistoryItem>> {
        self.check_reads()?;
        self.inner.history(namespace, key, limit, offset).await
    }

    fn supports_async_load(&self) -> bool {
        self.async_load
    }
}

pub fn cache_over(store: &Arc<TestStore>, options: CacheOptions) -> LocalCache {
    LocalCache::new(store.clone(), None, options)
}

pub fn service_over(store: &Arc<TestStore>, options: CacheOptions) -> Service {
    Service::new(store.clone(), cache_over(store, options), None)
}

/// Write a setting straight into the store, bypassing any cache
pub async fn seed(store: &dyn SettingsStore, key: &str, value_type: ValueType, raw: &str) {
    let now = Utc::now();
    let record = SettingRecord {
        key: key.to_string(),
        value_type,
        raw_value: Some(raw.to_string()),
        description: None,
        deleted: false,
        created_at: now,
        updated_at: now,
    };
    let history = HistoryItem {
        key: key.to_string(),
        value: Some(raw.to_string()),
        deleted: false,
        changed_by: Some("seed".to_string()),
        created_at: now,
    };
    store
        .save_all(
            None,
            vec![PendingWrite {
                record,
                history: Some(history),
                redact_history: false,
            }],
        )
        .await
        .unwrap();
}

/// Values of a history listing, most recent first
pub fn history_values(items: &[HistoryItem]) -> Vec<Option<String>> {
    items.iter().map(|item| item.value.clone()).collect()
}
