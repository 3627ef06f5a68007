//! In-process read-through cache of setting values.
//!
//! Readers look keys up in an immutable snapshot that is swapped atomically,
//! so the hot path never takes a lock. Loads and refreshes are single-flight:
//! the `refreshing` flag is checked and set under the state mutex, and is
//! cleared by a drop guard so a failed or timed-out load cannot leave it set.
//!
//! State machine: `Unloaded -> Loading -> Loaded <-> Refreshing`; `reset`
//! returns to `Unloaded`.

use super::coerce;
use super::repository::SettingsStore;
use super::setting::Setting;
use crate::contract::{SettingRecord, SettingValue};
use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Cached state of one key
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEntry {
    /// The setting exists; `None` when its value is blank
    Present(Option<SettingValue>),
    /// Confirmed absent from the store
    Absent,
}

impl CacheEntry {
    fn from_record(record: &SettingRecord) -> Self {
        if record.deleted {
            return CacheEntry::Absent;
        }
        CacheEntry::Present(
            coerce::coerce(record.raw_value.as_deref(), record.value_type)
                .ok()
                .flatten(),
        )
    }

    pub fn value(&self) -> Option<&SettingValue> {
        match self {
            CacheEntry::Present(value) => value.as_ref(),
            CacheEntry::Absent => None,
        }
    }
}

/// Immutable key -> entry map swapped in as a whole
pub type Snapshot = HashMap<String, CacheEntry>;

/// Tunables for [`LocalCache`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    /// Maximum time between refresh checks
    pub refresh_interval: Duration,
    /// Drift buffer subtracted from the last refresh time when asking the
    /// store for changes
    pub refresh_skew: Duration,
    /// Deadline for each store round-trip
    pub store_timeout: Duration,
    /// Once the snapshot holds this many entries, misses are no longer cached
    pub negative_cache_ceiling: usize,
    /// How long a fetched `last_updated_at` is reused; zero disables reuse
    pub last_updated_ttl: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(5),
            refresh_skew: Duration::from_secs(1),
            store_timeout: Duration::from_secs(5),
            negative_cache_ceiling: 100_000,
            last_updated_ttl: Duration::ZERO,
        }
    }
}

struct RefreshState {
    last_refreshed_at: Option<DateTime<Utc>>,
    next_check_at: Instant,
    /// Earliest retry after a failed full load
    retry_load_at: Option<Instant>,
    refreshing: bool,
    refresh_interval: Duration,
    /// Bumped by `reset`; loads started under an older epoch are discarded
    epoch: u64,
}

struct CacheInner {
    store: Arc<dyn SettingsStore>,
    namespace: Option<String>,
    options: CacheOptions,
    snapshot: ArcSwapOption<Snapshot>,
    /// Bumped on every snapshot swap
    generation: AtomicU64,
    state: Mutex<RefreshState>,
    refreshing_tx: watch::Sender<bool>,
    last_updated: Mutex<Option<(Instant, Option<DateTime<Utc>>)>>,
}

/// Clears the `refreshing` flag when a load or refresh ends, however it ends
struct RefreshGuard {
    inner: Arc<CacheInner>,
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock();
        state.refreshing = false;
        self.inner.refreshing_tx.send_replace(false);
    }
}

/// Staleness-bounded read-through cache over a [`SettingsStore`].
///
/// Cloning is cheap and clones share the same snapshot.
#[derive(Clone)]
pub struct LocalCache {
    inner: Arc<CacheInner>,
}

impl LocalCache {
    pub fn new(
        store: Arc<dyn SettingsStore>,
        namespace: Option<String>,
        options: CacheOptions,
    ) -> Self {
        let (refreshing_tx, _) = watch::channel(false);
        let state = RefreshState {
            last_refreshed_at: None,
            next_check_at: Instant::now() + options.refresh_interval,
            retry_load_at: None,
            refreshing: false,
            refresh_interval: options.refresh_interval,
            epoch: 0,
        };
        Self {
            inner: Arc::new(CacheInner {
                store,
                namespace,
                options,
                snapshot: ArcSwapOption::empty(),
                generation: AtomicU64::new(0),
                state: Mutex::new(state),
                refreshing_tx,
                last_updated: Mutex::new(None),
            }),
        }
    }

    /// Value for `key`, or `None` when absent, blank, or temporarily
    /// unavailable while a load is in flight.
    pub async fn get(&self, key: &str) -> Option<SettingValue> {
        self.ensure_up_to_date().await;

        let cached = {
            let snapshot = self.inner.snapshot.load();
            snapshot
                .as_deref()
                .and_then(|map| map.get(key))
                .map(|entry| entry.value().cloned())
        };
        if let Some(value) = cached {
            return value;
        }

        // Never block a reader on an in-flight load.
        if self.is_refreshing() {
            return None;
        }
        self.lookup(key).await
    }

    /// Load the cache if it was never loaded, or refresh it when the
    /// refresh interval has elapsed.
    pub async fn ensure_up_to_date(&self) {
        let generation = self.inner.generation.load(Ordering::Acquire);
        let (load_due, refresh_due) = {
            let state = self.inner.state.lock();
            let now = Instant::now();
            match state.last_refreshed_at {
                None => (state.retry_load_at.map_or(true, |at| now >= at), false),
                Some(_) => (false, now >= state.next_check_at),
            }
        };

        if load_due {
            self.start_load(Some(generation)).await;
        } else if refresh_due {
            self.refresh().await;
        }
    }

    /// Replace the snapshot with every active setting from the store.
    ///
    /// Runs on a background task when the store supports it; use
    /// [`LocalCache::wait_for_load`] to wait for completion.
    pub async fn load_settings(&self) {
        self.start_load(None).await;
    }

    /// Merge settings changed since the last refresh into the snapshot.
    ///
    /// No-op when the cache was never loaded, is already refreshing, or is
    /// empty.
    pub async fn refresh(&self) {
        let Some((guard, last_refreshed_at)) = self.begin_refresh() else {
            return;
        };
        if self.inner.store.supports_async_load() {
            let cache = self.clone();
            tokio::spawn(async move { cache.run_refresh(guard, last_refreshed_at).await });
        } else {
            self.run_refresh(guard, last_refreshed_at).await;
        }
    }

    /// Wait until no load or refresh is in flight
    pub async fn wait_for_load(&self) {
        let mut rx = self.inner.refreshing_tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|refreshing| !*refreshing).await;
    }

    /// Push a just-written setting into the snapshot so this process sees
    /// the change without waiting for the next refresh.
    pub fn update_setting(&self, setting: &Setting) {
        if setting.key().trim().is_empty() {
            return;
        }
        let entry = if setting.is_deleted() {
            CacheEntry::Absent
        } else {
            CacheEntry::Present(setting.value())
        };
        self.store_entry(setting.key().to_string(), entry, false);
    }

    /// Record `key` as absent, e.g. after its setting was renamed away
    pub fn mark_absent(&self, key: &str) {
        self.store_entry(key.to_string(), CacheEntry::Absent, false);
    }

    /// Drop every entry and all refresh metadata; the next read performs a
    /// full load.
    pub fn reset(&self) {
        let mut state = self.inner.state.lock();
        self.inner.snapshot.store(None);
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        state.last_refreshed_at = None;
        state.retry_load_at = None;
        state.next_check_at = Instant::now() + state.refresh_interval;
        state.epoch += 1;
        drop(state);
        self.clear_last_updated();
    }

    /// Most recent update time in the store, reused for
    /// `last_updated_ttl` when configured
    pub async fn last_updated_at(&self) -> anyhow::Result<Option<DateTime<Utc>>> {
        let ttl = self.inner.options.last_updated_ttl;
        if !ttl.is_zero() {
            if let Some((fetched_at, value)) = *self.inner.last_updated.lock() {
                if fetched_at.elapsed() < ttl {
                    return Ok(value);
                }
            }
        }

        let value = self
            .with_timeout(self.inner.store.last_updated_at(self.namespace()))
            .await?;
        if !ttl.is_zero() {
            *self.inner.last_updated.lock() = Some((Instant::now(), value));
        }
        Ok(value)
    }

    /// Forget the memoized `last_updated_at`
    pub fn clear_last_updated(&self) {
        *self.inner.last_updated.lock() = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.state.lock().last_refreshed_at.is_some()
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.state.lock().refreshing
    }

    pub fn last_refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.inner.state.lock().last_refreshed_at
    }

    /// Whether the snapshot knows `key` as an existing setting
    pub fn contains(&self, key: &str) -> bool {
        self.inner
            .snapshot
            .load()
            .as_deref()
            .and_then(|map| map.get(key))
            .is_some_and(|entry| matches!(entry, CacheEntry::Present(_)))
    }

    /// Number of entries in the snapshot, negative entries included
    pub fn len(&self) -> usize {
        self.inner.snapshot.load().as_deref().map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every cached key with a non-blank value
    pub fn to_map(&self) -> HashMap<String, SettingValue> {
        self.inner
            .snapshot
            .load()
            .as_deref()
            .map(|map| {
                map.iter()
                    .filter_map(|(key, entry)| entry.value().map(|v| (key.clone(), v.clone())))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn refresh_interval(&self) -> Duration {
        self.inner.state.lock().refresh_interval
    }

    /// Change the refresh interval; a pending check is brought forward if
    /// the new interval is shorter.
    pub fn set_refresh_interval(&self, interval: Duration) {
        let mut state = self.inner.state.lock();
        state.refresh_interval = interval;
        let candidate = Instant::now() + interval;
        if candidate < state.next_check_at {
            state.next_check_at = candidate;
        }
    }

    fn namespace(&self) -> Option<&str> {
        self.inner.namespace.as_deref()
    }

    async fn start_load(&self, expected_generation: Option<u64>) {
        let Some(guard) = self.begin_load(expected_generation) else {
            return;
        };
        if self.inner.store.supports_async_load() {
            let cache = self.clone();
            tokio::spawn(async move { cache.run_load(guard).await });
        } else {
            self.run_load(guard).await;
        }
    }

    fn begin_load(&self, expected_generation: Option<u64>) -> Option<RefreshGuard> {
        let mut state = self.inner.state.lock();
        if state.refreshing {
            return None;
        }
        if let Some(generation) = expected_generation {
            // Another caller finished a load after we decided to load.
            if self.inner.generation.load(Ordering::Acquire) != generation
                || state.last_refreshed_at.is_some()
            {
                return None;
            }
        }
        state.refreshing = true;
        state.next_check_at = Instant::now() + state.refresh_interval;
        self.inner.refreshing_tx.send_replace(true);
        Some(RefreshGuard {
            inner: self.inner.clone(),
        })
    }

    fn begin_refresh(&self) -> Option<(RefreshGuard, DateTime<Utc>)> {
        let mut state = self.inner.state.lock();
        let last_refreshed_at = state.last_refreshed_at?;
        if state.refreshing {
            return None;
        }
        state.next_check_at = Instant::now() + state.refresh_interval;
        if self.is_empty() {
            return None;
        }
        state.refreshing = true;
        self.inner.refreshing_tx.send_replace(true);
        Some((
            RefreshGuard {
                inner: self.inner.clone(),
            },
            last_refreshed_at,
        ))
    }

    async fn run_load(&self, _guard: RefreshGuard) {
        let started_at = Utc::now();
        let epoch = self.inner.state.lock().epoch;

        let records = match self
            .with_timeout(self.inner.store.fetch_active(self.namespace()))
            .await
        {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!(
                    namespace = ?self.inner.namespace,
                    error = %err,
                    "settings load failed; serving without cached data"
                );
                let mut state = self.inner.state.lock();
                state.retry_load_at = Some(Instant::now() + state.refresh_interval);
                return;
            }
        };

        let snapshot: Snapshot = records
            .iter()
            .filter(|record| !record.deleted)
            .map(|record| (record.key.clone(), CacheEntry::from_record(record)))
            .collect();
        let count = snapshot.len();

        {
            let mut state = self.inner.state.lock();
            if state.epoch != epoch {
                tracing::debug!("discarding settings load superseded by a reset");
                return;
            }
            self.inner.snapshot.store(Some(Arc::new(snapshot)));
            self.inner.generation.fetch_add(1, Ordering::AcqRel);
            state.last_refreshed_at = Some(started_at);
            state.retry_load_at = None;
        }

        tracing::debug!(
            namespace = ?self.inner.namespace,
            settings = count,
            elapsed_ms = (Utc::now() - started_at).num_milliseconds(),
            "settings cache loaded"
        );
    }

    async fn run_refresh(&self, _guard: RefreshGuard, last_refreshed_at: DateTime<Utc>) {
        let started_at = Utc::now();
        let epoch = self.inner.state.lock().epoch;
        let skew = chrono::Duration::from_std(self.inner.options.refresh_skew)
            .unwrap_or_else(|_| chrono::Duration::seconds(1));
        let since = last_refreshed_at - skew;

        match self.last_updated_at().await {
            Ok(Some(last_updated_at)) if last_updated_at < since => return,
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(error = %err, "settings refresh failed; keeping current snapshot");
                return;
            }
        }

        let records = match self
            .with_timeout(
                self.inner
                    .store
                    .fetch_updated_since(self.namespace(), since),
            )
            .await
        {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!(error = %err, "settings refresh failed; keeping current snapshot");
                return;
            }
        };

        let changed = records.len();
        {
            let mut state = self.inner.state.lock();
            if state.epoch != epoch {
                return;
            }
            let mut snapshot = self
                .inner
                .snapshot
                .load_full()
                .map(|current| (*current).clone())
                .unwrap_or_default();
            for record in &records {
                snapshot.insert(record.key.clone(), CacheEntry::from_record(record));
            }
            self.inner.snapshot.store(Some(Arc::new(snapshot)));
            self.inner.generation.fetch_add(1, Ordering::AcqRel);
            state.last_refreshed_at = Some(started_at);
        }

        tracing::debug!(
            namespace = ?self.inner.namespace,
            changed,
            "settings cache refreshed"
        );
    }

    /// Point lookup for a key missing from the snapshot
    async fn lookup(&self, key: &str) -> Option<SettingValue> {
        let record = match self
            .with_timeout(self.inner.store.find_by_key(self.namespace(), key))
            .await
        {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(key, error = %err, "settings lookup failed");
                return None;
            }
        };

        let entry = record
            .as_ref()
            .map_or(CacheEntry::Absent, CacheEntry::from_record);
        let value = entry.value().cloned();
        let bounded = matches!(entry, CacheEntry::Absent);
        self.store_entry(key.to_string(), entry, bounded);
        value
    }

    /// Copy-on-write insert of one entry. With `bounded`, the entry is
    /// dropped once the snapshot reaches the negative cache ceiling.
    fn store_entry(&self, key: String, entry: CacheEntry, bounded: bool) {
        let _state = self.inner.state.lock();
        let Some(current) = self.inner.snapshot.load_full() else {
            return;
        };
        if bounded && current.len() >= self.inner.options.negative_cache_ceiling {
            return;
        }
        let mut next = (*current).clone();
        next.insert(key, entry);
        self.inner.snapshot.store(Some(Arc::new(next)));
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
    }

    async fn with_timeout<T>(
        &self,
        operation: impl Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        let timeout = self.inner.options.store_timeout;
        match tokio::time::timeout(timeout, operation).await {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!(
                "settings store did not respond within {:?}",
                timeout
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::ValueType;
    use crate::infra::storage::InMemoryStore;

    fn record(value_type: ValueType, raw: Option<&str>, deleted: bool) -> SettingRecord {
        let now = Utc::now();
        SettingRecord {
            key: "k".to_string(),
            value_type,
            raw_value: raw.map(str::to_string),
            description: None,
            deleted,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_entry_from_record() {
        assert_eq!(
            CacheEntry::from_record(&record(ValueType::Integer, Some("7"), false)),
            CacheEntry::Present(Some(SettingValue::Integer(7)))
        );
        assert_eq!(
            CacheEntry::from_record(&record(ValueType::Integer, Some("7"), true)),
            CacheEntry::Absent
        );
        assert_eq!(
            CacheEntry::from_record(&record(ValueType::String, None, false)),
            CacheEntry::Present(None)
        );
    }

    #[tokio::test]
    async fn test_direct_updates_wait_for_first_load() {
        let cache = LocalCache::new(Arc::new(InMemoryStore::new()), None, CacheOptions::default());
        cache.mark_absent("gone");
        assert_eq!(cache.len(), 0);

        cache.load_settings().await;
        assert!(cache.is_loaded());
        assert!(cache.is_empty());

        // Loaded but empty: nothing to refresh
        cache.refresh().await;
        assert!(!cache.is_refreshing());

        let mut setting = Setting::new("fresh");
        setting.set_raw_value(Some("on".to_string()));
        cache.update_setting(&setting);
        cache.mark_absent("gone");
        assert!(cache.contains("fresh"));
        assert!(!cache.contains("gone"));
        assert_eq!(cache.len(), 2);
    }
}
