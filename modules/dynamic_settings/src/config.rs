//! Configuration for the dynamic settings module

use crate::domain::CacheOptions;
use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix; `__` separates nested keys
pub const ENV_PREFIX: &str = "DYNAMIC_SETTINGS_";

/// Dynamic settings configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Partition used for every operation of this service
    #[serde(default)]
    pub namespace: Option<String>,

    /// Cache staleness window
    #[serde(default = "default_refresh_interval", with = "humantime_serde")]
    pub refresh_interval: Duration,

    /// Drift buffer subtracted from the last refresh time
    #[serde(default = "default_refresh_skew", with = "humantime_serde")]
    pub refresh_skew: Duration,

    /// Deadline for each store round-trip made by the cache
    #[serde(default = "default_store_timeout", with = "humantime_serde")]
    pub store_timeout: Duration,

    /// Cache size past which misses are no longer cached
    #[serde(default = "default_negative_cache_ceiling")]
    pub negative_cache_ceiling: usize,

    /// Memo lifetime for `last_updated_at`; zero disables the memo
    #[serde(default, with = "humantime_serde")]
    pub last_updated_cache_ttl: Duration,

    #[serde(default)]
    pub storage: StorageConfig,
}

/// Storage backend selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Process-local store, lost on restart
    #[default]
    Memory,
    /// SQL database reached through sea-orm (`postgres://…`, `sqlite://…`)
    Database {
        url: String,
        #[serde(default)]
        max_connections: Option<u32>,
    },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: None,
            refresh_interval: default_refresh_interval(),
            refresh_skew: default_refresh_skew(),
            store_timeout: default_store_timeout(),
            negative_cache_ceiling: default_negative_cache_ceiling(),
            last_updated_cache_ttl: Duration::ZERO,
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from an optional YAML file overlaid with
    /// `DYNAMIC_SETTINGS_*` environment variables.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        Ok(config)
    }

    pub fn cache_options(&self) -> CacheOptions {
        CacheOptions {
            refresh_interval: self.refresh_interval,
            refresh_skew: self.refresh_skew,
            store_timeout: self.store_timeout,
            negative_cache_ceiling: self.negative_cache_ceiling,
            last_updated_ttl: self.last_updated_cache_ttl,
        }
    }
}

fn default_refresh_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_refresh_skew() -> Duration {
    Duration::from_secs(1)
}

fn default_store_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_negative_cache_ceiling() -> usize {
    100_000
}
