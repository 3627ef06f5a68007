//! Dynamic Settings Module
//!
//! Typed runtime configuration editable while the application runs. Reads go
//! through a staleness-bounded local cache; writes go through an
//! all-or-nothing bulk update that records history for every change.

// Public exports
pub mod contract;
pub use contract::{
    client::SettingsApi, error::SettingsError, HistoryItem, HistoryPage, PageParams,
    SettingChange, SettingRecord, SettingValue, UpdateOutcome, ValueType,
};

pub mod module;
pub use module::SettingsServiceModule;

pub mod config;
pub use config::{Config, StorageConfig};

pub mod domain;
pub use domain::{CacheOptions, LocalCache, Service, Setting, SettingsStore};

pub mod infra;
pub use infra::storage::{InMemoryStore, SeaOrmSettingsStore};

// Internal modules (hidden from public API)
#[doc(hidden)]
pub mod api;
