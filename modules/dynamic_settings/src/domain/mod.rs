//! Domain layer - business logic and services

pub mod cache;
pub mod coerce;
pub mod repository;
pub mod service;
pub mod setting;
pub mod validation;

pub use cache::{CacheEntry, CacheOptions, LocalCache};
pub use repository::{PendingWrite, SettingsStore};
pub use service::{BulkUpdate, Service};
pub use setting::{Changes, FieldValue, Setting, SettingField};
