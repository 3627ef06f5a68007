//! Module composition root: builds the store, cache, service and clients

use crate::api::native::NativeClient;
use crate::config::{Config, StorageConfig};
use crate::contract::SettingsApi;
use crate::domain::{LocalCache, Service, SettingsStore};
use crate::infra::storage::{migrations::Migrator, InMemoryStore, SeaOrmSettingsStore};
use anyhow::Result;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;

/// Dynamic settings module
pub struct SettingsServiceModule {
    config: Config,
    service: Arc<Service>,
}

impl SettingsServiceModule {
    /// Build the module from configuration, connecting to and migrating the
    /// database when one is configured.
    pub async fn init(config: Config) -> Result<Self> {
        let store: Arc<dyn SettingsStore> = match &config.storage {
            StorageConfig::Memory => Arc::new(InMemoryStore::new()),
            StorageConfig::Database {
                url,
                max_connections,
            } => {
                let db = connect(url, *max_connections).await?;
                Migrator::up(&db, None).await?;
                tracing::info!("Dynamic settings migrations completed");
                Arc::new(SeaOrmSettingsStore::new(Arc::new(db)))
            }
        };
        Ok(Self::with_store(config, store))
    }

    /// Build the module over an existing store
    pub fn with_store(config: Config, store: Arc<dyn SettingsStore>) -> Self {
        let cache = LocalCache::new(store.clone(), config.namespace.clone(), config.cache_options());
        let service = Arc::new(Service::new(store, cache, config.namespace.clone()));
        tracing::info!(
            namespace = ?config.namespace,
            refresh_interval = ?config.refresh_interval,
            "Dynamic settings initialized"
        );
        Self { config, service }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn service(&self) -> Arc<Service> {
        self.service.clone()
    }

    /// In-process client
    pub fn client(&self) -> Arc<dyn SettingsApi> {
        Arc::new(NativeClient::new(self.service.clone()))
    }

    /// REST routes bound to this module's service
    pub fn router(&self) -> axum::Router {
        crate::api::rest::routes::register_routes(axum::Router::new(), self.service.clone())
    }

    /// Load the cache and wait until it is populated
    pub async fn warm_up(&self) {
        let cache = self.service.cache();
        cache.load_settings().await;
        cache.wait_for_load().await;
    }
}

async fn connect(url: &str, max_connections: Option<u32>) -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(url.to_string());
    match max_connections {
        Some(max) => {
            options.max_connections(max);
        }
        // Every connection to an in-memory SQLite database sees its own
        // empty database.
        None if url.contains(":memory:") => {
            options.max_connections(1).min_connections(1);
        }
        None => {}
    }
    options.sqlx_logging(false);
    Ok(Database::connect(options).await?)
}
