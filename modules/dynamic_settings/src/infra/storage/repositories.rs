//! SeaORM settings store

use super::entity::{self, setting_history};
use super::mapper;
use crate::contract::{HistoryItem, SettingRecord};
use crate::domain::repository::{PendingWrite, SettingsStore};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    prelude::Expr, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, TransactionTrait,
};
use std::sync::Arc;

pub struct SeaOrmSettingsStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmSettingsStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SettingsStore for SeaOrmSettingsStore {
    async fn fetch_all(&self, namespace: Option<&str>) -> Result<Vec<SettingRecord>> {
        let results = entity::Entity::find()
            .filter(entity::Column::Namespace.eq(mapper::namespace_column(namespace)))
            .order_by_asc(entity::Column::Key)
            .all(&*self.db)
            .await?;

        mapper::records(results)
    }

    async fn fetch_active(&self, namespace: Option<&str>) -> Result<Vec<SettingRecord>> {
        let results = entity::Entity::find()
            .filter(entity::Column::Namespace.eq(mapper::namespace_column(namespace)))
            .filter(entity::Column::Deleted.eq(false))
            .order_by_asc(entity::Column::Key)
            .all(&*self.db)
            .await?;

        mapper::records(results)
    }

    async fn fetch_updated_since(
        &self,
        namespace: Option<&str>,
        since: DateTime<Utc>,
    ) -> Result<Vec<SettingRecord>> {
        let results = entity::Entity::find()
            .filter(entity::Column::Namespace.eq(mapper::namespace_column(namespace)))
            .filter(entity::Column::UpdatedAt.gte(since))
            .order_by_asc(entity::Column::UpdatedAt)
            .all(&*self.db)
            .await?;

        mapper::records(results)
    }

    async fn find_by_key(&self, namespace: Option<&str>, key: &str) -> Result<Option<SettingRecord>> {
        let result = entity::Entity::find_by_id((mapper::namespace_column(namespace), key.to_string()))
            .one(&*self.db)
            .await?;

        result.map(SettingRecord::try_from).transpose()
    }

    async fn last_updated_at(&self, namespace: Option<&str>) -> Result<Option<DateTime<Utc>>> {
        let latest = entity::Entity::find()
            .filter(entity::Column::Namespace.eq(mapper::namespace_column(namespace)))
            .order_by_desc(entity::Column::UpdatedAt)
            .limit(1)
            .one(&*self.db)
            .await?;

        Ok(latest.map(|model| model.updated_at))
    }

    async fn save_all(&self, namespace: Option<&str>, writes: Vec<PendingWrite>) -> Result<()> {
        let namespace = mapper::namespace_column(namespace);
        let txn = self.db.begin().await?;

        for write in &writes {
            let record = &write.record;
            let existing = entity::Entity::find_by_id((namespace.clone(), record.key.clone()))
                .one(&txn)
                .await?;

            let active = mapper::setting_active_model(&namespace, record);
            if existing.is_some() {
                entity::Entity::update(active).exec(&txn).await?;
            } else {
                entity::Entity::insert(active)
                    .exec_without_returning(&txn)
                    .await?;
            }

            if write.redact_history {
                setting_history::Entity::update_many()
                    .col_expr(
                        setting_history::Column::Value,
                        Expr::value(Option::<String>::None),
                    )
                    .filter(setting_history::Column::Namespace.eq(namespace.as_str()))
                    .filter(setting_history::Column::Key.eq(record.key.as_str()))
                    .exec(&txn)
                    .await?;
            }

            if let Some(history) = &write.history {
                setting_history::Entity::insert(mapper::history_active_model(&namespace, history))
                    .exec_without_returning(&txn)
                    .await?;
            }
        }

        // Dropping an uncommitted transaction rolls it back, so any `?` above
        // leaves the store untouched.
        txn.commit().await?;
        Ok(())
    }

    async fn history(
        &self,
        namespace: Option<&str>,
        key: &str,
        limit: Option<u64>,
        offset: u64,
    ) -> Result<Vec<HistoryItem>> {
        let mut query = setting_history::Entity::find()
            .filter(setting_history::Column::Namespace.eq(mapper::namespace_column(namespace)))
            .filter(setting_history::Column::Key.eq(key))
            .order_by_desc(setting_history::Column::CreatedAt)
            .order_by_desc(setting_history::Column::Id);

        // SQLite rejects OFFSET without LIMIT
        if limit.is_some() || offset > 0 {
            query = query
                .limit(limit.unwrap_or(i64::MAX as u64))
                .offset(offset);
        }

        let results = query.all(&*self.db).await?;
        Ok(results.into_iter().map(HistoryItem::from).collect())
    }

    fn supports_async_load(&self) -> bool {
        true
    }
}
