//! Entity to model mappers
//!
//! Conversions between SeaORM entities and contract models

use super::entity::{self, setting_history};
use crate::contract::{HistoryItem, SettingRecord, ValueType};
use sea_orm::ActiveValue::{NotSet, Set};

/// Column value for a namespace; the default partition is stored as ""
pub fn namespace_column(namespace: Option<&str>) -> String {
    namespace.unwrap_or_default().to_string()
}

// ===== Setting Conversions =====

impl TryFrom<entity::Model> for SettingRecord {
    type Error = anyhow::Error;

    fn try_from(entity: entity::Model) -> Result<Self, Self::Error> {
        let value_type = ValueType::parse(&entity.value_type).ok_or_else(|| {
            anyhow::anyhow!(
                "setting {} has unknown value type {:?}",
                entity.key,
                entity.value_type
            )
        })?;

        Ok(Self {
            key: entity.key,
            value_type,
            raw_value: entity.raw_value,
            description: entity.description,
            deleted: entity.deleted,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        })
    }
}

pub fn setting_active_model(namespace: &str, record: &SettingRecord) -> entity::ActiveModel {
    entity::ActiveModel {
        namespace: Set(namespace.to_string()),
        key: Set(record.key.clone()),
        value_type: Set(record.value_type.as_str().to_string()),
        raw_value: Set(record.raw_value.clone()),
        description: Set(record.description.clone()),
        deleted: Set(record.deleted),
        created_at: Set(record.created_at),
        updated_at: Set(record.updated_at),
    }
}

// ===== History Conversions =====

impl From<setting_history::Model> for HistoryItem {
    fn from(entity: setting_history::Model) -> Self {
        Self {
            key: entity.key,
            value: entity.value,
            deleted: entity.deleted,
            changed_by: entity.changed_by,
            created_at: entity.created_at,
        }
    }
}

pub fn history_active_model(namespace: &str, item: &HistoryItem) -> setting_history::ActiveModel {
    setting_history::ActiveModel {
        id: NotSet,
        namespace: Set(namespace.to_string()),
        key: Set(item.key.clone()),
        value: Set(item.value.clone()),
        deleted: Set(item.deleted),
        changed_by: Set(item.changed_by.clone()),
        created_at: Set(item.created_at),
    }
}

/// Convert a batch of entities, failing on the first invalid row
pub fn records(models: Vec<entity::Model>) -> anyhow::Result<Vec<SettingRecord>> {
    models.into_iter().map(SettingRecord::try_from).collect()
}
