//! Mapper implementations for converting between DTOs and domain/contract models

use super::dto::*;
use crate::contract::{self, format_datetime};
use crate::domain::Setting;

// ===== Setting conversions =====

impl From<&Setting> for SettingDto {
    fn from(setting: &Setting) -> Self {
        Self {
            key: setting.key().to_string(),
            value: setting
                .value()
                .map(|value| value.to_json())
                .unwrap_or(serde_json::Value::Null),
            value_type: setting.value_type().as_str().to_string(),
            description: setting.description().map(str::to_string),
            deleted: setting.is_deleted(),
            created_at: setting.created_at().as_ref().map(format_datetime),
            updated_at: setting.updated_at().as_ref().map(format_datetime),
        }
    }
}

impl From<contract::SettingRecord> for SettingDto {
    fn from(record: contract::SettingRecord) -> Self {
        (&Setting::from_record(record)).into()
    }
}

// ===== History conversions =====

impl From<contract::HistoryItem> for HistoryItemDto {
    fn from(item: contract::HistoryItem) -> Self {
        Self {
            key: item.key,
            value: item.value,
            deleted: item.deleted,
            changed_by: item.changed_by,
            created_at: format_datetime(&item.created_at),
        }
    }
}

impl From<contract::PageParams> for PageParamsDto {
    fn from(params: contract::PageParams) -> Self {
        Self {
            key: params.key,
            offset: params.offset,
            limit: params.limit,
        }
    }
}

impl From<contract::HistoryPage> for HistoryPageDto {
    fn from(page: contract::HistoryPage) -> Self {
        Self {
            setting: page.setting.into(),
            histories: page.histories.into_iter().map(Into::into).collect(),
            previous_page_params: page.previous_page_params.map(Into::into),
            next_page_params: page.next_page_params.map(Into::into),
        }
    }
}

impl SettingsListResponse {
    pub fn from_settings(settings: &[Setting]) -> Self {
        let items: Vec<SettingDto> = settings.iter().map(SettingDto::from).collect();
        let total = items.len();
        Self { items, total }
    }
}
