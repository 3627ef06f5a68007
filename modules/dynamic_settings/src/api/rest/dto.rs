//! REST DTOs with serde derives for HTTP API

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

// ===== Setting DTOs =====

/// Setting response DTO
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SettingDto {
    /// Setting key
    #[schema(example = "timeout_ms")]
    pub key: String,

    /// Coerced value; null when blank or deleted
    pub value: serde_json::Value,

    /// Value type name
    #[schema(example = "integer")]
    pub value_type: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Present (and true) only for deleted settings
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,

    /// Creation timestamp, ISO-8601 UTC
    pub created_at: Option<String>,

    /// Last update timestamp, ISO-8601 UTC
    pub updated_at: Option<String>,
}

/// Settings list response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SettingsListResponse {
    pub items: Vec<SettingDto>,
    pub total: usize,
}

/// Bulk update request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateSettingsRequest {
    /// Change objects: `key` plus any of `value`, `value_type`,
    /// `description`, `deleted`, `key_was`
    pub settings: Vec<serde_json::Value>,

    /// Recorded in the history of every changed setting
    #[serde(default)]
    pub changed_by: Option<String>,
}

/// Bulk update response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateSettingsResponse {
    pub success: bool,

    /// Full error messages keyed by setting key
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, Vec<String>>,
}

// ===== History DTOs =====

/// History entry DTO
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HistoryItemDto {
    pub key: String,
    pub value: Option<String>,
    pub deleted: bool,
    pub changed_by: Option<String>,
    pub created_at: String,
}

/// Offset/limit cursor echoed back for paging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PageParamsDto {
    pub key: String,
    pub offset: u64,
    pub limit: u64,
}

/// One page of history for a setting
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HistoryPageDto {
    pub setting: SettingDto,
    pub histories: Vec<HistoryItemDto>,
    pub previous_page_params: Option<PageParamsDto>,
    pub next_page_params: Option<PageParamsDto>,
}

// ===== Polling DTOs =====

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LastUpdatedAtDto {
    /// Most recent update, ISO-8601 UTC; null when there are no settings
    pub last_updated_at: Option<String>,
}
