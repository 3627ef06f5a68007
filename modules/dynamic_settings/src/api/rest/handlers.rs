//! HTTP request handlers - thin layer that delegates to domain service

use super::{
    dto::*,
    error::{map_domain_error, Problem},
};
use crate::contract::{format_datetime, SettingChange};
use crate::domain::{coerce, Service};
use axum::{extract::Query, http::StatusCode, Json};
use serde::Deserialize;
use std::sync::Arc;

/// Page size used when a history request names none
pub const DEFAULT_HISTORY_LIMIT: u64 = 25;

// ===== Settings Handlers =====

/// List active settings sorted by key
pub async fn list_settings(service: Arc<Service>) -> Result<Json<SettingsListResponse>, Problem> {
    let settings = service.list().await.map_err(map_domain_error)?;
    Ok(Json(SettingsListResponse::from_settings(&settings)))
}

#[derive(Debug, Deserialize)]
pub struct KeyQuery {
    pub key: String,
}

/// Get one active setting
pub async fn get_setting(
    service: Arc<Service>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<SettingDto>, Problem> {
    let setting = service.find(&query.key).await.map_err(map_domain_error)?;
    Ok(Json((&setting).into()))
}

/// Apply a batch of changes; 422 with the error map when any is invalid
pub async fn update_settings(
    service: Arc<Service>,
    Json(req): Json<UpdateSettingsRequest>,
) -> Result<(StatusCode, Json<UpdateSettingsResponse>), Problem> {
    let changes = req
        .settings
        .iter()
        .map(SettingChange::from_json)
        .collect::<Result<Vec<_>, _>>()
        .map_err(map_domain_error)?;

    let result = service
        .update_settings(changes, req.changed_by.as_deref())
        .await
        .map_err(map_domain_error)?;

    let status = if result.all_valid {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    Ok((
        status,
        Json(UpdateSettingsResponse {
            success: result.all_valid,
            errors: result.errors,
        }),
    ))
}

// ===== History Handlers =====

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub key: String,
    pub limit: Option<u64>,
    pub offset: Option<i64>,
}

/// Paginated history of one setting, most recent first
pub async fn setting_history(
    service: Arc<Service>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryPageDto>, Problem> {
    let page = service
        .history_page(
            &query.key,
            query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT),
            query.offset.unwrap_or(0),
        )
        .await
        .map_err(map_domain_error)?;
    Ok(Json(page.into()))
}

// ===== Polling Handlers =====

pub async fn last_updated_at(service: Arc<Service>) -> Result<Json<LastUpdatedAtDto>, Problem> {
    let last_updated_at = service.last_updated_at().await.map_err(map_domain_error)?;
    Ok(Json(LastUpdatedAtDto {
        last_updated_at: last_updated_at.as_ref().map(format_datetime),
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpdatedSinceQuery {
    pub time: String,
}

/// Settings updated at or after `time`, deleted ones included
pub async fn updated_since(
    service: Arc<Service>,
    Query(query): Query<UpdatedSinceQuery>,
) -> Result<Json<SettingsListResponse>, Problem> {
    let since = coerce::datetime(&query.time).ok_or_else(|| {
        Problem::new(StatusCode::BAD_REQUEST, "Invalid Time")
            .with_detail(format!("'{}' is not a valid datetime", query.time))
    })?;
    let settings = service.updated_since(since).await.map_err(map_domain_error)?;
    Ok(Json(SettingsListResponse::from_settings(&settings)))
}
