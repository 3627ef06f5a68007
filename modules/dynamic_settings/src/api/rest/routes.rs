//! Route registration and OpenAPI schema collection

use super::{dto::*, error::Problem, handlers};
use crate::domain::Service;
use axum::{
    extract::Query,
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use std::sync::Arc;
use utoipa::OpenApi;

/// Schemas of every REST payload
#[derive(OpenApi)]
#[openapi(components(schemas(
    SettingDto,
    SettingsListResponse,
    UpdateSettingsRequest,
    UpdateSettingsResponse,
    HistoryItemDto,
    PageParamsDto,
    HistoryPageDto,
    LastUpdatedAtDto
)))]
pub struct ApiDoc;

/// Register all REST routes on `router`
pub fn register_routes(router: Router, service: Arc<Service>) -> Router {
    router
        .route(
            "/settings",
            get(list_settings_handler).post(update_settings_handler),
        )
        .route("/setting", get(get_setting_handler))
        .route("/setting/history", get(setting_history_handler))
        .route("/last_updated_at", get(last_updated_at_handler))
        .route("/updated_since", get(updated_since_handler))
        // Add service as extension for handlers
        .layer(Extension(service))
}

// ===== Handler wrappers that extract service from Extension =====

async fn list_settings_handler(
    Extension(service): Extension<Arc<Service>>,
) -> Result<Json<SettingsListResponse>, Problem> {
    handlers::list_settings(service).await
}

async fn get_setting_handler(
    Extension(service): Extension<Arc<Service>>,
    query: Query<handlers::KeyQuery>,
) -> Result<Json<SettingDto>, Problem> {
    handlers::get_setting(service, query).await
}

async fn update_settings_handler(
    Extension(service): Extension<Arc<Service>>,
    json: Json<UpdateSettingsRequest>,
) -> Result<(StatusCode, Json<UpdateSettingsResponse>), Problem> {
    handlers::update_settings(service, json).await
}

async fn setting_history_handler(
    Extension(service): Extension<Arc<Service>>,
    query: Query<handlers::HistoryQuery>,
) -> Result<Json<HistoryPageDto>, Problem> {
    handlers::setting_history(service, query).await
}

async fn last_updated_at_handler(
    Extension(service): Extension<Arc<Service>>,
) -> Result<Json<LastUpdatedAtDto>, Problem> {
    handlers::last_updated_at(service).await
}

async fn updated_since_handler(
    Extension(service): Extension<Arc<Service>>,
    query: Query<handlers::UpdatedSinceQuery>,
) -> Result<Json<SettingsListResponse>, Problem> {
    handlers::updated_since(service, query).await
}
