//! HTTP error mapping to RFC-9457 Problem Details

use crate::contract::SettingsError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// RFC-9457 Problem Details for HTTP API errors
#[derive(Debug, Serialize)]
pub struct Problem {
    /// A URI reference that identifies the problem type
    #[serde(rename = "type")]
    pub type_uri: String,

    /// A short, human-readable summary of the problem type
    pub title: String,

    /// The HTTP status code
    pub status: u16,

    /// A human-readable explanation specific to this occurrence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Problem {
    /// Create a new Problem Details response
    pub fn new(status: StatusCode, title: impl Into<String>) -> Self {
        Self {
            type_uri: format!("https://httpstatuses.io/{}", status.as_u16()),
            title: title.into(),
            status: status.as_u16(),
            detail: None,
        }
    }

    /// Add detail message
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl IntoResponse for Problem {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// Map domain errors to HTTP Problem Details
pub fn map_domain_error(error: SettingsError) -> Problem {
    match error {
        SettingsError::NotFound { key } => Problem::new(StatusCode::NOT_FOUND, "Setting Not Found")
            .with_detail(format!("Setting '{}' was not found", key)),

        err @ SettingsError::Validation { .. } => {
            Problem::new(StatusCode::UNPROCESSABLE_ENTITY, "Validation Error")
                .with_detail(err.to_string())
        }

        SettingsError::UnknownAttribute { name } => {
            Problem::new(StatusCode::BAD_REQUEST, "Unknown Attribute")
                .with_detail(format!("Settings have no attribute '{}'", name))
        }

        SettingsError::StorageUnavailable { message } => {
            tracing::warn!(error = %message, "settings storage unavailable");
            Problem::new(StatusCode::SERVICE_UNAVAILABLE, "Storage Unavailable")
                .with_detail("Settings storage is temporarily unavailable")
        }

        SettingsError::Internal { message } => {
            tracing::error!(error = %message, "internal settings error");
            Problem::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
                .with_detail("An unexpected error occurred")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (
                SettingsError::NotFound { key: "a".into() },
                StatusCode::NOT_FOUND,
            ),
            (
                SettingsError::UnknownAttribute { name: "x".into() },
                StatusCode::BAD_REQUEST,
            ),
            (
                SettingsError::StorageUnavailable {
                    message: "down".into(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                SettingsError::Internal {
                    message: "boom".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(map_domain_error(error).status, status.as_u16());
        }
    }
}
