//! Contract error types for the dynamic settings service
//!
//! These errors are transport-agnostic and used for inter-module communication.

use std::collections::BTreeMap;
use thiserror::Error;

/// Dynamic settings domain errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    /// One or more settings failed validation; full messages keyed by setting key
    #[error("Validation failed: {}", format_errors(.errors))]
    Validation {
        errors: BTreeMap<String, Vec<String>>,
    },

    /// A change request named a field that has no setter
    #[error("Unknown attribute: {name}")]
    UnknownAttribute { name: String },

    /// Setting does not exist or is deleted
    #[error("Setting not found: {key}")]
    NotFound { key: String },

    /// The storage adapter could not be reached or rejected the operation
    #[error("Settings storage unavailable: {message}")]
    StorageUnavailable { message: String },

    /// Internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl SettingsError {
    pub(crate) fn storage(error: impl std::fmt::Display) -> Self {
        Self::StorageUnavailable {
            message: error.to_string(),
        }
    }
}

fn format_errors(errors: &BTreeMap<String, Vec<String>>) -> String {
    errors
        .iter()
        .map(|(key, messages)| format!("{}: {}", key, messages.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}
