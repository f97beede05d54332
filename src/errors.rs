//! # Error Handling Module
//!
//! ## Purpose
//! Centralized error handling for the caselaw access layer, covering filter
//! validation, citation lookup misses, and storage failures.
//!
//! ## Input/Output Specification
//! - **Input**: Error conditions from validation, resolution, and storage
//! - **Output**: Structured error types plus HTTP responses for the API
//! - **Error Categories**: Validation, NotFound, Configuration, Storage
//!
//! Redirects (non-canonical citation slugs, bot-verification forwarding) are
//! first-class control-flow outcomes of the resolver, not errors, and never
//! appear here. Session-lock degradation is likewise absorbed by the session
//! store and never surfaces to callers.

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use thiserror::Error;

/// Result type used throughout the application
pub type Result<T> = std::result::Result<T, AccessError>;

/// Error types for the caselaw access layer
#[derive(Debug, Error)]
pub enum AccessError {
    /// Malformed filter input; fails the request fast with a per-field message
    #[error("Validation failed for field '{field}': {message}")]
    Validation { field: String, message: String },

    /// Citation resolved to nothing and a case id lookup found no record
    #[error("Citation \"{cite}\" was not found")]
    NotFound { cite: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Internal system errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AccessError {
    /// Build a validation error naming the offending field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AccessError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Get error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            AccessError::Validation { .. } => "validation",
            AccessError::NotFound { .. } => "not_found",
            AccessError::Config { .. } => "configuration",
            AccessError::Database(_) | AccessError::Serialization(_) => "storage",
            AccessError::Internal { .. } => "internal",
        }
    }
}

impl From<std::io::Error> for AccessError {
    fn from(err: std::io::Error) -> Self {
        AccessError::Internal {
            message: format!("IO error: {}", err),
        }
    }
}

impl From<toml::de::Error> for AccessError {
    fn from(err: toml::de::Error) -> Self {
        AccessError::Config {
            message: format!("TOML error: {}", err),
        }
    }
}

impl actix_web::ResponseError for AccessError {
    fn status_code(&self) -> StatusCode {
        match self {
            AccessError::Validation { .. } => StatusCode::BAD_REQUEST,
            AccessError::NotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            // validation errors report {field: message}
            AccessError::Validation { field, message } => {
                let mut body = serde_json::Map::new();
                body.insert(field.clone(), serde_json::Value::String(message.clone()));
                HttpResponse::BadRequest().json(body)
            }
            AccessError::NotFound { cite } => HttpResponse::NotFound().json(serde_json::json!({
                "error": "not_found",
                "message": format!("Citation \"{}\" was not found", cite),
            })),
            other => {
                tracing::error!(category = other.category(), "request failed: {}", other);
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "server_error",
                }))
            }
        }
    }
}
