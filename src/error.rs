// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use crate::services::map_session::MapSessionError;
use crate::services::pipeline::IngestError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Not permitted for this role")]
    Forbidden,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("No valid geometry")]
    NoValidGeometry,

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Upload superseded by a newer file")]
    Superseded,

    #[error("Field registration failed: {0}")]
    RegistrationFailed(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::UnsupportedFormat { .. } => AppError::UnsupportedFormat(err.to_string()),
            IngestError::NoValidGeometry => AppError::NoValidGeometry,
            IngestError::MalformedInput(msg) => AppError::MalformedInput(msg),
            IngestError::UploadRead(msg) => AppError::BadRequest(msg),
            IngestError::TooLarge { .. } => AppError::PayloadTooLarge(err.to_string()),
            IngestError::Superseded => AppError::Superseded,
        }
    }
}

impl From<MapSessionError> for AppError {
    fn from(err: MapSessionError) -> Self {
        AppError::NotFound(err.to_string())
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::UnsupportedFormat(msg) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "unsupported_format",
                Some(msg.clone()),
            ),
            AppError::NoValidGeometry => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "no_valid_geometry",
                Some("The file contained no features with a geometry".to_string()),
            ),
            AppError::MalformedInput(msg) => {
                (StatusCode::BAD_REQUEST, "malformed_input", Some(msg.clone()))
            }
            AppError::PayloadTooLarge(msg) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                Some(msg.clone()),
            ),
            AppError::Superseded => (StatusCode::CONFLICT, "superseded", None),
            AppError::RegistrationFailed(msg) => (
                StatusCode::BAD_GATEWAY,
                "registration_failed",
                Some(msg.clone()),
            ),
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
