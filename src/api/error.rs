//! API Error Types
//!
//! Defines error types for the API layer and implements conversion
//! to HTTP responses with appropriate status codes.
//!
//! Admin endpoints answer with JSON error bodies (`ApiError`); the FDSN
//! dataselect endpoints answer with plain text (`FdsnError`) as FDSN
//! clients expect.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::documents::DocumentError;
use crate::query::QueryError;
use crate::waveform::WaveformError;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Waveform layer error
    #[error("Waveform error: {0}")]
    Waveform(#[from] WaveformError),

    /// Document registry error
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
    pub request_id: String,
}

/// Error details
#[derive(Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Waveform(e) => match e {
                WaveformError::MappingOverlap { .. } => (StatusCode::CONFLICT, "MAPPING_OVERLAP"),
                WaveformError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                e if e.is_configuration_error() => (StatusCode::BAD_REQUEST, "INVALID_CONFIGURATION"),
                WaveformError::InvalidRecord(_) => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_RECORD"),
                WaveformError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                    (StatusCode::NOT_FOUND, "FILE_NOT_FOUND")
                }
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            },
            ApiError::Document(e) => match e {
                DocumentError::UnknownType(_) => (StatusCode::NOT_FOUND, "UNKNOWN_DOCUMENT_TYPE"),
                _ => (StatusCode::BAD_REQUEST, "DOCUMENT_ERROR"),
            },
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let request_id = uuid::Uuid::new_v4().to_string();

        tracing::error!(
            request_id = %request_id,
            error_code = %code,
            error_message = %self,
            "API error occurred"
        );

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: self.to_string(),
            },
            request_id,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors of the FDSN endpoints, rendered as plain text
#[derive(Error, Debug)]
pub enum FdsnError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Authentication required.")]
    Unauthorized,

    #[error("{0}")]
    Internal(String),
}

impl From<QueryError> for FdsnError {
    fn from(err: QueryError) -> Self {
        if err.is_client_error() {
            FdsnError::BadRequest(err.to_string())
        } else {
            FdsnError::Internal(err.to_string())
        }
    }
}

impl IntoResponse for FdsnError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        match self {
            FdsnError::BadRequest(_) => {
                tracing::debug!(error_message = %message, "Rejected dataselect request");
                (
                    StatusCode::BAD_REQUEST,
                    [(header::CONTENT_TYPE, "text/plain")],
                    message,
                )
                    .into_response()
            }
            FdsnError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                [
                    (header::CONTENT_TYPE, "text/plain"),
                    (header::WWW_AUTHENTICATE, "Basic realm=\"FDSN\""),
                ],
                message,
            )
                .into_response(),
            FdsnError::Internal(_) => {
                let request_id = uuid::Uuid::new_v4().to_string();
                tracing::error!(
                    request_id = %request_id,
                    error_message = %message,
                    "Dataselect query failed"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    [(header::CONTENT_TYPE, "text/plain")],
                    format!("Internal error (request {})", request_id),
                )
                    .into_response()
            }
        }
    }
}
