//! Document Type Routes
//!
//! - GET /api/v1/document_types - Registered types with their permissions
//! - POST /api/v1/document_types/:name/validate - Run a type's validators on the body

use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::api::dto::ValidationResponse;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::documents::{DocumentError, DocumentTypeInfo};

/// GET /api/v1/document_types
pub async fn list_document_types(State(state): State<Arc<AppState>>) -> Json<Vec<DocumentTypeInfo>> {
    Json(state.documents.describe())
}

/// POST /api/v1/document_types/:name/validate
pub async fn validate_document(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    body: Bytes,
) -> ApiResult<Json<ValidationResponse>> {
    match state.documents.validate(&name, &body) {
        Ok(()) => Ok(Json(ValidationResponse {
            document_type: name,
            valid: true,
            reason: None,
        })),
        Err(e @ DocumentError::ValidationFailed { .. }) => Ok(Json(ValidationResponse {
            document_type: name,
            valid: false,
            reason: Some(e.to_string()),
        })),
        Err(e) => Err(ApiError::from(e)),
    }
}
