//! Administrative Routes
//!
//! - GET /api/v1/files - List indexed files
//! - POST /api/v1/files - Index one file
//! - DELETE /api/v1/files?path=... - Forget a file
//! - POST /api/v1/files/scan - Index every waveform file below a directory
//! - GET /api/v1/mappings - List mappings
//! - POST /api/v1/mappings - Create a mapping
//! - DELETE /api/v1/mappings/:id - Delete a mapping
//! - GET /api/v1/restrictions - List restrictions
//! - POST /api/v1/restrictions - Create or extend a restriction
//! - DELETE /api/v1/restrictions/:id - Delete a restriction
//! - GET /api/v1/stats - Engine statistics

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::api::dto::{
    CreateMappingRequest, CreateRestrictionRequest, FileListResponse, FileResponse,
    IndexFileResponse, MappingListResponse, MappingResponse, PathRequest, RestrictionListResponse,
    ScanResponse,
};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::waveform::{
    format_timestamp, parse_timestamp, ChannelIdentity, EngineStats, Mapping, Restriction,
    Timestamp,
};

// ==================== Files ====================

/// GET /api/v1/files
pub async fn list_files(State(state): State<Arc<AppState>>) -> ApiResult<Json<FileListResponse>> {
    let files: Vec<FileResponse> = state
        .engine
        .files()
        .await?
        .into_iter()
        .map(|f| FileResponse {
            id: f.id,
            path: f.path.to_string_lossy().to_string(),
            size: f.size,
            segments: f.segment_count as usize,
            indexed_at: format_timestamp(f.indexed_at),
        })
        .collect();

    Ok(Json(FileListResponse {
        total: files.len(),
        files,
    }))
}

/// POST /api/v1/files
pub async fn index_file(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PathRequest>,
) -> ApiResult<(StatusCode, Json<IndexFileResponse>)> {
    let segments = state.engine.index_file(&req.path).await?;

    Ok((
        StatusCode::CREATED,
        Json(IndexFileResponse {
            path: req.path,
            segments: segments.len(),
        }),
    ))
}

/// POST /api/v1/files/scan
pub async fn scan_directory(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PathRequest>,
) -> ApiResult<Json<ScanResponse>> {
    let files = state.engine.index_directory(&req.path).await?;
    Ok(Json(ScanResponse { path: req.path, files }))
}

/// DELETE /api/v1/files?path=...
pub async fn remove_file(
    State(state): State<Arc<AppState>>,
    Query(req): Query<PathRequest>,
) -> ApiResult<StatusCode> {
    if state.engine.remove_file(&req.path).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("File {} is not indexed", req.path)))
    }
}

// ==================== Mappings ====================

/// GET /api/v1/mappings
pub async fn list_mappings(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<MappingListResponse>> {
    let mappings: Vec<MappingResponse> = state
        .engine
        .mappings()
        .await?
        .iter()
        .map(MappingResponse::from)
        .collect();

    Ok(Json(MappingListResponse {
        total: mappings.len(),
        mappings,
    }))
}

/// POST /api/v1/mappings
///
/// Overlapping validity for the same source answers 409.
pub async fn create_mapping(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateMappingRequest>,
) -> ApiResult<(StatusCode, Json<MappingResponse>)> {
    let source = parse_identity("source", &req.source)?;
    let target = parse_identity("target", &req.target)?;
    let start = parse_time("start", &req.start)?;
    let end = req.end.as_deref().map(|e| parse_time("end", e)).transpose()?;

    let stored = state
        .engine
        .add_mapping(Mapping::new(source, target, start, end))
        .await?;

    Ok((StatusCode::CREATED, Json(MappingResponse::from(&stored))))
}

/// DELETE /api/v1/mappings/:id
pub async fn delete_mapping(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if state.engine.remove_mapping(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Mapping with id {} not found", id)))
    }
}

// ==================== Restrictions ====================

/// GET /api/v1/restrictions
pub async fn list_restrictions(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<RestrictionListResponse>> {
    let restrictions = state.engine.restrictions().await?;
    Ok(Json(RestrictionListResponse {
        total: restrictions.len(),
        restrictions,
    }))
}

/// POST /api/v1/restrictions
pub async fn create_restriction(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateRestrictionRequest>,
) -> ApiResult<(StatusCode, Json<Restriction>)> {
    let users: BTreeSet<String> = req.users.into_iter().collect();
    let stored = state
        .engine
        .add_restriction(&req.network, &req.station, users)
        .await?;

    Ok((StatusCode::CREATED, Json(stored)))
}

/// DELETE /api/v1/restrictions/:id
pub async fn delete_restriction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if state.engine.remove_restriction(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Restriction with id {} not found", id)))
    }
}

// ==================== Stats ====================

/// GET /api/v1/stats
pub async fn stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<EngineStats>> {
    Ok(Json(state.engine.stats().await?))
}

fn parse_identity(field: &str, value: &str) -> ApiResult<ChannelIdentity> {
    value
        .parse()
        .map_err(|e| ApiError::Validation(format!("Invalid {} identity '{}': {}", field, value, e)))
}

fn parse_time(field: &str, value: &str) -> ApiResult<Timestamp> {
    parse_timestamp(value)
        .ok_or_else(|| ApiError::Validation(format!("Invalid {} time '{}'", field, value)))
}
