//! Health Routes
//!
//! Health check endpoints for monitoring and Kubernetes probes.
//!
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health/ready - Readiness probe (ready to serve traffic)
//! - GET /health - Full health status

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::HealthResponse;
use crate::api::state::AppState;

/// GET /health/live
///
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Returns 200 once the catalog answers.
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    if check_catalog_health(&state).await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /health
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let catalog_ok = check_catalog_health(&state).await;
    let generation = state.engine.snapshot().await.generation();

    Json(HealthResponse {
        status: if catalog_ok { "healthy" } else { "unhealthy" }.to_string(),
        catalog: if catalog_ok { "ok" } else { "error" }.to_string(),
        generation,
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn check_catalog_health(state: &AppState) -> bool {
    match state.engine.files().await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!("Catalog health check failed: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_liveness() {
        let status = liveness().await;
        assert_eq!(status, StatusCode::OK);
    }
}
