//! Seisvault HTTP API
//!
//! HTTP API layer for Seisvault, built with Axum.
//!
//! # Endpoints
//!
//! ## FDSN Dataselect
//! - `GET /fdsnws/dataselect/1/` - Service index
//! - `GET /fdsnws/dataselect/1/version` - Service version (`1.1.1`)
//! - `GET /fdsnws/dataselect/1/application.wadl` - WADL description
//! - `GET|POST /fdsnws/dataselect/1/query` - Anonymous waveform query
//! - `GET|POST /fdsnws/dataselect/1/queryauth` - Basic-auth waveform query
//!
//! ## Administration
//! - `GET|POST|DELETE /api/v1/files`, `POST /api/v1/files/scan`
//! - `GET|POST /api/v1/mappings`, `DELETE /api/v1/mappings/:id`
//! - `GET|POST /api/v1/restrictions`, `DELETE /api/v1/restrictions/:id`
//! - `GET /api/v1/stats`
//! - `GET /api/v1/document_types`, `POST /api/v1/document_types/:name/validate`
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! # Example
//!
//! ```rust,ignore
//! use seisvault::api::{serve, ApiConfig, AppState};
//! use seisvault::documents::PluginRegistry;
//! use seisvault::waveform::{EngineConfig, WaveformEngine};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Arc::new(WaveformEngine::new(EngineConfig::new("./data")).await?);
//!     let documents = Arc::new(PluginRegistry::new());
//!     let config = ApiConfig::default();
//!
//!     serve(AppState::new(engine, documents, config.clone()), &config).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod dto;
pub mod error;
pub mod routes;
pub mod state;
pub mod wadl;

pub use error::{ApiError, ApiResult, FdsnError};
pub use state::{ApiConfig, AppState};

use axum::{
    http::HeaderValue,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

const DATASELECT: &str = "/fdsnws/dataselect/1";

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let dataselect_routes = Router::new()
        .route(DATASELECT, get(routes::dataselect::redirect_index))
        .route(&format!("{}/", DATASELECT), get(routes::dataselect::index))
        .route(&format!("{}/version", DATASELECT), get(routes::dataselect::version))
        .route(&format!("{}/version/", DATASELECT), get(routes::dataselect::version))
        .route(
            &format!("{}/application.wadl", DATASELECT),
            get(routes::dataselect::application_wadl),
        )
        .route(
            &format!("{}/application.wadl/", DATASELECT),
            get(routes::dataselect::application_wadl),
        )
        .route(
            &format!("{}/query", DATASELECT),
            get(routes::dataselect::query_get).post(routes::dataselect::query_post),
        )
        .route(
            &format!("{}/queryauth", DATASELECT),
            get(routes::dataselect::queryauth_get).post(routes::dataselect::queryauth_post),
        );

    let api_routes = Router::new()
        // File routes
        .route("/files", get(routes::admin::list_files))
        .route("/files", post(routes::admin::index_file))
        .route("/files", delete(routes::admin::remove_file))
        .route("/files/scan", post(routes::admin::scan_directory))
        // Mapping routes
        .route("/mappings", get(routes::admin::list_mappings))
        .route("/mappings", post(routes::admin::create_mapping))
        .route("/mappings/:id", delete(routes::admin::delete_mapping))
        // Restriction routes
        .route("/restrictions", get(routes::admin::list_restrictions))
        .route("/restrictions", post(routes::admin::create_restriction))
        .route("/restrictions/:id", delete(routes::admin::delete_restriction))
        // Stats
        .route("/stats", get(routes::admin::stats))
        // Document types
        .route("/document_types", get(routes::documents::list_document_types))
        .route(
            "/document_types/:name/validate",
            post(routes::documents::validate_document),
        );

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    let cors = cors_layer(&state.config.cors_origins);
    let timeout = TimeoutLayer::new(Duration::from_secs(state.config.request_timeout_secs));
    let shared_state = Arc::new(state);

    Router::new()
        .merge(dataselect_routes)
        .nest("/api/v1", api_routes)
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(timeout)
        .layer(cors)
        .with_state(shared_state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Start the API server
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Seisvault API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Seisvault API shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthConfig, DocumentsConfig, UserCredentials};
    use crate::documents::PluginRegistry;
    use crate::waveform::{EngineConfig, WaveformEngine};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use tempfile::tempdir;
    use tower::util::ServiceExt;

    async fn create_test_app() -> (Router, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let engine = Arc::new(WaveformEngine::new(EngineConfig::new(dir.path())).await.unwrap());
        let documents = Arc::new(PluginRegistry::with_builtin(&DocumentsConfig::default()).unwrap());
        let auth = AuthConfig {
            users: vec![UserCredentials {
                username: "random".into(),
                password: "random".into(),
            }],
        };

        let state = AppState::new(engine, documents, ApiConfig::default()).with_auth(auth);
        (build_router(state), dir)
    }

    async fn get(app: Router, uri: &str) -> Response {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_live() {
        let (app, _dir) = create_test_app().await;
        let response = get(app, "/health/live").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_full() {
        let (app, _dir) = create_test_app().await;
        let response = get(app, "/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("\"catalog\":\"ok\""));
    }

    #[tokio::test]
    async fn test_version() {
        for uri in ["/fdsnws/dataselect/1/version", "/fdsnws/dataselect/1/version/"] {
            let (app, _dir) = create_test_app().await;
            let response = get(app, uri).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
            assert_eq!(body_text(response).await, "1.1.1");
        }
    }

    #[tokio::test]
    async fn test_wadl() {
        for uri in [
            "/fdsnws/dataselect/1/application.wadl",
            "/fdsnws/dataselect/1/application.wadl/",
        ] {
            let (app, _dir) = create_test_app().await;
            let response = get(app, uri).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                response.headers()[header::CONTENT_TYPE],
                "application/xml; charset=utf-8"
            );
            assert!(body_text(response).await.starts_with("<?xml"));
        }
    }

    #[tokio::test]
    async fn test_index() {
        let (app, _dir) = create_test_app().await;
        let response = get(app, "/fdsnws/dataselect/1").await;
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);

        let (app, _dir) = create_test_app().await;
        let response = get(app, "/fdsnws/dataselect/1/").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/html; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn test_query_validation_messages() {
        let cases = [
            ("", "Start time must be specified."),
            ("start=0", "Error parsing starttime: 0"),
            ("start=2012-01-01", "End time must be specified."),
            ("start=2012-01-01&end=0", "Error parsing endtime: 0"),
            ("start=2012-01-01&end=2012-01-01", "Start time must be before end time."),
            ("start=2012-01-02&end=2012-01-01", "Start time must be before end time."),
            (
                "start=2010-03-25T00:00:00&end=2010-03-26T00:00:00&net=",
                "Network must not be an empty string.",
            ),
            (
                "start=2010-03-25T00:00:00&end=2010-03-26T00:00:00&station=%20%20",
                "Station must not be an empty string.",
            ),
            (
                "start=2010-03-25T00:00:00&end=2010-03-26T00:00:00&cha=%20",
                "Channel must not be an empty string.",
            ),
            (
                "start=2010-03-25T00:00:00&end=2010-03-26T00:00:00&net=&sta=%20&cha=%20%20",
                "Network must not be an empty string.",
            ),
            ("start=2012-01-01&end=2012-01-02&nodata=500", "nodata must be 204 or 404."),
        ];

        for (params, message) in cases {
            let (app, _dir) = create_test_app().await;
            let response = get(app, &format!("/fdsnws/dataselect/1/query?{}", params)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", params);
            assert_eq!(body_text(response).await, message, "{}", params);
        }
    }

    #[tokio::test]
    async fn test_query_nodata() {
        let params = "start=2012-01-01&end=2012-01-02&net=GE&sta=APE&cha=EHE";

        let (app, _dir) = create_test_app().await;
        let response = get(app, &format!("/fdsnws/dataselect/1/query?{}", params)).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(!response.headers().contains_key(header::CONTENT_TYPE));
        assert_eq!(body_text(response).await, "");

        let (app, _dir) = create_test_app().await;
        let response = get(app, &format!("/fdsnws/dataselect/1/query?{}&nodata=404", params)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(response).await, "Not Found: No data selected");
    }

    #[tokio::test]
    async fn test_query_post_form() {
        let (app, _dir) = create_test_app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/fdsnws/dataselect/1/query")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("start=2012-01-01&end=2012-01-02&nodata=404"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_queryauth() {
        let params = "/fdsnws/dataselect/1/queryauth?start=2012-01-01&end=2012-01-02&nodata=404";

        // No credentials
        let (app, _dir) = create_test_app().await;
        let response = get(app, params).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));

        // Wrong password
        let (app, _dir) = create_test_app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri(params)
                    .header(header::AUTHORIZATION, format!("Basic {}", STANDARD.encode("random:x")))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // Valid credentials reach the query
        let (app, _dir) = create_test_app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri(params)
                    .header(
                        header::AUTHORIZATION,
                        format!("Basic {}", STANDARD.encode("random:random")),
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_mapping_overlap_conflict() {
        let (app, _dir) = create_test_app().await;

        let create = |body: &'static str| {
            Request::builder()
                .method("POST")
                .uri("/api/v1/mappings")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap()
        };

        let response = app
            .clone()
            .oneshot(create(
                r#"{"source": "BW.ALTM..EHZ", "target": "XX.YY.00.EHZ", "start": "2010-01-01", "end": "2011-01-01"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(create(
                r#"{"source": "BW.ALTM..EHZ", "target": "XX.ZZ.00.EHZ", "start": "2010-06-01"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        // Adjacent validity is fine
        let response = app
            .clone()
            .oneshot(create(
                r#"{"source": "BW.ALTM..EHZ", "target": "XX.ZZ.00.EHZ", "start": "2011-01-01"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = get(app, "/api/v1/mappings").await;
        assert!(body_text(response).await.contains("\"total\":2"));
    }

    #[tokio::test]
    async fn test_restriction_requires_station() {
        let (app, _dir) = create_test_app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/restrictions")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"network": "BW", "station": " ", "users": ["random"]}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_document_types() {
        let (app, _dir) = create_test_app().await;
        let response = get(app, "/api/v1/document_types").await;
        assert_eq!(response.status(), StatusCode::OK);
        let text = body_text(response).await;
        assert!(text.contains("can_see_private_events"));
        assert!(text.contains("can_see_geojson_category_Bohrpfad_at_site_Garching"));

        let (app, _dir) = create_test_app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/document_types/geojson/validate")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("\"valid\":false"));

        let (app, _dir) = create_test_app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/document_types/stationxml/validate")
                    .body(Body::from("<a/>"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
