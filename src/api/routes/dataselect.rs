//! FDSN Dataselect Routes
//!
//! - GET /fdsnws/dataselect/1/ - Service index
//! - GET /fdsnws/dataselect/1/version - Service version
//! - GET /fdsnws/dataselect/1/application.wadl - Service description
//! - GET|POST /fdsnws/dataselect/1/query - Anonymous waveform query
//! - GET|POST /fdsnws/dataselect/1/queryauth - Authenticated waveform query

use axum::{
    body::Body,
    extract::{rejection::FormRejection, rejection::QueryRejection, Form, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
};
use futures_util::StreamExt;
use std::sync::Arc;

use crate::api::auth::authenticate;
use crate::api::dto::DataSelectParams;
use crate::api::error::FdsnError;
use crate::api::state::AppState;
use crate::api::wadl;
use crate::waveform::QueryResponse;

/// FDSN dataselect web service version
pub const SERVICE_VERSION: &str = "1.1.1";

pub const MSEED_CONTENT_TYPE: &str = "application/vnd.fdsn.mseed";

const NO_DATA_MESSAGE: &str = "Not Found: No data selected";

/// GET /fdsnws/dataselect/1
pub async fn redirect_index() -> Response {
    (
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, "/fdsnws/dataselect/1/")],
    )
        .into_response()
}

/// GET /fdsnws/dataselect/1/
pub async fn index() -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html><head><title>FDSN Dataselect Web Service</title></head>\
         <body><h1>FDSN Dataselect Web Service {}</h1><ul>\
         <li><a href=\"query\">query</a></li>\
         <li><a href=\"queryauth\">queryauth</a></li>\
         <li><a href=\"version\">version</a></li>\
         <li><a href=\"application.wadl\">application.wadl</a></li>\
         </ul></body></html>\n",
        SERVICE_VERSION
    ))
}

/// GET /fdsnws/dataselect/1/version
pub async fn version() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain")], SERVICE_VERSION)
}

/// GET /fdsnws/dataselect/1/application.wadl
pub async fn application_wadl(headers: HeaderMap) -> Result<Response, FdsnError> {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    let base_url = format!("http://{}/fdsnws/dataselect/1/", host);

    let document = wadl::render(&base_url).map_err(|e| FdsnError::Internal(e.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
        document,
    )
        .into_response())
}

/// GET /fdsnws/dataselect/1/query
pub async fn query_get(
    State(state): State<Arc<AppState>>,
    params: Result<Query<DataSelectParams>, QueryRejection>,
) -> Result<Response, FdsnError> {
    let Query(params) = params.map_err(|e| FdsnError::BadRequest(e.body_text()))?;
    run_query(&state, params, None).await
}

/// POST /fdsnws/dataselect/1/query
pub async fn query_post(
    State(state): State<Arc<AppState>>,
    params: Result<Form<DataSelectParams>, FormRejection>,
) -> Result<Response, FdsnError> {
    let Form(params) = params.map_err(|e| FdsnError::BadRequest(e.body_text()))?;
    run_query(&state, params, None).await
}

/// GET /fdsnws/dataselect/1/queryauth
///
/// Credentials are checked before the parameters.
pub async fn queryauth_get(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    params: Result<Query<DataSelectParams>, QueryRejection>,
) -> Result<Response, FdsnError> {
    let user = authenticate(&state.auth, &headers)?;
    let Query(params) = params.map_err(|e| FdsnError::BadRequest(e.body_text()))?;
    run_query(&state, params, Some(user)).await
}

/// POST /fdsnws/dataselect/1/queryauth
pub async fn queryauth_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    params: Result<Form<DataSelectParams>, FormRejection>,
) -> Result<Response, FdsnError> {
    let user = authenticate(&state.auth, &headers)?;
    let Form(params) = params.map_err(|e| FdsnError::BadRequest(e.body_text()))?;
    run_query(&state, params, Some(user)).await
}

/// Empty-result response. A 204 carries no body, so the message only
/// travels with 404.
fn no_data(status: StatusCode) -> Response {
    if status == StatusCode::NO_CONTENT {
        return status.into_response();
    }
    (status, [(header::CONTENT_TYPE, "text/plain")], NO_DATA_MESSAGE).into_response()
}

async fn run_query(
    state: &AppState,
    params: DataSelectParams,
    requester: Option<String>,
) -> Result<Response, FdsnError> {
    let mut request = params.into_request()?;
    request.query.requester = requester;

    match state.engine.query(&request.query).await? {
        QueryResponse::NoData => Ok(no_data(request.nodata)),
        QueryResponse::Data { segments, chunks } => {
            tracing::info!(
                segments = segments.len(),
                requester = request.query.requester.as_deref().unwrap_or("anonymous"),
                "Serving dataselect request"
            );

            let filename = format!(
                "attachment; filename=\"fdsnws_dataselect_1_{}.mseed\"",
                chrono::Utc::now().format("%Y-%m-%dT%H-%M-%S")
            );
            let body = Body::from_stream(chunks.map(|chunk| chunk.map(|c| c.data)));

            Ok((
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, MSEED_CONTENT_TYPE.to_string()),
                    (header::CONTENT_DISPOSITION, filename),
                ],
                body,
            )
                .into_response())
        }
    }
}
