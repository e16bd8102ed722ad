//! Data Transfer Objects
//!
//! Request and response types for the API endpoints. Dataselect
//! parameters arrive as query strings or form bodies; admin types are JSON.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::query::{parse_time_parameter, Query, QueryError, QueryResult};
use crate::waveform::{format_timestamp, Mapping, Restriction};

// ============================================
// DATASELECT DTOs
// ============================================

/// FDSN dataselect parameters, long and short names accepted
#[derive(Debug, Default, Deserialize)]
pub struct DataSelectParams {
    #[serde(default, alias = "start")]
    pub starttime: Option<String>,
    #[serde(default, alias = "end")]
    pub endtime: Option<String>,
    #[serde(default, alias = "net")]
    pub network: Option<String>,
    #[serde(default, alias = "sta")]
    pub station: Option<String>,
    #[serde(default, alias = "loc")]
    pub location: Option<String>,
    #[serde(default, alias = "cha")]
    pub channel: Option<String>,
    /// Status for empty results: 204 (default) or 404
    #[serde(default)]
    pub nodata: Option<String>,
    /// Accepted for compatibility; every quality is served
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

/// A checked dataselect request
#[derive(Debug)]
pub struct DataSelectRequest {
    pub query: Query,
    pub nodata: StatusCode,
}

impl DataSelectParams {
    /// Check times, nodata and format; selectors are checked by the engine
    pub fn into_request(self) -> QueryResult<DataSelectRequest> {
        let start = parse_time_parameter("starttime", self.starttime.as_deref())?;
        let end = parse_time_parameter("endtime", self.endtime.as_deref())?;

        let nodata = match self.nodata.as_deref().map(str::trim) {
            None | Some("204") => StatusCode::NO_CONTENT,
            Some("404") => StatusCode::NOT_FOUND,
            Some(_) => return Err(QueryError::InvalidNoData),
        };

        if let Some(format) = self.format.as_deref() {
            if !format.eq_ignore_ascii_case("miniseed") {
                return Err(QueryError::UnsupportedFormat(format.to_string()));
            }
        }

        let mut query = Query::new(start, end);
        query.network = self.network;
        query.station = self.station;
        query.location = self.location;
        query.channel = self.channel;

        Ok(DataSelectRequest { query, nodata })
    }
}

// ============================================
// FILE DTOs
// ============================================

/// Path of a file or directory on the server
#[derive(Debug, Deserialize)]
pub struct PathRequest {
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct IndexFileResponse {
    pub path: String,
    pub segments: usize,
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub path: String,
    pub files: usize,
}

#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub id: i64,
    pub path: String,
    pub size: u64,
    pub segments: usize,
    pub indexed_at: String,
}

#[derive(Debug, Serialize)]
pub struct FileListResponse {
    pub files: Vec<FileResponse>,
    pub total: usize,
}

// ============================================
// MAPPING DTOs
// ============================================

/// Create mapping request; identities are `NET.STA.LOC.CHA`
#[derive(Debug, Deserialize)]
pub struct CreateMappingRequest {
    pub source: String,
    pub target: String,
    /// Start of validity (ISO 8601)
    pub start: String,
    /// Exclusive end of validity, open-ended when absent
    #[serde(default)]
    pub end: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MappingResponse {
    pub id: i64,
    pub source: String,
    pub target: String,
    pub start: String,
    pub end: Option<String>,
}

impl From<&Mapping> for MappingResponse {
    fn from(mapping: &Mapping) -> Self {
        Self {
            id: mapping.id,
            source: mapping.source.to_string(),
            target: mapping.target.to_string(),
            start: format_timestamp(mapping.start),
            end: mapping.end.map(format_timestamp),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MappingListResponse {
    pub mappings: Vec<MappingResponse>,
    pub total: usize,
}

// ============================================
// RESTRICTION DTOs
// ============================================

#[derive(Debug, Deserialize)]
pub struct CreateRestrictionRequest {
    pub network: String,
    pub station: String,
    #[serde(default)]
    pub users: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RestrictionListResponse {
    pub restrictions: Vec<Restriction>,
    pub total: usize,
}

// ============================================
// DOCUMENT DTOs
// ============================================

#[derive(Debug, Serialize)]
pub struct ValidationResponse {
    pub document_type: String,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// ============================================
// HEALTH DTOs
// ============================================

/// Full health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: healthy or unhealthy
    pub status: String,
    /// Catalog status
    pub catalog: String,
    /// Snapshot generation currently served
    pub generation: u64,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Application version
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> DataSelectParams {
        let value = serde_json::Value::Object(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
                .collect(),
        );
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_short_names() {
        let request = params(&[
            ("start", "2010-03-25"),
            ("end", "2010-03-26"),
            ("net", "TA"),
            ("cha", "BH?"),
        ])
        .into_request()
        .unwrap();

        assert_eq!(request.query.network.as_deref(), Some("TA"));
        assert_eq!(request.query.channel.as_deref(), Some("BH?"));
        assert_eq!(request.nodata, StatusCode::NO_CONTENT);
    }

    #[test]
    fn test_time_errors_in_order() {
        let err = params(&[]).into_request().unwrap_err();
        assert_eq!(err.to_string(), "Start time must be specified.");

        let err = params(&[("start", "0")]).into_request().unwrap_err();
        assert_eq!(err.to_string(), "Error parsing starttime: 0");

        let err = params(&[("start", "2012-01-01")]).into_request().unwrap_err();
        assert_eq!(err.to_string(), "End time must be specified.");

        let err = params(&[("start", "2012-01-01"), ("end", "0")])
            .into_request()
            .unwrap_err();
        assert_eq!(err.to_string(), "Error parsing endtime: 0");
    }

    #[test]
    fn test_nodata_and_format() {
        let base = [("start", "2012-01-01"), ("end", "2012-01-02")];

        let mut with_404 = base.to_vec();
        with_404.push(("nodata", "404"));
        assert_eq!(params(&with_404).into_request().unwrap().nodata, StatusCode::NOT_FOUND);

        let mut bad = base.to_vec();
        bad.push(("nodata", "500"));
        assert!(matches!(params(&bad).into_request(), Err(QueryError::InvalidNoData)));

        let mut text = base.to_vec();
        text.push(("format", "text"));
        assert!(matches!(
            params(&text).into_request(),
            Err(QueryError::UnsupportedFormat(_))
        ));
    }
}
