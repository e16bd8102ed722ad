//! Query error types
//!
//! Validation errors carry the exact messages FDSN clients expect.

use thiserror::Error;

use crate::query::pattern::Field;
use crate::waveform::WaveformError;

/// Errors that can occur during query validation, planning and extraction
#[derive(Error, Debug)]
pub enum QueryError {
    /// Start time parameter missing
    #[error("Start time must be specified.")]
    MissingStartTime,

    /// End time parameter missing
    #[error("End time must be specified.")]
    MissingEndTime,

    /// A time parameter could not be parsed
    #[error("Error parsing {parameter}: {value}")]
    InvalidTimestamp { parameter: String, value: String },

    /// Start is not strictly before end
    #[error("Start time must be before end time.")]
    InvalidTimeRange,

    /// A network, station or channel selector was blank
    #[error("{0} must not be an empty string.")]
    EmptyIdentifier(Field),

    /// A selector term is malformed
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Unsupported nodata status
    #[error("nodata must be 204 or 404.")]
    InvalidNoData,

    /// Unsupported output format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Storage layer error
    #[error("Storage error: {0}")]
    Storage(#[from] WaveformError),
}

impl QueryError {
    /// Whether the error was caused by the request rather than the server
    pub fn is_client_error(&self) -> bool {
        !matches!(self, QueryError::Storage(_))
    }

    pub(crate) fn invalid_pattern(pattern: &str, reason: impl Into<String>) -> Self {
        QueryError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
