//! Waveform layer error types
//!
//! Defines all errors that can occur while indexing, storing and reading
//! continuous waveform data.

use thiserror::Error;

/// Errors that can occur in the waveform layer
#[derive(Error, Debug)]
pub enum WaveformError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Catalog database operation failed
    #[error("Catalog error: {0}")]
    Catalog(#[from] rusqlite::Error),

    /// A data record could not be parsed
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// A channel identity violates FDSN conventions
    #[error("Invalid channel identity: {0}")]
    InvalidIdentity(String),

    /// A mapping is malformed
    #[error("Invalid mapping: {0}")]
    InvalidMapping(String),

    /// Two mappings for the same source identity are active at the same instant
    #[error("Mapping for {source_identity} overlaps existing mapping {existing_id}")]
    MappingOverlap {
        source_identity: String,
        existing_id: i64,
    },

    /// Requested byte range lies outside the segment
    #[error("Byte range {offset}+{length} is outside segment {segment_id}")]
    RangeOutOfBounds {
        segment_id: i64,
        offset: u64,
        length: u64,
    },

    /// Requested object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Lock acquisition failed
    #[error("Lock error: {0}")]
    Lock(String),

    /// Background task failed
    #[error("Task error: {0}")]
    Task(String),
}

impl WaveformError {
    /// Whether the error was caused by invalid administrative input
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            WaveformError::MappingOverlap { .. }
                | WaveformError::InvalidMapping(_)
                | WaveformError::InvalidIdentity(_)
        )
    }
}

impl From<tokio::task::JoinError> for WaveformError {
    fn from(err: tokio::task::JoinError) -> Self {
        WaveformError::Task(err.to_string())
    }
}

/// Result type alias for waveform operations
pub type WaveformResult<T> = Result<T, WaveformError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WaveformError::MappingOverlap {
            source_identity: "TA.A25A..BHE".to_string(),
            existing_id: 3,
        };
        assert_eq!(
            err.to_string(),
            "Mapping for TA.A25A..BHE overlaps existing mapping 3"
        );
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: WaveformError = io_err.into();
        assert!(matches!(err, WaveformError::Io(_)));
        assert!(!err.is_configuration_error());
    }
}
