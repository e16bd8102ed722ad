//! Document plugin error types

use thiserror::Error;

use crate::documents::types::FieldType;

/// Errors from the document plugin registry
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Unknown document type: {0}")]
    UnknownType(String),

    #[error("Document type already registered: {0}")]
    DuplicateType(String),

    #[error("Document rejected by validator '{validator}'")]
    ValidationFailed { validator: String },

    #[error("Document type {0} has no indexer")]
    NoIndexer(String),

    #[error("Unknown field type: {0}")]
    UnknownFieldType(String),

    #[error("Field '{field}' should be {expected}, got {found}")]
    FieldType {
        field: String,
        expected: FieldType,
        found: String,
    },

    #[error("Indexing failed: {0}")]
    Indexing(String),
}

/// Result type alias for document operations
pub type DocumentResult<T> = Result<T, DocumentError>;
