//! Document plugin framework
//!
//! Document types are registered explicitly in a `PluginRegistry`. Each
//! type carries validators, an optional indexer with a declared field
//! schema, and retrieve permissions that narrow queries over its index
//! for users lacking them.
//!
//! ```text
//! bytes ──► Validator* ──► Indexer ──► IndexRecord* (schema checked)
//!
//! IndexQuery ──► PermissionFilter* (by user's granted codenames) ──► IndexQuery
//! ```

mod error;
mod permissions;
mod plugins;
mod types;

pub use error::{DocumentError, DocumentResult};
pub use permissions::{geojson_permissions, RetrievePermission};
pub use plugins::{
    DocumentType, DocumentTypeInfo, Indexer, JsonValidator, PermissionFilter, PermissionInfo,
    PluginRegistry, Validator, XmlValidator,
};
pub use types::{Condition, FieldType, IndexQuery, IndexRecord, IndexSchema, IndexValue, Predicate};
