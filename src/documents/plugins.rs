//! Document type registry
//!
//! Every document type is registered explicitly at startup:
//!
//! ```text
//! PluginRegistry
//!   ├── "quakeml" → DocumentType { validators, indexer?, permissions }
//!   └── "geojson" → DocumentType { validators, indexer?, permissions }
//!
//! upload:   bytes → every validator → indexer → schema check → records
//! retrieve: query → each permission (granted? authorized : unauthorized) → query
//! ```

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

use crate::config::DocumentsConfig;
use crate::documents::error::{DocumentError, DocumentResult};
use crate::documents::permissions::{geojson_permissions, RetrievePermission};
use crate::documents::types::{IndexQuery, IndexRecord, IndexSchema};

/// Checks whether a document is acceptable for a type
pub trait Validator: Send + Sync {
    /// Short name used in rejections
    fn name(&self) -> &str;

    fn validate(&self, document: &[u8]) -> bool;
}

/// Turns a document into index records
pub trait Indexer: Send + Sync {
    /// Declared fields of the produced records
    fn schema(&self) -> &IndexSchema;

    fn index(&self, document: &[u8]) -> DocumentResult<Vec<IndexRecord>>;
}

/// A named permission that narrows retrieval queries
pub trait PermissionFilter: Send + Sync {
    fn codename(&self) -> String;

    /// Human readable name
    fn name(&self) -> String;

    fn filter_when_authorized(&self, query: IndexQuery) -> IndexQuery {
        query
    }

    fn filter_when_unauthorized(&self, query: IndexQuery) -> IndexQuery;
}

/// Accepts any well-formed JSON object
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonValidator;

impl Validator for JsonValidator {
    fn name(&self) -> &str {
        "json"
    }

    fn validate(&self, document: &[u8]) -> bool {
        matches!(
            serde_json::from_slice::<serde_json::Value>(document),
            Ok(serde_json::Value::Object(_))
        )
    }
}

/// Accepts any well-formed XML document with a root element
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlValidator;

impl Validator for XmlValidator {
    fn name(&self) -> &str {
        "xml"
    }

    fn validate(&self, document: &[u8]) -> bool {
        let mut reader = Reader::from_reader(document);
        let mut buf = Vec::new();
        let mut depth = 0usize;
        let mut saw_root = false;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(_)) => {
                    if depth == 0 && saw_root {
                        return false;
                    }
                    depth += 1;
                    saw_root = true;
                }
                Ok(Event::End(_)) => depth = depth.saturating_sub(1),
                Ok(Event::Empty(_)) => {
                    if depth == 0 && saw_root {
                        return false;
                    }
                    saw_root = true;
                }
                Ok(Event::Eof) => return saw_root && depth == 0,
                Ok(_) => {}
                Err(_) => return false,
            }
            buf.clear();
        }
    }
}

/// A registered document type
pub struct DocumentType {
    name: String,
    title: String,
    content_type: String,
    validators: Vec<Box<dyn Validator>>,
    indexer: Option<Box<dyn Indexer>>,
    permissions: Vec<Box<dyn PermissionFilter>>,
}

impl DocumentType {
    pub fn new(name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            content_type: "application/octet-stream".to_string(),
            validators: Vec::new(),
            indexer: None,
            permissions: Vec::new(),
        }
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    pub fn indexer(mut self, indexer: impl Indexer + 'static) -> Self {
        self.indexer = Some(Box::new(indexer));
        self
    }

    pub fn permission(mut self, permission: impl PermissionFilter + 'static) -> Self {
        self.permissions.push(Box::new(permission));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn permissions(&self) -> impl Iterator<Item = &dyn PermissionFilter> {
        self.permissions.iter().map(|p| p.as_ref())
    }

    /// Serializable summary
    pub fn describe(&self) -> DocumentTypeInfo {
        DocumentTypeInfo {
            name: self.name.clone(),
            title: self.title.clone(),
            content_type: self.content_type.clone(),
            validators: self.validators.iter().map(|v| v.name().to_string()).collect(),
            indexed_fields: self
                .indexer
                .as_ref()
                .map(|i| i.schema().fields().clone())
                .unwrap_or_default()
                .into_iter()
                .map(|(name, field_type)| (name, field_type.to_string()))
                .collect(),
            permissions: self
                .permissions
                .iter()
                .map(|p| PermissionInfo {
                    codename: p.codename(),
                    name: p.name(),
                })
                .collect(),
        }
    }
}

impl std::fmt::Debug for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentType")
            .field("name", &self.name)
            .field("validators", &self.validators.len())
            .field("indexer", &self.indexer.is_some())
            .field("permissions", &self.permissions.len())
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentTypeInfo {
    pub name: String,
    pub title: String,
    pub content_type: String,
    pub validators: Vec<String>,
    pub indexed_fields: BTreeMap<String, String>,
    pub permissions: Vec<PermissionInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PermissionInfo {
    pub codename: String,
    pub name: String,
}

/// Registry of document types keyed by name
#[derive(Debug, Default)]
pub struct PluginRegistry {
    types: BTreeMap<String, DocumentType>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in QuakeML and GeoJSON types
    pub fn with_builtin(config: &DocumentsConfig) -> DocumentResult<Self> {
        let mut registry = Self::new();

        registry.register(
            DocumentType::new("quakeml", "QuakeML")
                .content_type("application/xml")
                .validator(XmlValidator)
                .permission(RetrievePermission::PrivateEvents),
        )?;

        let mut geojson = DocumentType::new("geojson", "GeoJSON")
            .content_type("application/geo+json")
            .validator(JsonValidator);
        for permission in geojson_permissions(config) {
            geojson = geojson.permission(permission);
        }
        registry.register(geojson)?;

        info!(types = registry.types.len(), "Document types registered");
        Ok(registry)
    }

    pub fn register(&mut self, document_type: DocumentType) -> DocumentResult<()> {
        if self.types.contains_key(&document_type.name) {
            return Err(DocumentError::DuplicateType(document_type.name));
        }
        debug!(name = %document_type.name, "Registering document type");
        self.types.insert(document_type.name.clone(), document_type);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&DocumentType> {
        self.types.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn describe(&self) -> Vec<DocumentTypeInfo> {
        self.types.values().map(DocumentType::describe).collect()
    }

    fn lookup(&self, name: &str) -> DocumentResult<&DocumentType> {
        self.types
            .get(name)
            .ok_or_else(|| DocumentError::UnknownType(name.to_string()))
    }

    /// Run every validator of the type; the first rejection wins
    pub fn validate(&self, name: &str, document: &[u8]) -> DocumentResult<()> {
        let document_type = self.lookup(name)?;
        match document_type.validators.iter().find(|v| !v.validate(document)) {
            Some(validator) => Err(DocumentError::ValidationFailed {
                validator: validator.name().to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Validate, then index and check records against the declared schema
    pub fn index(&self, name: &str, document: &[u8]) -> DocumentResult<Vec<IndexRecord>> {
        self.validate(name, document)?;
        let indexer = self
            .lookup(name)?
            .indexer
            .as_ref()
            .ok_or_else(|| DocumentError::NoIndexer(name.to_string()))?;

        let records = indexer.index(document)?;
        for record in &records {
            indexer.schema().check(record)?;
        }
        Ok(records)
    }

    /// Apply each permission of the type to a retrieval query
    pub fn filter_query(
        &self,
        name: &str,
        query: IndexQuery,
        granted: &HashSet<String>,
    ) -> DocumentResult<IndexQuery> {
        let document_type = self.lookup(name)?;
        Ok(document_type.permissions.iter().fold(query, |query, permission| {
            if granted.contains(&permission.codename()) {
                permission.filter_when_authorized(query)
            } else {
                permission.filter_when_unauthorized(query)
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::types::{FieldType, IndexValue};

    struct MagnitudeIndexer {
        schema: IndexSchema,
    }

    impl MagnitudeIndexer {
        fn new() -> Self {
            Self {
                schema: IndexSchema::new()
                    .field("magnitude", FieldType::Float)
                    .field("public", FieldType::Boolean),
            }
        }
    }

    impl Indexer for MagnitudeIndexer {
        fn schema(&self) -> &IndexSchema {
            &self.schema
        }

        fn index(&self, document: &[u8]) -> DocumentResult<Vec<IndexRecord>> {
            let value: serde_json::Value =
                serde_json::from_slice(document).map_err(|e| DocumentError::Indexing(e.to_string()))?;
            let mut record = IndexRecord::new();
            if let Some(m) = value.get("magnitude").and_then(|m| m.as_f64()) {
                record.insert("magnitude".into(), IndexValue::Float(m));
            }
            if let Some(p) = value.get("public") {
                let v = match p {
                    serde_json::Value::Bool(b) => IndexValue::Boolean(*b),
                    serde_json::Value::String(s) => IndexValue::String(s.clone()),
                    _ => IndexValue::Null,
                };
                record.insert("public".into(), v);
            }
            Ok(vec![record])
        }
    }

    fn registry() -> PluginRegistry {
        let mut registry = PluginRegistry::new();
        registry
            .register(
                DocumentType::new("events", "Events")
                    .validator(JsonValidator)
                    .indexer(MagnitudeIndexer::new())
                    .permission(RetrievePermission::PrivateEvents),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = registry();
        let result = registry.register(DocumentType::new("events", "Again"));
        assert!(matches!(result, Err(DocumentError::DuplicateType(_))));
    }

    #[test]
    fn test_validators() {
        assert!(JsonValidator.validate(br#"{"type": "FeatureCollection"}"#));
        assert!(!JsonValidator.validate(b"[1, 2]"));
        assert!(!JsonValidator.validate(b"{broken"));

        assert!(XmlValidator.validate(b"<?xml version=\"1.0\"?><q:quakeml><event/></q:quakeml>"));
        assert!(!XmlValidator.validate(b"<a><b></a>"));
        assert!(!XmlValidator.validate(b"<a/><b/>"));
        assert!(!XmlValidator.validate(b"just text"));
    }

    #[test]
    fn test_index_checks_schema() {
        let registry = registry();

        let records = registry
            .index("events", br#"{"magnitude": 2.5, "public": true}"#)
            .unwrap();
        assert_eq!(records[0].get("magnitude"), Some(&IndexValue::Float(2.5)));

        let err = registry.index("events", br#"{"public": "yes"}"#).unwrap_err();
        assert!(matches!(err, DocumentError::FieldType { .. }));

        let err = registry.index("events", b"not json").unwrap_err();
        assert!(matches!(err, DocumentError::ValidationFailed { .. }));

        assert!(matches!(
            registry.index("missing", b"{}"),
            Err(DocumentError::UnknownType(_))
        ));
    }

    #[test]
    fn test_filter_query_by_grant() {
        let registry = registry();
        let records = vec![
            registry.index("events", br#"{"public": true}"#).unwrap().remove(0),
            registry.index("events", br#"{"public": false}"#).unwrap().remove(0),
            registry.index("events", br#"{"magnitude": 1.0}"#).unwrap().remove(0),
        ];

        let anonymous = registry
            .filter_query("events", IndexQuery::all(), &HashSet::new())
            .unwrap();
        assert_eq!(anonymous.apply(&records).len(), 1);

        let granted: HashSet<String> = ["can_see_private_events".to_string()].into();
        let privileged = registry
            .filter_query("events", IndexQuery::all(), &granted)
            .unwrap();
        assert_eq!(privileged.apply(&records).len(), 3);
    }

    #[test]
    fn test_builtin_types() {
        let registry = PluginRegistry::with_builtin(&DocumentsConfig::default()).unwrap();
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec!["geojson", "quakeml"]);

        assert!(registry.validate("geojson", br#"{"type": "Feature"}"#).is_ok());
        assert!(registry.validate("quakeml", br#"{"type": "Feature"}"#).is_err());

        let geojson = registry.describe().into_iter().find(|t| t.name == "geojson").unwrap();
        assert!(geojson
            .permissions
            .iter()
            .any(|p| p.codename == "can_see_geojson_unrecognized_objects"));
    }
}
