//! Index records and queries over them
//!
//! Indexers turn a document into flat records of typed fields. Permission
//! filters narrow an `IndexQuery` before it is run against stored records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::documents::error::{DocumentError, DocumentResult};
use crate::waveform::Timestamp;

/// Declared type of an index field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    Timestamp,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for FieldType {
    type Err = DocumentError;

    /// Accepts both the long names and the short ones plugins often use
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" | "str" => Ok(FieldType::String),
            "integer" | "int" => Ok(FieldType::Integer),
            "float" => Ok(FieldType::Float),
            "boolean" | "bool" => Ok(FieldType::Boolean),
            "timestamp" | "UTCDateTime" => Ok(FieldType::Timestamp),
            other => Err(DocumentError::UnknownFieldType(other.to_string())),
        }
    }
}

/// Value of one index field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Timestamp(Timestamp),
    String(String),
}

impl IndexValue {
    /// Type of the value, None for null
    pub fn field_type(&self) -> Option<FieldType> {
        match self {
            IndexValue::Null => None,
            IndexValue::String(_) => Some(FieldType::String),
            IndexValue::Integer(_) => Some(FieldType::Integer),
            IndexValue::Float(_) => Some(FieldType::Float),
            IndexValue::Boolean(_) => Some(FieldType::Boolean),
            IndexValue::Timestamp(_) => Some(FieldType::Timestamp),
        }
    }

    /// Numeric view of integer and float values
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            IndexValue::Integer(v) => Some(*v as f64),
            IndexValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            IndexValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Check if a value may be stored in a field of the given type
    pub fn fits(&self, field_type: FieldType) -> bool {
        match (self, field_type) {
            (IndexValue::Null, _) => true,
            // Integers widen to floats
            (IndexValue::Integer(_), FieldType::Float) => true,
            (value, expected) => value.field_type() == Some(expected),
        }
    }
}

impl From<&str> for IndexValue {
    fn from(value: &str) -> Self {
        IndexValue::String(value.to_string())
    }
}

impl From<String> for IndexValue {
    fn from(value: String) -> Self {
        IndexValue::String(value)
    }
}

impl From<bool> for IndexValue {
    fn from(value: bool) -> Self {
        IndexValue::Boolean(value)
    }
}

impl From<f64> for IndexValue {
    fn from(value: f64) -> Self {
        IndexValue::Float(value)
    }
}

impl From<i64> for IndexValue {
    fn from(value: i64) -> Self {
        IndexValue::Integer(value)
    }
}

/// One flat index entry produced from a document
pub type IndexRecord = BTreeMap<String, IndexValue>;

/// Declared fields of a document type's index
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexSchema {
    fields: BTreeMap<String, FieldType>,
}

impl IndexSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: declare a field
    pub fn field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.insert(name.into(), field_type);
        self
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldType> {
        &self.fields
    }

    /// Check declared fields of a record; undeclared fields are kept but not checked
    pub fn check(&self, record: &IndexRecord) -> DocumentResult<()> {
        for (name, value) in record {
            if let Some(&expected) = self.fields.get(name) {
                if !value.fits(expected) {
                    return Err(DocumentError::FieldType {
                        field: name.clone(),
                        expected,
                        found: format!("{:?}", value),
                    });
                }
            }
        }
        Ok(())
    }
}

/// A test on one field of a record
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Field equals the value (missing fields never match)
    Equals(String, IndexValue),
    /// Field equals one of the values
    OneOf(String, Vec<IndexValue>),
    /// Numeric field is below the threshold; missing or null fields count as below
    Below(String, f64),
}

impl Predicate {
    pub fn matches(&self, record: &IndexRecord) -> bool {
        match self {
            Predicate::Equals(field, value) => record.get(field) == Some(value),
            Predicate::OneOf(field, values) => record.get(field).is_some_and(|v| values.contains(v)),
            Predicate::Below(field, threshold) => record
                .get(field)
                .and_then(IndexValue::as_f64)
                .map_or(true, |v| v < *threshold),
        }
    }
}

/// A query condition
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Keep only records matching the predicate
    Require(Predicate),
    /// Drop records matching every predicate
    Exclude(Vec<Predicate>),
}

/// Conjunction of conditions over index records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexQuery {
    conditions: Vec<Condition>,
}

impl IndexQuery {
    /// Query matching every record
    pub fn all() -> Self {
        Self::default()
    }

    pub fn require(mut self, predicate: Predicate) -> Self {
        self.conditions.push(Condition::Require(predicate));
        self
    }

    pub fn exclude(mut self, predicates: Vec<Predicate>) -> Self {
        self.conditions.push(Condition::Exclude(predicates));
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn matches(&self, record: &IndexRecord) -> bool {
        self.conditions.iter().all(|condition| match condition {
            Condition::Require(predicate) => predicate.matches(record),
            Condition::Exclude(predicates) => !predicates.iter().all(|p| p.matches(record)),
        })
    }

    /// Records the query keeps, in input order
    pub fn apply<'a>(&self, records: impl IntoIterator<Item = &'a IndexRecord>) -> Vec<&'a IndexRecord> {
        records.into_iter().filter(|r| self.matches(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, IndexValue)]) -> IndexRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_field_type_names() {
        assert_eq!("str".parse::<FieldType>().unwrap(), FieldType::String);
        assert_eq!("UTCDateTime".parse::<FieldType>().unwrap(), FieldType::Timestamp);
        assert_eq!("bool".parse::<FieldType>().unwrap(), FieldType::Boolean);
        assert!("complex".parse::<FieldType>().is_err());
    }

    #[test]
    fn test_schema_check() {
        let schema = IndexSchema::new()
            .field("magnitude", FieldType::Float)
            .field("public", FieldType::Boolean);

        assert!(schema
            .check(&record(&[("magnitude", IndexValue::Integer(3)), ("extra", "x".into())]))
            .is_ok());
        assert!(schema.check(&record(&[("public", IndexValue::Null)])).is_ok());
        assert!(matches!(
            schema.check(&record(&[("public", "yes".into())])),
            Err(DocumentError::FieldType { .. })
        ));
    }

    #[test]
    fn test_exclude_needs_all_predicates() {
        let query = IndexQuery::all().exclude(vec![
            Predicate::Equals("site".into(), "Garching".into()),
            Predicate::Equals("category".into(), "Bohrpfad".into()),
        ]);

        let hidden = record(&[("site", "Garching".into()), ("category", "Bohrpfad".into())]);
        let other_site = record(&[("site", "Poing".into()), ("category", "Bohrpfad".into())]);
        assert!(!query.matches(&hidden));
        assert!(query.matches(&other_site));
    }

    #[test]
    fn test_below_treats_missing_as_small() {
        let predicate = Predicate::Below("magnitude".into(), 2.0);
        assert!(predicate.matches(&record(&[("magnitude", 1.5.into())])));
        assert!(!predicate.matches(&record(&[("magnitude", 2.0.into())])));
        assert!(predicate.matches(&record(&[])));
    }

    #[test]
    fn test_apply_keeps_order() {
        let records = vec![
            record(&[("public", true.into())]),
            record(&[("public", false.into())]),
            record(&[("public", IndexValue::Null)]),
            record(&[("public", true.into()), ("n", 2i64.into())]),
        ];
        let query = IndexQuery::all().require(Predicate::Equals("public".into(), true.into()));
        let kept = query.apply(&records);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[1].get("n"), Some(&IndexValue::Integer(2)));
    }
}
