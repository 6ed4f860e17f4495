//! User document model — field values as the document store sees them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ordered field map of a document or nested map value.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// A single field value.
///
/// `Timestamp` is the store's native time type and is kept distinct from
/// strings that merely look like dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    Array(Vec<FieldValue>),
    Map(FieldMap),
}

impl FieldValue {
    /// Short type name, used in logs and error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Timestamp(_) => "timestamp",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
        }
    }

    pub fn as_map(&self) -> Option<&FieldMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl From<FieldMap> for FieldValue {
    fn from(value: FieldMap) -> Self {
        Self::Map(value)
    }
}

/// A user record: immutable id plus its field map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDocument {
    pub id: String,
    pub fields: FieldMap,
}

impl UserDocument {
    /// Create a document with no fields.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: FieldMap::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }
}

/// Shape of a nested container field (`settings`, `progressSummary`),
/// decided once per document before any default is computed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Container<'a> {
    /// Key not present at all.
    Missing,
    /// Present and explicitly null.
    Null,
    /// Present and a map; sub-fields are checked individually.
    Object(&'a FieldMap),
    /// Present and an array. It has no keys, so every nested default applies
    /// and the write replaces it with a map.
    Array,
    /// Present and a scalar; left untouched.
    Incompatible(&'static str),
}

impl<'a> Container<'a> {
    pub fn classify(value: Option<&'a FieldValue>) -> Self {
        match value {
            None => Self::Missing,
            Some(FieldValue::Null) => Self::Null,
            Some(FieldValue::Map(map)) => Self::Object(map),
            Some(FieldValue::Array(_)) => Self::Array,
            Some(other) => Self::Incompatible(other.type_name()),
        }
    }

    /// Whether nested defaults may be written into this container.
    pub fn accepts_defaults(&self) -> bool {
        !matches!(self, Self::Incompatible(_))
    }

    /// Whether `key` is already present inside the container.
    pub fn has_key(&self, key: &str) -> bool {
        match self {
            Self::Object(map) => map.contains_key(key),
            _ => false,
        }
    }
}
