//! Sparse field patches keyed by dotted paths, and merge application.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::PatchError;
use crate::users::model::{FieldMap, FieldValue};

/// Value staged for a single field path.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchValue {
    /// Resolved by the store to its own clock at commit time.
    ServerTimestamp,
    /// Written as given.
    Value(FieldValue),
}

impl PatchValue {
    /// Resolve against the commit time.
    pub fn resolve(&self, now: DateTime<Utc>) -> FieldValue {
        match self {
            Self::ServerTimestamp => FieldValue::Timestamp(now),
            Self::Value(value) => value.clone(),
        }
    }
}

impl From<FieldValue> for PatchValue {
    fn from(value: FieldValue) -> Self {
        Self::Value(value)
    }
}

/// Sparse set of dotted field paths that need to be written.
///
/// An empty patch means the document is left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    entries: BTreeMap<String, PatchValue>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, path: impl Into<String>, value: impl Into<PatchValue>) {
        self.entries.insert(path.into(), value.into());
    }

    pub fn get(&self, path: &str) -> Option<&PatchValue> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn remove(&mut self, path: &str) -> Option<PatchValue> {
        self.entries.remove(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Merge the patch into `fields`.
    ///
    /// Intermediate segments are created when absent, and replaced with an
    /// empty map when null or an array. Sibling fields are never touched. Every server timestamp resolves to `now`.
    pub fn apply_to(&self, fields: &mut FieldMap, now: DateTime<Utc>) -> Result<(), PatchError> {
        for (path, value) in &self.entries {
            set_path(fields, path, value.resolve(now))?;
        }
        Ok(())
    }
}

fn set_path(fields: &mut FieldMap, path: &str, value: FieldValue) -> Result<(), PatchError> {
    let mut segments = path.split('.').peekable();
    let mut current = fields;

    while let Some(segment) = segments.next() {
        if segment.is_empty() {
            return Err(PatchError::EmptySegment {
                path: path.to_string(),
            });
        }

        if segments.peek().is_none() {
            current.insert(segment.to_string(), value);
            return Ok(());
        }

        let slot = current
            .entry(segment.to_string())
            .or_insert_with(|| FieldValue::Map(FieldMap::new()));
        if matches!(slot, FieldValue::Null | FieldValue::Array(_)) {
            *slot = FieldValue::Map(FieldMap::new());
        }

        current = match slot {
            FieldValue::Map(map) => map,
            other => {
                return Err(PatchError::NotAMap {
                    path: path.to_string(),
                    segment: segment.to_string(),
                    found: other.type_name(),
                });
            }
        };
    }

    Err(PatchError::EmptySegment {
        path: path.to_string(),
    })
}
