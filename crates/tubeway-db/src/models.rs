//! Documents as stored: ordered JSON objects keyed by field name.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::StoreError;

/// An ordered-field record. Field order is preserved from insertion through
/// projection to the response body.
pub type Document = Map<String, Value>;

pub fn to_document<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidField(format!("expected an object, got {}", other))),
    }
}

pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}

pub fn id_of(doc: &Document) -> Option<&str> {
    doc.get("_id").and_then(Value::as_str)
}

/// Follow a dotted path (`owner.username`) through nested objects.
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// A field path is one or more identifier segments joined by dots. Paths are
/// interpolated into SQL, so anything else is rejected.
pub fn validate_path(path: &str) -> Result<(), StoreError> {
    let valid = !path.is_empty()
        && path.split('.').all(|seg| {
            let mut chars = seg.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidField(path.to_string()))
    }
}
