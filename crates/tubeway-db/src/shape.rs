//! Shape Projector: flattens attached relations into the output row shape and
//! expands array attachments into one row per element.

use serde_json::Value;

use crate::models::{Document, get_path};

/// Output layout: an ordered list of `(output key, source path)` pairs and an
/// optional array path to unwind first.
#[derive(Debug, Clone, Default)]
pub struct Shape {
    fields: Vec<(String, String)>,
    unwind: Option<String>,
}

impl Shape {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy a field under its own name.
    pub fn keep(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        self.fields.push((field.clone(), field));
        self
    }

    pub fn keep_all<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for field in fields {
            self = self.keep(field);
        }
        self
    }

    /// Copy the value found at `path` (dotted) under `out`.
    pub fn rename(mut self, out: impl Into<String>, path: impl Into<String>) -> Self {
        self.fields.push((out.into(), path.into()));
        self
    }

    pub fn unwind(mut self, path: impl Into<String>) -> Self {
        self.unwind = Some(path.into());
        self
    }

    pub fn unwinds(&self) -> bool {
        self.unwind.is_some()
    }
}

/// One row per element of the array at `path`, each a copy of `doc` with the
/// array replaced by that element. Empty, null or missing arrays yield no rows;
/// any other value counts as a one-element array.
pub fn expand(doc: Document, path: &str) -> Vec<Document> {
    let items = match doc.get(path) {
        Some(Value::Array(items)) => Some(items.clone()),
        None | Some(Value::Null) => return Vec::new(),
        Some(_) => None,
    };
    let Some(items) = items else {
        return vec![doc];
    };

    items
        .into_iter()
        .map(|item| {
            let mut row = doc.clone();
            row.insert(path.to_string(), item);
            row
        })
        .collect()
}

/// Build the output row. Unlisted fields are dropped; a source path that
/// does not resolve leaves its key out.
pub fn project(doc: &Document, shape: &Shape) -> Document {
    let mut out = Document::new();
    for (key, path) in &shape.fields {
        if let Some(value) = get_path(doc, path) {
            out.insert(key.clone(), value.clone());
        }
    }
    out
}

/// Unwind (when configured) then project every row. An empty field list
/// passes rows through unchanged.
pub fn apply(rows: Vec<Document>, shape: &Shape) -> Vec<Document> {
    let rows: Vec<Document> = match &shape.unwind {
        Some(path) => rows.into_iter().flat_map(|row| expand(row, path)).collect(),
        None => rows,
    };

    if shape.fields.is_empty() {
        return rows;
    }
    rows.iter().map(|row| project(row, shape)).collect()
}
