//! Relation Resolver: attaches related documents to a base result set.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::models::{Document, get_path};
use crate::store::{DocumentStore, Filter, FindQuery};
use crate::{Collection, StoreError};

/// How to fetch and attach records from another collection.
///
/// `local_field` holds either a single key or an ordered array of keys that
/// are matched by equality against the foreign record's `_id`. Matches are
/// stored under `as_field`.
#[derive(Debug, Clone)]
pub struct Relation {
    pub local_field: String,
    pub from: Collection,
    pub as_field: String,
    /// Fields kept on each attached record. `None` keeps all of them.
    pub project: Option<Vec<String>>,
    /// Resolved on the foreign records before they are attached.
    pub nested: Vec<Relation>,
}

impl Relation {
    pub fn new(local_field: impl Into<String>, from: Collection, as_field: impl Into<String>) -> Self {
        Self {
            local_field: local_field.into(),
            from,
            as_field: as_field.into(),
            project: None,
            nested: Vec::new(),
        }
    }

    pub fn project<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.project = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn nest(mut self, relation: Relation) -> Self {
        self.nested.push(relation);
        self
    }

    /// `_id`, the listed fields, then any nested attachments, in that order.
    fn apply_projection(&self, doc: Document) -> Document {
        let Some(fields) = &self.project else {
            return doc;
        };

        let mut doc = doc;
        let mut out = Document::new();
        let keep = std::iter::once("_id")
            .chain(fields.iter().map(String::as_str))
            .chain(self.nested.iter().map(|n| n.as_field.as_str()));
        for field in keep {
            if out.contains_key(field) {
                continue;
            }
            if let Some(value) = doc.remove(field) {
                out.insert(field.to_string(), value);
            }
        }
        out
    }
}

/// Attach every relation to every base row, in the order given.
///
/// One query per relation per nesting level: keys are gathered across all rows
/// and fetched with a single `IN` lookup.
pub fn resolve(
    store: &dyn DocumentStore,
    mut base: Vec<Document>,
    relations: &[Relation],
) -> Result<Vec<Document>, StoreError> {
    for relation in relations {
        attach(store, &mut base, relation)?;
    }
    Ok(base)
}

fn attach(store: &dyn DocumentStore, rows: &mut [Document], relation: &Relation) -> Result<(), StoreError> {
    let keys = collect_keys(rows, &relation.local_field);

    let mut index: HashMap<String, Document> = HashMap::new();
    if !keys.is_empty() {
        let filter = Filter::all().any_of("_id", keys.into_iter().map(Value::String).collect());
        let found = store.find(relation.from, &FindQuery::new(filter))?;
        let found = resolve(store, found, &relation.nested)?;
        for doc in found {
            let Some(key) = get_path(&doc, "_id").and_then(key_of) else {
                continue;
            };
            // first match wins
            if !index.contains_key(&key) {
                index.insert(key, relation.apply_projection(doc));
            }
        }
    }

    for row in rows.iter_mut() {
        let attached = match get_path(row, &relation.local_field) {
            Some(Value::Array(keys)) => Value::Array(
                keys.iter()
                    .filter_map(key_of)
                    .filter_map(|key| index.get(&key).cloned())
                    .map(Value::Object)
                    .collect(),
            ),
            Some(value) => key_of(value)
                .and_then(|key| index.get(&key).cloned())
                .map(Value::Object)
                .unwrap_or(Value::Null),
            None => Value::Null,
        };
        row.insert(relation.as_field.clone(), attached);
    }

    Ok(())
}

/// Distinct join keys across all rows, in first-seen order.
fn collect_keys(rows: &[Document], path: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    for row in rows {
        let values: Vec<&Value> = match get_path(row, path) {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(value) => vec![value],
            None => Vec::new(),
        };
        for key in values.into_iter().filter_map(key_of) {
            if seen.insert(key.clone()) {
                keys.push(key);
            }
        }
    }
    keys
}

fn key_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
