//! Document Store Adapter.
//!
//! Collections are SQLite tables holding one JSON document per row. Filters and
//! sorts are compiled to `json_extract` expressions over validated field paths.

use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use tubeway_types::models::timestamp;

use crate::models::{Document, id_of, validate_path};
use crate::{Collection, Database, StoreError};

/// Conjunction of field conditions.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<Clause>,
}

#[derive(Debug, Clone)]
enum Clause {
    Eq(String, Value),
    In(String, Vec<Value>),
    /// Case-insensitive substring match on a text field.
    Contains(String, String),
}

impl Filter {
    /// Matches every document.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_id(id: impl Into<String>) -> Self {
        Self::all().eq("_id", id.into())
    }

    pub fn eq(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push(Clause::Eq(path.into(), value.into()));
        self
    }

    pub fn any_of(mut self, path: impl Into<String>, values: Vec<Value>) -> Self {
        self.clauses.push(Clause::In(path.into(), values));
        self
    }

    pub fn contains(mut self, path: impl Into<String>, text: impl Into<String>) -> Self {
        self.clauses.push(Clause::Contains(path.into(), text.into()));
        self
    }

    fn compile(&self, params: &mut Vec<SqlValue>) -> Result<String, StoreError> {
        let mut parts = Vec::with_capacity(self.clauses.len());
        for clause in &self.clauses {
            let part = match clause {
                Clause::Eq(path, Value::Null) => format!("{} IS NULL", column(path)?),
                Clause::Eq(path, value) => {
                    params.push(sql_value(value));
                    format!("{} = ?{}", column(path)?, params.len())
                }
                Clause::In(_, values) if values.is_empty() => "0".to_string(),
                Clause::In(path, values) => {
                    let mut placeholders = Vec::with_capacity(values.len());
                    for value in values {
                        params.push(sql_value(value));
                        placeholders.push(format!("?{}", params.len()));
                    }
                    format!("{} IN ({})", column(path)?, placeholders.join(", "))
                }
                Clause::Contains(path, text) => {
                    params.push(SqlValue::Text(text.clone()));
                    format!("instr(lower({}), lower(?{})) > 0", column(path)?, params.len())
                }
            };
            parts.push(part);
        }

        if parts.is_empty() {
            Ok(String::new())
        } else {
            Ok(format!(" WHERE {}", parts.join(" AND ")))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub path: String,
    pub descending: bool,
}

impl Sort {
    pub fn asc(path: impl Into<String>) -> Self {
        Self { path: path.into(), descending: false }
    }

    pub fn desc(path: impl Into<String>) -> Self {
        Self { path: path.into(), descending: true }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FindQuery {
    pub filter: Filter,
    pub sort: Option<Sort>,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl FindQuery {
    pub fn new(filter: Filter) -> Self {
        Self { filter, ..Self::default() }
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Result of a create-or-delete link toggle.
#[derive(Debug, Clone, PartialEq)]
pub enum Toggle {
    Created(Document),
    Removed(Document),
}

/// Collection-oriented access used by the relation resolver and facades.
///
/// Every method is a single atomic operation against the store. Operations
/// addressing one record by ID fail with [`StoreError::NotFound`] when it is
/// absent; connectivity failures surface as [`StoreError::Unavailable`] and
/// are never retried.
pub trait DocumentStore: Send + Sync {
    fn find(&self, collection: Collection, query: &FindQuery) -> Result<Vec<Document>, StoreError>;

    fn find_one(&self, collection: Collection, filter: &Filter) -> Result<Option<Document>, StoreError> {
        let query = FindQuery::new(filter.clone()).limit(1);
        Ok(self.find(collection, &query)?.into_iter().next())
    }

    fn find_by_id(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError>;

    fn count(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError>;

    /// Assigns an `_id` when the document has none.
    fn insert(&self, collection: Collection, doc: Document) -> Result<Document, StoreError>;

    /// Shallow merge of `patch` into the stored document; `null` removes a
    /// field. `_id` is never overwritten and `updatedAt` is refreshed.
    fn update_by_id(&self, collection: Collection, id: &str, patch: Document) -> Result<Document, StoreError>;

    fn delete_by_id(&self, collection: Collection, id: &str) -> Result<Document, StoreError>;

    /// Delete every document matching `key`, or insert `doc` when none does.
    fn toggle_link(&self, collection: Collection, key: &Filter, doc: Document) -> Result<Toggle, StoreError>;

    /// Add `by` to a numeric field in place (missing counts as zero).
    fn increment(&self, collection: Collection, id: &str, path: &str, by: i64) -> Result<Document, StoreError>;

    /// Flip a boolean field in place (missing counts as `true`).
    fn toggle_flag(&self, collection: Collection, id: &str, path: &str) -> Result<Document, StoreError>;

    /// Append `value` to an array field unless already present.
    fn add_to_set(&self, collection: Collection, id: &str, path: &str, value: Value) -> Result<Document, StoreError>;

    /// Remove every occurrence of `value` from an array field. The flag tells
    /// whether anything was removed.
    fn pull(&self, collection: Collection, id: &str, path: &str, value: &Value) -> Result<(Document, bool), StoreError>;
}

impl DocumentStore for Database {
    fn find(&self, collection: Collection, query: &FindQuery) -> Result<Vec<Document>, StoreError> {
        self.with_conn(|conn| find_in(conn, collection, query))
    }

    fn find_by_id(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        self.with_conn(|conn| find_by_id_in(conn, collection, id))
    }

    fn count(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        self.with_conn(|conn| count_in(conn, collection, filter))
    }

    fn insert(&self, collection: Collection, doc: Document) -> Result<Document, StoreError> {
        self.with_conn(|conn| insert_in(conn, collection, doc))
    }

    fn update_by_id(&self, collection: Collection, id: &str, mut patch: Document) -> Result<Document, StoreError> {
        patch.remove("_id");
        patch.insert("updatedAt".into(), Value::String(timestamp::now()));
        let patch = serde_json::to_string(&patch)?;
        self.with_conn(|conn| {
            let sql = format!(
                "UPDATE {} SET doc = json_patch(doc, ?2) WHERE id = ?1 RETURNING doc",
                collection.table()
            );
            returning(conn, &sql, params![id, patch])?.ok_or_else(|| StoreError::not_found(collection, id))
        })
    }

    fn delete_by_id(&self, collection: Collection, id: &str) -> Result<Document, StoreError> {
        self.with_conn(|conn| delete_by_id_in(conn, collection, id))
    }

    fn toggle_link(&self, collection: Collection, key: &Filter, doc: Document) -> Result<Toggle, StoreError> {
        self.with_tx(|conn| {
            let removed = delete_where_in(conn, collection, key)?;
            match removed.into_iter().next() {
                Some(existing) => {
                    debug!("toggle on {}: removed {:?}", collection, id_of(&existing));
                    Ok(Toggle::Removed(existing))
                }
                None => {
                    let created = insert_in(conn, collection, doc)?;
                    debug!("toggle on {}: created {:?}", collection, id_of(&created));
                    Ok(Toggle::Created(created))
                }
            }
        })
    }

    fn increment(&self, collection: Collection, id: &str, path: &str, by: i64) -> Result<Document, StoreError> {
        self.with_conn(|conn| increment_in(conn, collection, id, path, by))
    }

    fn toggle_flag(&self, collection: Collection, id: &str, path: &str) -> Result<Document, StoreError> {
        validate_path(path)?;
        self.with_conn(|conn| {
            let sql = format!(
                "UPDATE {table} SET doc = json_set(doc, '$.{path}',
                     json(CASE WHEN COALESCE(json_extract(doc, '$.{path}'), 1) THEN 'false' ELSE 'true' END))
                 WHERE id = ?1 RETURNING doc",
                table = collection.table(),
            );
            returning(conn, &sql, params![id])?.ok_or_else(|| StoreError::not_found(collection, id))
        })
    }

    fn add_to_set(&self, collection: Collection, id: &str, path: &str, value: Value) -> Result<Document, StoreError> {
        self.with_tx(|conn| add_to_set_in(conn, collection, id, path, value))
    }

    fn pull(&self, collection: Collection, id: &str, path: &str, value: &Value) -> Result<(Document, bool), StoreError> {
        validate_path(path)?;
        self.with_tx(|conn| {
            let mut doc = find_by_id_in(conn, collection, id)?
                .ok_or_else(|| StoreError::not_found(collection, id))?;
            let items = array_field(&mut doc, path)?;
            let before = items.len();
            items.retain(|item| item != value);
            let removed = items.len() != before;
            if removed {
                write_in(conn, collection, id, &doc)?;
            }
            Ok((doc, removed))
        })
    }
}

// -- Connection-level helpers, shared with transactional queries --

pub(crate) fn find_in(conn: &Connection, collection: Collection, query: &FindQuery) -> Result<Vec<Document>, StoreError> {
    let mut params = Vec::new();
    let mut sql = format!("SELECT doc FROM {}{}", collection.table(), query.filter.compile(&mut params)?);

    if let Some(sort) = &query.sort {
        let direction = if sort.descending { "DESC" } else { "ASC" };
        sql.push_str(&format!(" ORDER BY {} {}, id {}", column(&sort.path)?, direction, direction));
    }

    if query.limit.is_some() || query.skip > 0 {
        // An offset SQLite cannot represent is past the end of any table.
        let Ok(skip) = i64::try_from(query.skip) else {
            return Ok(Vec::new());
        };
        // SQLite treats a negative LIMIT as "no limit"
        let limit = query.limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX)).unwrap_or(-1);
        params.push(SqlValue::Integer(limit));
        params.push(SqlValue::Integer(skip));
        sql.push_str(&format!(" LIMIT ?{} OFFSET ?{}", params.len() - 1, params.len()));
    }

    let mut stmt = conn.prepare(&sql)?;
    let raw = stmt
        .query_map(params_from_iter(params.iter()), |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    raw.iter().map(|text| decode(text)).collect()
}

pub(crate) fn find_by_id_in(conn: &Connection, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
    let sql = format!("SELECT doc FROM {} WHERE id = ?1", collection.table());
    let raw: Option<String> = conn.query_row(&sql, [id], |row| row.get(0)).optional()?;
    raw.as_deref().map(decode).transpose()
}

pub(crate) fn count_in(conn: &Connection, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
    let mut params = Vec::new();
    let sql = format!("SELECT COUNT(*) FROM {}{}", collection.table(), filter.compile(&mut params)?);
    let count: i64 = conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?;
    Ok(count as u64)
}

pub(crate) fn insert_in(conn: &Connection, collection: Collection, doc: Document) -> Result<Document, StoreError> {
    let (id, doc) = match id_of(&doc) {
        Some(id) => (id.to_string(), doc),
        None => {
            let id = Uuid::new_v4().to_string();
            let mut with_id = Document::new();
            with_id.insert("_id".into(), Value::String(id.clone()));
            with_id.extend(doc);
            (id, with_id)
        }
    };

    let sql = format!("INSERT INTO {} (id, doc) VALUES (?1, ?2)", collection.table());
    conn.execute(&sql, params![id, serde_json::to_string(&doc)?])?;
    Ok(doc)
}

pub(crate) fn delete_where_in(conn: &Connection, collection: Collection, filter: &Filter) -> Result<Vec<Document>, StoreError> {
    let mut params = Vec::new();
    let sql = format!("DELETE FROM {}{} RETURNING doc", collection.table(), filter.compile(&mut params)?);
    let mut stmt = conn.prepare(&sql)?;
    let raw = stmt
        .query_map(params_from_iter(params.iter()), |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    raw.iter().map(|text| decode(text)).collect()
}

pub(crate) fn delete_by_id_in(conn: &Connection, collection: Collection, id: &str) -> Result<Document, StoreError> {
    let sql = format!("DELETE FROM {} WHERE id = ?1 RETURNING doc", collection.table());
    returning(conn, &sql, params![id])?.ok_or_else(|| StoreError::not_found(collection, id))
}

pub(crate) fn increment_in(
    conn: &Connection,
    collection: Collection,
    id: &str,
    path: &str,
    by: i64,
) -> Result<Document, StoreError> {
    validate_path(path)?;
    let sql = format!(
        "UPDATE {table} SET doc = json_set(doc, '$.{path}', COALESCE(json_extract(doc, '$.{path}'), 0) + ?2)
         WHERE id = ?1 RETURNING doc",
        table = collection.table(),
    );
    returning(conn, &sql, params![id, by])?.ok_or_else(|| StoreError::not_found(collection, id))
}

/// Read-modify-write of an array field. Callers hold an immediate transaction.
pub(crate) fn add_to_set_in(
    conn: &Connection,
    collection: Collection,
    id: &str,
    path: &str,
    value: Value,
) -> Result<Document, StoreError> {
    validate_path(path)?;
    let mut doc = find_by_id_in(conn, collection, id)?.ok_or_else(|| StoreError::not_found(collection, id))?;
    let items = array_field(&mut doc, path)?;
    if !items.contains(&value) {
        items.push(value);
        write_in(conn, collection, id, &doc)?;
    }
    Ok(doc)
}

fn write_in(conn: &Connection, collection: Collection, id: &str, doc: &Document) -> Result<(), StoreError> {
    let sql = format!("UPDATE {} SET doc = ?2 WHERE id = ?1", collection.table());
    conn.execute(&sql, params![id, serde_json::to_string(doc)?])?;
    Ok(())
}

fn returning<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<Option<Document>, StoreError> {
    let raw: Option<String> = conn.query_row(sql, params, |row| row.get(0)).optional()?;
    raw.as_deref().map(decode).transpose()
}

fn array_field<'a>(doc: &'a mut Document, path: &str) -> Result<&'a mut Vec<Value>, StoreError> {
    match doc.entry(path.to_string()).or_insert_with(|| Value::Array(Vec::new())) {
        Value::Array(items) => Ok(items),
        _ => Err(StoreError::InvalidField(path.to_string())),
    }
}

fn decode(text: &str) -> Result<Document, StoreError> {
    Ok(serde_json::from_str(text)?)
}

fn column(path: &str) -> Result<String, StoreError> {
    validate_path(path)?;
    if path == "_id" {
        Ok("id".to_string())
    } else {
        Ok(format!("json_extract(doc, '$.{}')", path))
    }
}

/// `json_extract` yields 0/1 for JSON booleans and plain text for strings, so
/// bind values the same way.
fn sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}
