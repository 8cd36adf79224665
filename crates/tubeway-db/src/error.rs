use rusqlite::ErrorCode;
use thiserror::Error;

use crate::Collection;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{collection} record {id} not found")]
    NotFound { collection: Collection, id: String },

    /// A unique index rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(#[source] rusqlite::Error),

    #[error("document encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("invalid field path '{0}'")]
    InvalidField(String),

    #[error("store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub fn not_found(collection: Collection, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection,
            id: id.into(),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(e, msg) if e.code == ErrorCode::ConstraintViolation => {
                Self::Conflict(msg.unwrap_or_else(|| e.to_string()))
            }
            other => Self::Unavailable(other),
        }
    }
}
