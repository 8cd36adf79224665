pub mod error;
pub mod migrations;
pub mod models;
pub mod paging;
pub mod pipeline;
pub mod queries;
pub mod relation;
pub mod shape;
pub mod store;

use std::fmt;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, TransactionBehavior};
use tracing::info;

pub use error::StoreError;
pub use models::Document;
pub use paging::{PageOutcome, PageRequest};
pub use pipeline::Pipeline;
pub use relation::Relation;
pub use shape::Shape;
pub use store::{DocumentStore, Filter, FindQuery, Sort, Toggle};

/// Named document collections. Each one is a table of `(id, doc)` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Videos,
    Comments,
    Likes,
    Subscriptions,
    Tweets,
    Playlists,
}

impl Collection {
    pub fn table(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Videos => "videos",
            Self::Comments => "comments",
            Self::Likes => "likes",
            Self::Subscriptions => "subscriptions",
            Self::Tweets => "tweets",
            Self::Playlists => "playlists",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Handle to the document store. Constructed once at startup and shared.
///
/// All access goes through one connection behind a mutex; compound operations
/// run inside `BEGIN IMMEDIATE` transactions, which also serializes them
/// against other processes writing to the same file.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(Duration::from_secs(5))?;

        migrations::run(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Private in-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Run `f` inside an immediate (write-locking) transaction. Rolled back
    /// when `f` fails.
    pub fn with_tx<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}
