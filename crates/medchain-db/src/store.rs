//! The key-value store seam.
//!
//! [`KeyValueStore`] is the persistence interface the marketplace core is
//! written against. [`SqliteStore`] keeps entries in the medchain database;
//! [`MemoryStore`] keeps them in process and is shared between clones.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::Connection;

use crate::queries::kv;
use crate::{DbError, Result};

/// String key-value storage scoped to one origin.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

/// A [`KeyValueStore`] backed by the SQLite `kv_entries` table.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    origin: String,
}

impl SqliteStore {
    /// Open the database at `path` and scope the store to `origin`.
    pub fn open(path: &Path, origin: impl Into<String>) -> Result<Self> {
        Ok(Self::with_connection(crate::open(path)?, origin))
    }

    /// An in-memory store (for testing).
    pub fn open_memory(origin: impl Into<String>) -> Result<Self> {
        Ok(Self::with_connection(crate::open_memory()?, origin))
    }

    pub fn with_connection(conn: Connection, origin: impl Into<String>) -> Self {
        Self {
            conn: Mutex::new(conn),
            origin: origin.into(),
        }
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock().map_err(|_| DbError::Poisoned)?;
        f(&conn)
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn| kv::get(conn, &self.origin, key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.with_conn(|conn| kv::set(conn, &self.origin, key, value, now))
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.with_conn(|conn| kv::remove(conn, &self.origin, key).map(|_| ()))
    }
}

/// An in-process [`KeyValueStore`]. Clones share the same entries.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().map_err(|_| DbError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| DbError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| DbError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}
