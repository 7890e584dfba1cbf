//! Key-value query functions.

use rusqlite::{Connection, OptionalExtension};

use crate::{DbError, Result};

/// Get the value stored under `key` for an origin.
pub fn get(conn: &Connection, origin: &str, key: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM kv_entries WHERE origin = ?1 AND key = ?2",
        [origin, key],
        |row| row.get(0),
    )
    .optional()
    .map_err(DbError::Sqlite)
}

/// Set a value, replacing any previous one.
pub fn set(conn: &Connection, origin: &str, key: &str, value: &str, updated_at: u64) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO kv_entries (origin, key, value, updated_at)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![origin, key, value, updated_at as i64],
    )?;
    Ok(())
}

/// Remove a value. Returns whether an entry existed.
pub fn remove(conn: &Connection, origin: &str, key: &str) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM kv_entries WHERE origin = ?1 AND key = ?2",
        [origin, key],
    )?;
    Ok(deleted > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "http://localhost:8080";

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    #[test]
    fn test_get_missing() {
        let conn = test_db();
        assert_eq!(get(&conn, ORIGIN, "uploadedDocuments").expect("get"), None);
    }

    #[test]
    fn test_set_and_get() {
        let conn = test_db();
        set(&conn, ORIGIN, "uploadedDocuments", "[]", 100).expect("set");
        assert_eq!(
            get(&conn, ORIGIN, "uploadedDocuments").expect("get").as_deref(),
            Some("[]")
        );

        set(&conn, ORIGIN, "uploadedDocuments", "[1]", 101).expect("overwrite");
        assert_eq!(
            get(&conn, ORIGIN, "uploadedDocuments").expect("get").as_deref(),
            Some("[1]")
        );
    }

    #[test]
    fn test_origins_are_isolated() {
        let conn = test_db();
        set(&conn, ORIGIN, "k", "a", 1).expect("set");
        set(&conn, "https://other.example", "k", "b", 1).expect("set");
        assert_eq!(get(&conn, ORIGIN, "k").expect("get").as_deref(), Some("a"));
        assert_eq!(
            get(&conn, "https://other.example", "k").expect("get").as_deref(),
            Some("b")
        );
    }

    #[test]
    fn test_remove() {
        let conn = test_db();
        set(&conn, ORIGIN, "k", "v", 1).expect("set");
        assert!(remove(&conn, ORIGIN, "k").expect("remove"));
        assert!(!remove(&conn, ORIGIN, "k").expect("second remove"));
        assert_eq!(get(&conn, ORIGIN, "k").expect("get"), None);
    }
}
