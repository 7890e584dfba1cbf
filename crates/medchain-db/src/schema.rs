//! SQL schema definitions.

/// Complete schema for the v1 database.
pub const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS kv_entries (
    origin TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (origin, key)
);

CREATE INDEX IF NOT EXISTS idx_kv_updated ON kv_entries(origin, updated_at);
"#;
