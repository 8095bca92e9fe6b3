//! SQL DDL for initializing the database schema.

/// SQLite schema includes:
/// - `api_key` table (singleton row holding the encrypted LLM provider key)
/// - `instance_password` table (one encrypted database password per project ref)
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS api_key (
    id INTEGER PRIMARY KEY NOT NULL CHECK (id = 1),
    blob TEXT NOT NULL,
    updated_at TEXT NOT NULL -- RFC3339
);

CREATE TABLE IF NOT EXISTS instance_password (
    instance_ref TEXT PRIMARY KEY NOT NULL,
    blob TEXT NOT NULL,
    created_at TEXT NOT NULL, -- RFC3339
    updated_at TEXT NOT NULL -- RFC3339
);
"#;
