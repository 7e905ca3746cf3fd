//! SQLite schema for the checkpoint database

/// SQL schema for the checkpoint database
pub const SCHEMA_SQL: &str = r#"
-- Key/value metadata (format version, last flush time)
CREATE TABLE IF NOT EXISTS checkpoint_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Completed hierarchy nodes; path is a JSON array of segments
CREATE TABLE IF NOT EXISTS done_nodes (
    level TEXT NOT NULL,
    path TEXT NOT NULL,
    completed_at TEXT NOT NULL,
    PRIMARY KEY (level, path)
);

-- Record keys that have already been written to an output file
CREATE TABLE IF NOT EXISTS seen_records (
    record_key TEXT PRIMARY KEY,
    seen_at TEXT NOT NULL
);
"#;

/// Creates any missing tables
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)
}
