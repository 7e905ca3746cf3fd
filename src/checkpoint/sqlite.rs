//! SQLite checkpoint backend
//!
//! Each flush writes only the pending changes, inside one transaction. A file
//! that is not a SQLite database is reported as corrupt state on load.

use crate::checkpoint::schema::initialize_schema;
use crate::checkpoint::{
    CheckpointBackend, CheckpointError, CheckpointRecord, CheckpointResult, HierarchyNode, Level,
    PendingChanges, CHECKPOINT_FORMAT_VERSION,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;

pub struct SqliteBackend {
    path: PathBuf,
    conn: Option<Connection>,
}

impl SqliteBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            conn: None,
        }
    }

    fn open_connection(&self) -> Result<Connection, rusqlite::Error> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
        ",
        )?;
        initialize_schema(&conn)?;
        Ok(conn)
    }

    fn connection(&mut self) -> CheckpointResult<&mut Connection> {
        if self.conn.is_none() {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let conn = self.open_connection().map_err(|e| self.persist_error(e))?;
            self.conn = Some(conn);
        }
        // Populated just above
        self.conn.as_mut().ok_or_else(|| CheckpointError::Persist {
            location: self.path.display().to_string(),
            message: "connection unavailable".to_string(),
        })
    }

    fn persist_error(&self, e: impl ToString) -> CheckpointError {
        CheckpointError::Persist {
            location: self.location(),
            message: e.to_string(),
        }
    }

    fn corrupt(&self, e: impl ToString) -> CheckpointError {
        CheckpointError::CorruptState {
            location: self.location(),
            message: e.to_string(),
        }
    }

    fn read_record(conn: &Connection) -> Result<CheckpointRecord, String> {
        let mut record = CheckpointRecord::default();

        let version: Option<String> = conn
            .query_row(
                "SELECT value FROM checkpoint_meta WHERE key = 'version'",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| e.to_string())?;
        if let Some(version) = version {
            record.version = version
                .parse()
                .map_err(|_| format!("invalid format version '{}'", version))?;
        }

        let updated_at: Option<String> = conn
            .query_row(
                "SELECT value FROM checkpoint_meta WHERE key = 'updated_at'",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| e.to_string())?;
        record.updated_at = updated_at
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let mut stmt = conn
            .prepare("SELECT level, path FROM done_nodes")
            .map_err(|e| e.to_string())?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| e.to_string())?;

        for row in rows {
            let (level_str, path_json) = row.map_err(|e| e.to_string())?;
            let level = Level::from_db_string(&level_str)
                .ok_or_else(|| format!("unknown node level '{}'", level_str))?;
            let path: Vec<String> = serde_json::from_str(&path_json)
                .map_err(|e| format!("invalid node path '{}': {}", path_json, e))?;
            let node = HierarchyNode::from_parts(level, path)
                .ok_or_else(|| format!("{} path has wrong length: {}", level, path_json))?;
            record.insert_node(&node);
        }

        let mut stmt = conn
            .prepare("SELECT record_key FROM seen_records")
            .map_err(|e| e.to_string())?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| e.to_string())?;
        for key in keys {
            record
                .seen_record_keys
                .insert(key.map_err(|e| e.to_string())?);
        }

        Ok(record)
    }
}

impl CheckpointBackend for SqliteBackend {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&mut self) -> CheckpointResult<Option<CheckpointRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let conn = self.open_connection().map_err(|e| self.corrupt(e))?;
        let record = Self::read_record(&conn).map_err(|e| self.corrupt(e))?;
        self.conn = Some(conn);
        Ok(Some(record))
    }

    fn persist(
        &mut self,
        record: &CheckpointRecord,
        pending: &PendingChanges,
    ) -> CheckpointResult<()> {
        let now = record.updated_at.unwrap_or_else(Utc::now).to_rfc3339();
        let location = self.location();
        let conn = self.connection()?;

        let write = |conn: &mut Connection| -> Result<(), rusqlite::Error> {
            let tx = conn.transaction()?;
            {
                let mut insert_node = tx.prepare(
                    "INSERT OR IGNORE INTO done_nodes (level, path, completed_at) VALUES (?1, ?2, ?3)",
                )?;
                for node in &pending.nodes {
                    let path = serde_json::to_string(node.path())
                        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
                    insert_node.execute(params![node.level().to_db_string(), path, now])?;
                }

                let mut insert_seen = tx.prepare(
                    "INSERT OR IGNORE INTO seen_records (record_key, seen_at) VALUES (?1, ?2)",
                )?;
                for key in &pending.seen {
                    insert_seen.execute(params![key, now])?;
                }

                let mut upsert_meta = tx.prepare(
                    "INSERT OR REPLACE INTO checkpoint_meta (key, value) VALUES (?1, ?2)",
                )?;
                upsert_meta.execute(params!["version", CHECKPOINT_FORMAT_VERSION.to_string()])?;
                upsert_meta.execute(params!["updated_at", now])?;
            }
            tx.commit()
        };

        write(conn).map_err(|e| CheckpointError::Persist {
            location,
            message: e.to_string(),
        })
    }

    fn clear(&mut self) -> CheckpointResult<()> {
        let location = self.location();
        let conn = self.connection()?;
        conn.execute_batch(
            "
            BEGIN;
            DELETE FROM done_nodes;
            DELETE FROM seen_records;
            DELETE FROM checkpoint_meta;
            COMMIT;
        ",
        )
        .map_err(|e| CheckpointError::Persist {
            location,
            message: e.to_string(),
        })
    }
}
