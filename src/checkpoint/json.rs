//! JSON file checkpoint backend
//!
//! The whole record is serialized on every flush and written with the
//! write-to-temp-then-rename pattern, so a crash mid-write leaves the
//! previous checkpoint intact.

use crate::checkpoint::{
    CheckpointBackend, CheckpointError, CheckpointRecord, CheckpointResult, PendingChanges,
};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "checkpoint".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn persist_error(&self, message: impl Into<String>) -> CheckpointError {
        CheckpointError::Persist {
            location: self.location(),
            message: message.into(),
        }
    }

    fn write_atomically(&self, bytes: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.temp_path();
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        // Durable before it replaces the old checkpoint
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &self.path)
    }
}

impl CheckpointBackend for JsonFileBackend {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&mut self) -> CheckpointResult<Option<CheckpointRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read(&self.path)?;
        let record = serde_json::from_slice::<CheckpointRecord>(&content).map_err(|e| {
            CheckpointError::CorruptState {
                location: self.location(),
                message: e.to_string(),
            }
        })?;

        Ok(Some(record))
    }

    fn persist(
        &mut self,
        record: &CheckpointRecord,
        _pending: &PendingChanges,
    ) -> CheckpointResult<()> {
        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| self.persist_error(format!("serialization failed: {}", e)))?;

        self.write_atomically(&json)
            .map_err(|e| self.persist_error(e.to_string()))
    }

    fn clear(&mut self) -> CheckpointResult<()> {
        for path in [self.path.clone(), self.temp_path()] {
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}
