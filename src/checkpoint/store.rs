//! The checkpoint store: single owner and writer of crawl progress

use crate::checkpoint::{
    CheckpointBackend, CheckpointError, CheckpointRecord, CheckpointResult, CheckpointSummary,
    HierarchyNode, JsonFileBackend, PendingChanges, SqliteBackend, CHECKPOINT_FORMAT_VERSION,
};
use crate::config::{CheckpointBackendKind, Config};
use chrono::Utc;
use std::path::{Path, PathBuf};

/// Tracks completed nodes and emitted record keys, flushing to a backend
///
/// # Flush Policy
///
/// - [`mark_done`](Self::mark_done) flushes immediately, so a node is never
///   durably done before everything it depends on is durable too.
/// - [`mark_seen`](Self::mark_seen) only buffers; callers flush once per page.
pub struct CheckpointStore {
    backend: Box<dyn CheckpointBackend>,
    record: CheckpointRecord,
    pending: PendingChanges,
}

impl CheckpointStore {
    /// Loads the checkpoint from the backend
    ///
    /// # Returns
    ///
    /// * `Ok(CheckpointStore)` - Loaded state, or empty state if nothing was stored
    /// * `Err(CheckpointError::CorruptState)` - Stored state exists but is unreadable
    pub fn open(mut backend: Box<dyn CheckpointBackend>) -> CheckpointResult<Self> {
        let record = match backend.load()? {
            Some(record) => {
                if record.version > CHECKPOINT_FORMAT_VERSION {
                    return Err(CheckpointError::CorruptState {
                        location: backend.location(),
                        message: format!(
                            "format version {} is newer than supported version {}",
                            record.version, CHECKPOINT_FORMAT_VERSION
                        ),
                    });
                }
                if !record.is_well_formed() {
                    return Err(CheckpointError::CorruptState {
                        location: backend.location(),
                        message: "node path does not match its level".to_string(),
                    });
                }
                tracing::info!(
                    "Loaded checkpoint from {} ({} states, {} areas, {} prefixes done, {} records seen)",
                    backend.location(),
                    record.done_states.len(),
                    record.done_areas.len(),
                    record.done_prefixes.len(),
                    record.seen_record_keys.len()
                );
                record
            }
            None => {
                tracing::info!("No checkpoint at {}, starting empty", backend.location());
                CheckpointRecord::default()
            }
        };

        Ok(Self {
            backend,
            record,
            pending: PendingChanges::default(),
        })
    }

    pub fn record(&self) -> &CheckpointRecord {
        &self.record
    }

    pub fn location(&self) -> String {
        self.backend.location()
    }

    pub fn is_done(&self, node: &HierarchyNode) -> bool {
        self.record.contains_node(node)
    }

    /// Marks a node as done and flushes
    pub fn mark_done(&mut self, node: &HierarchyNode) -> CheckpointResult<()> {
        if self.record.insert_node(node) {
            self.pending.nodes.push(node.clone());
        }
        self.flush()
    }

    pub fn has_seen(&self, record_key: &str) -> bool {
        self.record.seen_record_keys.contains(record_key)
    }

    /// Buffers a record key as seen; returns false if it already was
    pub fn mark_seen(&mut self, record_key: &str) -> bool {
        let inserted = self.record.seen_record_keys.insert(record_key.to_string());
        if inserted {
            self.pending.seen.push(record_key.to_string());
        }
        inserted
    }

    /// True when changes are buffered but not yet durable
    pub fn has_unflushed(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Persists the current record
    ///
    /// A no-op when nothing changed since the last flush. On failure the
    /// buffered changes are kept so the next flush retries them.
    pub fn flush(&mut self) -> CheckpointResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let previous = self.record.updated_at;
        self.record.updated_at = Some(Utc::now());

        if let Err(e) = self.backend.persist(&self.record, &self.pending) {
            self.record.updated_at = previous;
            return Err(e);
        }

        tracing::trace!(
            "Flushed checkpoint: {} nodes, {} record keys",
            self.pending.nodes.len(),
            self.pending.seen.len()
        );
        self.pending.clear();
        Ok(())
    }

    /// Forgets all progress, in memory and in the backend
    pub fn reset(&mut self) -> CheckpointResult<()> {
        self.backend.clear()?;
        self.record = CheckpointRecord::default();
        self.pending.clear();
        tracing::info!("Cleared checkpoint at {}", self.backend.location());
        Ok(())
    }

    pub fn summary(&self) -> CheckpointSummary {
        CheckpointSummary {
            done_states: self.record.done_states.len(),
            done_areas: self.record.done_areas.len(),
            done_prefixes: self.record.done_prefixes.len(),
            seen_records: self.record.seen_record_keys.len(),
        }
    }
}

/// Opens the checkpoint backend selected by the configuration
///
/// # Arguments
///
/// * `config` - The crawler configuration
///
/// # Returns
///
/// * `Ok(CheckpointStore)` - Loaded (or empty) checkpoint
/// * `Err(CheckpointError)` - Stored checkpoint is unreadable
pub fn open_checkpoint(config: &Config) -> CheckpointResult<CheckpointStore> {
    let path = config.checkpoint_path();
    let backend: Box<dyn CheckpointBackend> = match config.output.checkpoint_backend {
        CheckpointBackendKind::Json => Box::new(JsonFileBackend::new(path)),
        CheckpointBackendKind::Sqlite => Box::new(SqliteBackend::new(path)),
    };
    CheckpointStore::open(backend)
}

/// Moves an unreadable checkpoint aside instead of deleting it
///
/// The file is renamed to `<name>.corrupt-<timestamp>` next to the original.
///
/// # Returns
///
/// * `Ok(Some(path))` - Where the file was moved
/// * `Ok(None)` - There was no file to move
pub fn quarantine_corrupt(path: &Path) -> CheckpointResult<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "checkpoint".to_string());
    let target = path.with_file_name(format!(
        "{}.corrupt-{}",
        file_name,
        Utc::now().format("%Y%m%dT%H%M%S")
    ));

    std::fs::rename(path, &target)?;
    tracing::warn!(
        "Moved unreadable checkpoint {} to {}",
        path.display(),
        target.display()
    );
    Ok(Some(target))
}
