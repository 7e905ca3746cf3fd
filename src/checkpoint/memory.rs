//! In-memory checkpoint backend
//!
//! Clones share one slot, so a test can drop a store, reopen a new one from a
//! clone of the backend, and observe a "restart".

use crate::checkpoint::{
    CheckpointBackend, CheckpointError, CheckpointRecord, CheckpointResult, PendingChanges,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    slot: Arc<Mutex<Option<CheckpointRecord>>>,
    flushes: Arc<AtomicUsize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the stored record, if anything was persisted
    pub fn snapshot(&self) -> Option<CheckpointRecord> {
        self.slot.lock().ok().and_then(|guard| guard.clone())
    }

    /// Overwrites the stored record
    pub fn replace(&self, record: CheckpointRecord) {
        if let Ok(mut guard) = self.slot.lock() {
            *guard = Some(record);
        }
    }

    /// Number of successful persists
    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    fn guard(&self) -> CheckpointResult<MutexGuard<'_, Option<CheckpointRecord>>> {
        self.slot.lock().map_err(|_| CheckpointError::Persist {
            location: self.location(),
            message: "memory slot poisoned".to_string(),
        })
    }
}

impl CheckpointBackend for MemoryBackend {
    fn location(&self) -> String {
        "memory".to_string()
    }

    fn load(&mut self) -> CheckpointResult<Option<CheckpointRecord>> {
        Ok(self.guard()?.clone())
    }

    fn persist(
        &mut self,
        record: &CheckpointRecord,
        _pending: &PendingChanges,
    ) -> CheckpointResult<()> {
        *self.guard()? = Some(record.clone());
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn clear(&mut self) -> CheckpointResult<()> {
        *self.guard()? = None;
        Ok(())
    }
}
