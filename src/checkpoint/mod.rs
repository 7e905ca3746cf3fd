//! Checkpoint module for resumable crawls
//!
//! This module owns the durable record of crawl progress:
//! - Which State, Area and Prefix nodes have been fully completed
//! - Which record keys (canonical profile URLs) have already been emitted
//!
//! [`CheckpointStore`] is the single writer of that record. Persistence is
//! delegated to a [`CheckpointBackend`]: a JSON blob replaced atomically on
//! every flush, a SQLite database, or an in-memory slot for tests.

mod json;
mod memory;
mod schema;
mod sqlite;
mod store;

pub use json::JsonFileBackend;
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;
pub use store::{open_checkpoint, quarantine_corrupt, CheckpointStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Current on-disk format version of [`CheckpointRecord`]
pub const CHECKPOINT_FORMAT_VERSION: u32 = 1;

/// Errors that can occur while loading or persisting a checkpoint
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Checkpoint at {location} is unreadable: {message}")]
    CorruptState { location: String, message: String },

    #[error("Failed to persist checkpoint to {location}: {message}")]
    Persist { location: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for checkpoint operations
pub type CheckpointResult<T> = Result<T, CheckpointError>;

/// Level of a node in the traversal hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Level {
    State,
    Area,
    Prefix,
}

impl Level {
    /// Number of path segments a node at this level carries
    pub fn depth(&self) -> usize {
        match self {
            Self::State => 1,
            Self::Area => 2,
            Self::Prefix => 3,
        }
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Area => "area",
            Self::Prefix => "prefix",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "state" => Some(Self::State),
            "area" => Some(Self::Area),
            "prefix" => Some(Self::Prefix),
            _ => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// A position in the State → Area → Prefix hierarchy
///
/// Nodes are value objects: two nodes are equal when their level and path are
/// equal. The constructors guarantee the path length matches the level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HierarchyNode {
    level: Level,
    path: Vec<String>,
}

impl HierarchyNode {
    pub fn state(state: impl Into<String>) -> Self {
        Self {
            level: Level::State,
            path: vec![state.into()],
        }
    }

    pub fn area(state: impl Into<String>, area: impl Into<String>) -> Self {
        Self {
            level: Level::Area,
            path: vec![state.into(), area.into()],
        }
    }

    pub fn prefix(state: impl Into<String>, area: impl Into<String>, prefix: char) -> Self {
        Self {
            level: Level::Prefix,
            path: vec![state.into(), area.into(), prefix.to_string()],
        }
    }

    /// Rebuilds a node from stored parts; None if the path length is wrong
    pub fn from_parts(level: Level, path: Vec<String>) -> Option<Self> {
        (path.len() == level.depth()).then_some(Self { level, path })
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }
}

impl fmt::Display for HierarchyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.level, self.path.join("/"))
    }
}

/// Durable crawl progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    #[serde(default)]
    pub version: u32,

    /// Time of the last successful flush
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub done_states: BTreeSet<Vec<String>>,

    #[serde(default)]
    pub done_areas: BTreeSet<Vec<String>>,

    #[serde(default)]
    pub done_prefixes: BTreeSet<Vec<String>>,

    #[serde(default)]
    pub seen_record_keys: BTreeSet<String>,
}

impl Default for CheckpointRecord {
    fn default() -> Self {
        Self {
            version: CHECKPOINT_FORMAT_VERSION,
            updated_at: None,
            done_states: BTreeSet::new(),
            done_areas: BTreeSet::new(),
            done_prefixes: BTreeSet::new(),
            seen_record_keys: BTreeSet::new(),
        }
    }
}

impl CheckpointRecord {
    /// Returns the done-set that tracks nodes of the given level
    pub fn done_set(&self, level: Level) -> &BTreeSet<Vec<String>> {
        match level {
            Level::State => &self.done_states,
            Level::Area => &self.done_areas,
            Level::Prefix => &self.done_prefixes,
        }
    }

    fn done_set_mut(&mut self, level: Level) -> &mut BTreeSet<Vec<String>> {
        match level {
            Level::State => &mut self.done_states,
            Level::Area => &mut self.done_areas,
            Level::Prefix => &mut self.done_prefixes,
        }
    }

    pub fn contains_node(&self, node: &HierarchyNode) -> bool {
        self.done_set(node.level()).contains(node.path())
    }

    /// Adds a node to its done-set; returns false if it was already there
    pub fn insert_node(&mut self, node: &HierarchyNode) -> bool {
        self.done_set_mut(node.level()).insert(node.path().to_vec())
    }

    /// Every done node, in level then path order
    pub fn done_nodes(&self) -> impl Iterator<Item = HierarchyNode> + '_ {
        [Level::State, Level::Area, Level::Prefix]
            .into_iter()
            .flat_map(move |level| {
                self.done_set(level)
                    .iter()
                    .filter_map(move |path| HierarchyNode::from_parts(level, path.clone()))
            })
    }

    /// Checks that every stored path has the right length for its level
    pub fn is_well_formed(&self) -> bool {
        [Level::State, Level::Area, Level::Prefix]
            .into_iter()
            .all(|level| self.done_set(level).iter().all(|p| p.len() == level.depth()))
    }
}

/// Changes accumulated since the last flush
#[derive(Debug, Clone, Default)]
pub struct PendingChanges {
    pub nodes: Vec<HierarchyNode>,
    pub seen: Vec<String>,
}

impl PendingChanges {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.seen.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.seen.clear();
    }
}

/// Counts of completed nodes and seen records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckpointSummary {
    pub done_states: usize,
    pub done_areas: usize,
    pub done_prefixes: usize,
    pub seen_records: usize,
}

/// Durable storage for a [`CheckpointRecord`]
///
/// A backend is only ever driven by one [`CheckpointStore`]; it does not need
/// to guard against concurrent writers.
pub trait CheckpointBackend: Send {
    /// Human-readable location used in logs and errors
    fn location(&self) -> String;

    /// Reads the stored record
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - Nothing has been stored yet
    /// * `Ok(Some(record))` - The stored record
    /// * `Err(CheckpointError::CorruptState)` - Something is stored but unreadable
    fn load(&mut self) -> CheckpointResult<Option<CheckpointRecord>>;

    /// Atomically persists the record
    ///
    /// `pending` lists what changed since the previous persist, for backends
    /// that write incrementally. Either the whole call takes effect or none of
    /// it does.
    fn persist(
        &mut self,
        record: &CheckpointRecord,
        pending: &PendingChanges,
    ) -> CheckpointResult<()>;

    /// Removes everything stored
    fn clear(&mut self) -> CheckpointResult<()>;
}
