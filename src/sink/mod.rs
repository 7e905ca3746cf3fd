//! Record sink module
//!
//! Records are written to one CSV file per jurisdiction. The sink only
//! appends: deduplication happens before records reach it, against the
//! checkpoint's seen-set.

mod csv_sink;

pub use csv_sink::{sanitize_component, CsvRecordSink, CSV_HEADER};

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while writing output artifacts
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// The (state, area) pair that owns one output file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Jurisdiction {
    pub state: String,
    pub area: String,
}

impl Jurisdiction {
    pub fn new(state: impl Into<String>, area: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            area: area.into(),
        }
    }
}

impl fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.state, self.area)
    }
}

/// One extracted entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub name: String,

    /// Canonical absolute profile URL; the record's identity
    pub profile_url: String,

    pub state_name: String,
    pub area_name: String,

    /// Local path of the downloaded image, if the download succeeded
    pub image_path: Option<PathBuf>,
}

impl Record {
    /// Key under which this record is tracked in the checkpoint
    pub fn key(&self) -> &str {
        &self.profile_url
    }
}

/// Durable, append-only output for records
pub trait RecordSink: Send {
    /// Appends records to the jurisdiction's artifact, creating it with a
    /// header row if it does not exist yet
    fn append(&mut self, jurisdiction: &Jurisdiction, records: &[Record]) -> SinkResult<()>;

    /// Record keys already present in the jurisdiction's artifact
    fn recorded_keys(&self, jurisdiction: &Jurisdiction) -> SinkResult<Vec<String>>;

    /// Directory that holds the jurisdiction's artifact and images
    fn jurisdiction_dir(&self, jurisdiction: &Jurisdiction) -> PathBuf;
}
