//! Strata-Crawl: a resumable jurisdiction crawler
//!
//! This crate walks a four-level listing hierarchy (states, areas, name-prefix
//! buckets, paginated pages), writes the records it finds into one CSV per
//! jurisdiction, and checkpoints its progress so an interrupted run resumes
//! without re-fetching finished work or emitting a record twice.

pub mod checkpoint;
pub mod config;
pub mod crawler;
pub mod output;
pub mod sink;
pub mod url;

use thiserror::Error;

/// Main error type for Strata-Crawl operations
#[derive(Debug, Error)]
pub enum StrataError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transient fetch error: {0}")]
    TransientFetch(#[from] crawler::FetchError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] crawler::ExtractionError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] checkpoint::CheckpointError),

    #[error("Persist error: {0}")]
    Persist(#[from] sink::SinkError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StrataError {
    /// Returns true if this error means the checkpoint could not be read
    pub fn is_corrupt_state(&self) -> bool {
        matches!(
            self,
            Self::Checkpoint(checkpoint::CheckpointError::CorruptState { .. })
        )
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Strata-Crawl operations
pub type Result<T> = std::result::Result<T, StrataError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use checkpoint::{CheckpointRecord, CheckpointStore, HierarchyNode, Level};
pub use config::Config;
pub use crawler::{run_crawl, CrawlReport, Orchestrator};
pub use sink::{CsvRecordSink, Jurisdiction, Record, RecordSink};
pub use crate::url::canonicalize_url;
