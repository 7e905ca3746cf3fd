//! Configuration module for Strata-Crawl
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use strata_crawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Crawl starts at: {}", config.crawler.root_url);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CheckpointBackendKind, Config, CrawlerConfig, ExtractorConfig, OutputConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, load_config_with_overrides,
    parse_config, ConfigOverrides,
};

use std::path::PathBuf;

impl Config {
    /// Returns the configured prefix buckets in crawl order
    pub fn prefixes(&self) -> Vec<char> {
        self.crawler.prefixes.chars().collect()
    }

    /// Returns the full path of the checkpoint file
    pub fn checkpoint_path(&self) -> PathBuf {
        PathBuf::from(&self.output.base_dir).join(&self.output.checkpoint_file)
    }
}
