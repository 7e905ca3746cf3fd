//! Output module for run reports and checkpoint summaries
//!
//! Records themselves are written by [`crate::sink`]; this module only
//! renders what happened.

pub mod stats;

pub use stats::{print_checkpoint_summary, print_crawl_report, CrawlReport};
