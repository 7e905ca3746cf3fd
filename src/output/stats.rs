//! Crawl and checkpoint statistics
//!
//! This module provides the counters collected during one run and the
//! console rendering for them and for a stored checkpoint.

use crate::checkpoint::CheckpointSummary;
use std::time::Duration;

/// Counters for one crawl run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub states_completed: usize,
    pub states_skipped: usize,
    pub areas_completed: usize,
    pub areas_skipped: usize,
    pub prefixes_completed: usize,
    pub prefixes_skipped: usize,

    /// Listing pages fetched successfully, root included
    pub pages_fetched: usize,

    /// Pages that could not be fetched; each leaves its subtree not-done
    pub page_failures: usize,

    /// Records appended to the sink
    pub records_emitted: usize,

    /// Records dropped because their key was already seen
    pub duplicates_skipped: usize,

    /// Candidate items that could not be turned into records
    pub extraction_errors: usize,

    pub images_saved: usize,
    pub images_missing: usize,

    /// Keys found in the output but missing from the checkpoint
    pub records_recovered: usize,

    /// Wall time of the run
    pub elapsed: Duration,
}

impl CrawlReport {
    /// True if nothing failed during the run
    pub fn is_clean(&self) -> bool {
        self.page_failures == 0
    }
}

/// Prints a run report to stdout
pub fn print_crawl_report(report: &CrawlReport) {
    println!("=== Crawl Report ===\n");

    println!("Hierarchy:");
    println!(
        "  States:   {} completed, {} already done",
        report.states_completed, report.states_skipped
    );
    println!(
        "  Areas:    {} completed, {} already done",
        report.areas_completed, report.areas_skipped
    );
    println!(
        "  Prefixes: {} completed, {} already done",
        report.prefixes_completed, report.prefixes_skipped
    );
    println!();

    println!("Records:");
    println!("  Emitted: {}", report.records_emitted);
    println!("  Duplicates skipped: {}", report.duplicates_skipped);
    if report.extraction_errors > 0 {
        println!("  Unreadable items: {}", report.extraction_errors);
    }
    if report.records_recovered > 0 {
        println!("  Recovered from output: {}", report.records_recovered);
    }
    println!();

    if report.images_saved + report.images_missing > 0 {
        println!("Images:");
        println!("  Saved: {}", report.images_saved);
        println!("  Missing: {}", report.images_missing);
        println!();
    }

    let attempted = report.pages_fetched + report.page_failures;
    let success_rate = if attempted > 0 {
        (report.pages_fetched as f64 / attempted as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "Pages: {} fetched, {} failed ({:.1}% success) in {:.1}s",
        report.pages_fetched,
        report.page_failures,
        success_rate,
        report.elapsed.as_secs_f64()
    );

    if !report.is_clean() {
        println!("\nSome pages failed. Run again to resume the unfinished parts.");
    }
}

/// Prints what a stored checkpoint contains
pub fn print_checkpoint_summary(location: &str, summary: &CheckpointSummary) {
    println!("=== Checkpoint: {} ===\n", location);
    println!("  Completed states:   {}", summary.done_states);
    println!("  Completed areas:    {}", summary.done_areas);
    println!("  Completed prefixes: {}", summary.done_prefixes);
    println!("  Seen records:       {}", summary.seen_records);
}
