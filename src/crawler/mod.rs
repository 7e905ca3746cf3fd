//! Crawler module for fetching, extraction and traversal
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with politeness delay and retry logic
//! - HTML extraction of hierarchy links, records and pagination
//! - Optional profile image download
//! - The resumable traversal that ties them to the checkpoint and sink

mod extractor;
mod fetcher;
mod images;
mod orchestrator;

pub use crate::output::CrawlReport;
pub use extractor::{ChildRef, ExtractionError, Extractor, Listing};
pub use fetcher::{
    build_http_client, user_agent_string, FetchError, FetchResult, HttpFetcher, Page, PageFetcher,
};
pub use images::{image_file_name, HttpImageFetcher, ImageError, ImageFetcher, NoImages};
pub use orchestrator::Orchestrator;

use crate::checkpoint::open_checkpoint;
use crate::config::Config;
use crate::sink::CsvRecordSink;
use crate::StrataError;
use std::sync::Arc;
use url::Url;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Load the checkpoint (before any network access)
/// 2. Compile the extractor and build the HTTP client
/// 3. Walk the hierarchy from the root listing, resuming where the
///    checkpoint left off
///
/// # Arguments
///
/// * `config` - The crawler configuration
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Crawl finished; failed subtrees are left for the next run
/// * `Err(StrataError)` - Crawl could not start or progress could not be saved
pub async fn run_crawl(config: Config) -> Result<CrawlReport, StrataError> {
    let checkpoint = open_checkpoint(&config)?;
    let root_url = Url::parse(&config.crawler.root_url)?;

    let extractor = Arc::new(Extractor::from_config(&config.extractor)?);
    let http = Arc::new(HttpFetcher::from_config(
        &config.crawler,
        &config.user_agent,
    )?);

    let images: Arc<dyn ImageFetcher> = if config.crawler.download_images {
        Arc::new(HttpImageFetcher::new(Arc::clone(&http), Arc::clone(&extractor)))
    } else {
        tracing::info!("Image download disabled");
        Arc::new(NoImages)
    };

    let sink = CsvRecordSink::new(&config.output.base_dir);
    tracing::info!("Writing records under {}", sink.base_dir().display());

    let mut orchestrator = Orchestrator::new(
        http,
        images,
        extractor,
        checkpoint,
        Box::new(sink),
        config.prefixes(),
    );

    let report = orchestrator.run(&root_url).await?;
    tracing::info!(
        "Crawl finished: {} records emitted, {} duplicates skipped, {} page failures",
        report.records_emitted,
        report.duplicates_skipped,
        report.page_failures
    );
    Ok(report)
}
