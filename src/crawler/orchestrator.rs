//! Crawl orchestrator - the resumable traversal state machine
//!
//! The crawl walks four nested levels:
//!
//! ```text
//! State → Area → Prefix → Page
//! ```
//!
//! Every State, Area and Prefix node is checked against the checkpoint before
//! any work and marked done only after all of its children completed. A child
//! that could not complete leaves every ancestor not-done, so the next run
//! retries exactly the unfinished part. Records are deduplicated against the
//! checkpoint's seen-set before they reach the sink, and a record is marked
//! seen only after the sink accepted it.

use crate::checkpoint::{CheckpointStore, HierarchyNode, Level};
use crate::crawler::extractor::{ChildRef, Extractor};
use crate::crawler::fetcher::{Page, PageFetcher};
use crate::crawler::images::ImageFetcher;
use crate::output::CrawlReport;
use crate::sink::{Jurisdiction, Record, RecordSink, SinkError};
use crate::StrataError;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use url::Url;

/// Outcome of crawling one subtree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Completion {
    /// Every child finished; the node may be marked done
    Complete,
    /// Something failed; the node stays eligible for the next run
    Incomplete,
}

/// Drives the traversal and owns the checkpoint and sink for its duration
pub struct Orchestrator {
    fetcher: Arc<dyn PageFetcher>,
    images: Arc<dyn ImageFetcher>,
    extractor: Arc<Extractor>,
    checkpoint: CheckpointStore,
    sink: Box<dyn RecordSink>,
    prefixes: Vec<char>,
    report: CrawlReport,
}

impl Orchestrator {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        images: Arc<dyn ImageFetcher>,
        extractor: Arc<Extractor>,
        checkpoint: CheckpointStore,
        sink: Box<dyn RecordSink>,
        prefixes: Vec<char>,
    ) -> Self {
        Self {
            fetcher,
            images,
            extractor,
            checkpoint,
            sink,
            prefixes,
            report: CrawlReport::default(),
        }
    }

    pub fn checkpoint(&self) -> &CheckpointStore {
        &self.checkpoint
    }

    pub fn into_checkpoint(self) -> CheckpointStore {
        self.checkpoint
    }

    /// Crawls everything reachable from the root listing
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - The traversal finished; unfinished nodes (if any)
    ///   are left for the next run
    /// * `Err(StrataError::TransientFetch)` - The root listing could not be fetched
    /// * `Err(StrataError::Checkpoint)` - Progress could not be persisted
    pub async fn run(&mut self, root_url: &Url) -> Result<CrawlReport, StrataError> {
        self.report = CrawlReport::default();
        let start = Instant::now();

        tracing::info!("Fetching root listing {}", root_url);
        let root = self.fetcher.fetch(root_url).await?;
        self.report.pages_fetched += 1;

        let states = self.extractor.extract_children(Level::State, &root);
        tracing::info!("Found {} states to crawl", states.len());

        for state in &states {
            let node = HierarchyNode::state(&state.name);
            if self.checkpoint.is_done(&node) {
                tracing::info!("Skipping already crawled state: {}", state.name);
                self.report.states_skipped += 1;
                continue;
            }

            match self.crawl_state(state).await? {
                Completion::Complete => {
                    self.checkpoint.mark_done(&node)?;
                    self.report.states_completed += 1;
                    tracing::info!("Completed state: {}", state.name);
                }
                Completion::Incomplete => {
                    tracing::warn!(
                        "State {} is incomplete and will be resumed on the next run",
                        state.name
                    );
                }
            }
        }

        self.checkpoint.flush()?;
        self.report.elapsed = start.elapsed();
        Ok(self.report.clone())
    }

    async fn crawl_state(&mut self, state: &ChildRef) -> Result<Completion, StrataError> {
        tracing::info!("Crawling state: {} ({})", state.name, state.url);

        let page = match self.fetch_page(&state.url).await {
            Some(page) => page,
            None => return Ok(Completion::Incomplete),
        };

        let areas = self.extractor.extract_children(Level::Area, &page);
        if areas.is_empty() {
            tracing::warn!("No areas found for state {}", state.name);
        } else {
            tracing::info!("Found {} areas in {}", areas.len(), state.name);
        }

        let mut completion = Completion::Complete;
        for area in &areas {
            let node = HierarchyNode::area(&state.name, &area.name);
            if self.checkpoint.is_done(&node) {
                tracing::debug!("Skipping already crawled area: {}/{}", state.name, area.name);
                self.report.areas_skipped += 1;
                continue;
            }

            match self.crawl_area(&state.name, area).await? {
                Completion::Complete => {
                    self.checkpoint.mark_done(&node)?;
                    self.report.areas_completed += 1;
                    tracing::info!("Completed area: {}/{}", state.name, area.name);
                }
                Completion::Incomplete => completion = Completion::Incomplete,
            }
        }

        Ok(completion)
    }

    async fn crawl_area(
        &mut self,
        state_name: &str,
        area: &ChildRef,
    ) -> Result<Completion, StrataError> {
        let jurisdiction = Jurisdiction::new(state_name, &area.name);
        tracing::info!("Crawling area: {} ({})", jurisdiction, area.url);

        if let Err(e) = self.reconcile(&jurisdiction) {
            tracing::error!("Cannot read existing output for {}: {}", jurisdiction, e);
            return Ok(Completion::Incomplete);
        }
        self.checkpoint.flush()?;

        let mut completion = Completion::Complete;
        for prefix in self.prefixes.clone() {
            let node = HierarchyNode::prefix(state_name, &area.name, prefix);
            if self.checkpoint.is_done(&node) {
                tracing::debug!("Skipping already crawled prefix: {} {}", jurisdiction, prefix);
                self.report.prefixes_skipped += 1;
                continue;
            }

            match self.crawl_prefix(&jurisdiction, &area.url, prefix).await? {
                Completion::Complete => {
                    self.checkpoint.mark_done(&node)?;
                    self.report.prefixes_completed += 1;
                }
                Completion::Incomplete => {
                    tracing::warn!(
                        "Prefix {} of {} is incomplete and will be retried on the next run",
                        prefix,
                        jurisdiction
                    );
                    completion = Completion::Incomplete;
                }
            }
        }

        Ok(completion)
    }

    /// Walks every page of one prefix bucket
    async fn crawl_prefix(
        &mut self,
        jurisdiction: &Jurisdiction,
        area_url: &Url,
        prefix: char,
    ) -> Result<Completion, StrataError> {
        let mut next = Some(self.extractor.prefix_url(area_url, prefix));
        let mut visited = HashSet::new();

        while let Some(url) = next.take() {
            if !visited.insert(url.to_string()) {
                tracing::warn!("Pagination loops back to {}, stopping", url);
                break;
            }

            tracing::debug!("Scraping {} prefix {}: {}", jurisdiction, prefix, url);
            let page = match self.fetch_page(&url).await {
                Some(page) => page,
                None => return Ok(Completion::Incomplete),
            };

            match self.emit_page(&page, jurisdiction).await {
                Ok(next_page) => next = next_page,
                Err(StrataError::Persist(e)) => {
                    tracing::error!("Failed to write records for {}: {}", jurisdiction, e);
                    return Ok(Completion::Incomplete);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(Completion::Complete)
    }

    /// Emits the new records of one listing page and returns its next link
    ///
    /// Order matters for crash safety: images, then the sink append, then
    /// mark-seen, then one checkpoint flush for the page.
    async fn emit_page(
        &mut self,
        page: &Page,
        jurisdiction: &Jurisdiction,
    ) -> Result<Option<Url>, StrataError> {
        let listing = self.extractor.extract_listing(page, jurisdiction);

        let mut batch: Vec<Record> = Vec::new();
        let mut batch_keys = HashSet::new();
        for result in listing.records {
            match result {
                Ok(record) => {
                    if self.checkpoint.has_seen(record.key())
                        || !batch_keys.insert(record.key().to_string())
                    {
                        tracing::trace!("Already seen: {}", record.key());
                        self.report.duplicates_skipped += 1;
                        continue;
                    }
                    batch.push(record);
                }
                Err(e) => {
                    tracing::debug!("Skipping item: {}", e);
                    self.report.extraction_errors += 1;
                }
            }
        }

        tracing::debug!("{} new records on {}", batch.len(), page.url);

        if !batch.is_empty() {
            let dir = self.sink.jurisdiction_dir(jurisdiction);
            self.attach_images(&mut batch, &dir).await;

            self.sink
                .append(jurisdiction, &batch)
                .map_err(StrataError::Persist)?;

            for record in &batch {
                self.checkpoint.mark_seen(record.key());
            }
            self.report.records_emitted += batch.len();
        }

        self.checkpoint.flush()?;
        Ok(listing.next_page)
    }

    async fn attach_images(&mut self, batch: &mut [Record], dir: &Path) {
        if !self.images.enabled() {
            return;
        }

        for record in batch.iter_mut() {
            match self.images.fetch_image(record, dir).await {
                Ok(Some(path)) => {
                    record.image_path = Some(path);
                    self.report.images_saved += 1;
                }
                Ok(None) => {
                    tracing::warn!("No image found for {} ({})", record.name, record.key());
                    self.report.images_missing += 1;
                }
                Err(e) => {
                    tracing::warn!("Image download failed for {}: {}", record.name, e);
                    self.report.images_missing += 1;
                }
            }
        }
    }

    /// Marks records already present in the jurisdiction's output as seen
    ///
    /// A crash between a sink append and the following checkpoint flush
    /// leaves rows on disk whose keys were never persisted as seen.
    fn reconcile(&mut self, jurisdiction: &Jurisdiction) -> Result<(), SinkError> {
        let mut recovered = 0;
        for key in self.sink.recorded_keys(jurisdiction)? {
            if self.checkpoint.mark_seen(&key) {
                recovered += 1;
            }
        }

        if recovered > 0 {
            tracing::warn!(
                "Recovered {} records in {} written before the last checkpoint flush",
                recovered,
                jurisdiction
            );
            self.report.records_recovered += recovered;
        }
        Ok(())
    }

    /// Fetches a page, logging and counting failures
    async fn fetch_page(&mut self, url: &Url) -> Option<Page> {
        match self.fetcher.fetch(url).await {
            Ok(page) => {
                self.report.pages_fetched += 1;
                Some(page)
            }
            Err(e) => {
                tracing::warn!("{}", e);
                self.report.page_failures += 1;
                None
            }
        }
    }
}
