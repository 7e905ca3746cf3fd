//! Profile image download
//!
//! The image step enriches a record before it is appended. A failure here
//! never blocks the record: it is reported and the record keeps an empty
//! image path.

use crate::crawler::extractor::Extractor;
use crate::crawler::fetcher::{FetchError, HttpFetcher, PageFetcher};
use crate::sink::Record;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Errors from the image step
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Image fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Invalid profile URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Failed to save image to {path}: {source}")]
    Save {
        path: String,
        source: std::io::Error,
    },
}

/// Fetches the image associated with a record
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Downloads the record's image into `dest_dir`
    ///
    /// # Returns
    ///
    /// * `Ok(Some(path))` - Image saved at `path`
    /// * `Ok(None)` - The profile has no image
    /// * `Err(ImageError)` - The profile or image could not be fetched or saved
    async fn fetch_image(&self, record: &Record, dest_dir: &Path)
        -> Result<Option<PathBuf>, ImageError>;

    /// False when the image step is switched off and should be skipped
    fn enabled(&self) -> bool {
        true
    }
}

/// Image step that does nothing, for runs with image downloads disabled
pub struct NoImages;

#[async_trait]
impl ImageFetcher for NoImages {
    fn enabled(&self) -> bool {
        false
    }

    async fn fetch_image(
        &self,
        _record: &Record,
        _dest_dir: &Path,
    ) -> Result<Option<PathBuf>, ImageError> {
        Ok(None)
    }
}

/// Fetches the profile page, finds its image and downloads it
pub struct HttpImageFetcher {
    fetcher: Arc<HttpFetcher>,
    extractor: Arc<Extractor>,
}

impl HttpImageFetcher {
    pub fn new(fetcher: Arc<HttpFetcher>, extractor: Arc<Extractor>) -> Self {
        Self { fetcher, extractor }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch_image(
        &self,
        record: &Record,
        dest_dir: &Path,
    ) -> Result<Option<PathBuf>, ImageError> {
        let profile_url =
            Url::parse(&record.profile_url).map_err(|e| ImageError::InvalidUrl {
                url: record.profile_url.clone(),
                message: e.to_string(),
            })?;

        let profile = self.fetcher.fetch(&profile_url).await?;
        let Some(image_url) = self.extractor.extract_image_url(&profile) else {
            return Ok(None);
        };

        let bytes = self.fetcher.fetch_bytes(&image_url).await?;

        let path = dest_dir.join(image_file_name(&record.name, &record.profile_url));
        let save_err = |source| ImageError::Save {
            path: path.display().to_string(),
            source,
        };
        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(save_err)?;
        tokio::fs::write(&path, &bytes).await.map_err(save_err)?;

        tracing::debug!("Image saved for {}: {}", record.name, path.display());
        Ok(Some(path))
    }
}

/// File name for a record's image: `<CleanName>_<hash8>.jpg`
///
/// `CleanName` keeps word characters, spaces and hyphens, with spaces turned
/// into underscores. `hash8` is derived from the profile URL so two people
/// with the same name never overwrite each other's image.
pub fn image_file_name(name: &str, profile_url: &str) -> String {
    let clean: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();

    let digest = Sha256::digest(profile_url.as_bytes());
    let hash = hex::encode(&digest[..4]);

    if clean.is_empty() {
        format!("{}.jpg", hash)
    } else {
        format!("{}_{}.jpg", clean, hash)
    }
}
