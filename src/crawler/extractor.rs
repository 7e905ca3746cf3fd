//! HTML extraction for listing and profile pages
//!
//! This module turns page bodies into structured data:
//! - State and area links (child nodes of the hierarchy)
//! - Records on a listing page, one result per candidate link
//! - The next-page link of a paginated listing
//! - The image on a profile page
//!
//! Prefix buckets are not discovered from pages; [`Extractor::prefix_url`]
//! builds the first page of a bucket from its area URL.

use crate::checkpoint::Level;
use crate::config::ExtractorConfig;
use crate::crawler::fetcher::Page;
use crate::sink::{Jurisdiction, Record};
use crate::url::{canonicalize_url, resolve_href};
use crate::ConfigError;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

/// A single candidate record could not be extracted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("Profile link {href} on {page} has no name")]
    MissingName { page: String, href: String },

    #[error("Profile link {href} on {page} is not a usable URL: {message}")]
    InvalidUrl {
        page: String,
        href: String,
        message: String,
    },
}

/// A discovered state or area
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildRef {
    pub name: String,
    pub url: Url,
}

/// Everything the orchestrator needs from one listing page
#[derive(Debug)]
pub struct Listing {
    pub records: Vec<Result<Record, ExtractionError>>,
    pub next_page: Option<Url>,
}

/// Compiled link patterns and selectors
pub struct Extractor {
    state_link: Regex,
    area_link: Regex,
    record_link: Regex,
    anchor: Selector,
    record_name: Selector,
    next_page: Selector,
    image: Selector,
    prefix_param: String,
}

impl Extractor {
    /// Compiles the configured patterns and selectors
    pub fn from_config(config: &ExtractorConfig) -> Result<Self, ConfigError> {
        let regex = |field: &str, pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| ConfigError::InvalidPattern(format!("{}: {}", field, e)))
        };
        let selector = |field: &str, css: &str| {
            Selector::parse(css)
                .map_err(|e| ConfigError::InvalidPattern(format!("{}: {}", field, e)))
        };

        Ok(Self {
            state_link: regex("state_link_pattern", &config.state_link_pattern)?,
            area_link: regex("area_link_pattern", &config.area_link_pattern)?,
            record_link: regex("record_link_pattern", &config.record_link_pattern)?,
            anchor: selector("anchor", "a[href]")?,
            record_name: selector("record_name_selector", &config.record_name_selector)?,
            next_page: selector("next_page_selector", &config.next_page_selector)?,
            image: selector("image_selector", &config.image_selector)?,
            prefix_param: config.prefix_query_param.clone(),
        })
    }

    /// Lists the child nodes linked from a page
    ///
    /// `level` is the level of the children: [`Level::State`] reads the root
    /// listing, [`Level::Area`] reads a state page and keeps only links below
    /// that state's path. [`Level::Prefix`] children are generated, not
    /// linked, so nothing is returned for it.
    ///
    /// Links are kept in document order; repeated links are dropped.
    pub fn extract_children(&self, level: Level, page: &Page) -> Vec<ChildRef> {
        let pattern = match level {
            Level::State => &self.state_link,
            Level::Area => &self.area_link,
            Level::Prefix => return Vec::new(),
        };

        let parent_path = format!("{}/", page.url.path().trim_end_matches('/'));
        let document = Html::parse_document(&page.body);
        let mut seen = HashSet::new();
        let mut children = Vec::new();

        for element in document.select(&self.anchor) {
            let Some(url) = element
                .value()
                .attr("href")
                .and_then(|href| resolve_href(href, &page.url))
            else {
                continue;
            };

            if url.host_str() != page.url.host_str() || !pattern.is_match(url.path()) {
                continue;
            }
            if level == Level::Area && !url.path().starts_with(&parent_path) {
                continue;
            }

            let mut url = url;
            url.set_fragment(None);
            if !seen.insert(url.to_string()) {
                continue;
            }

            let name = element_text(&element)
                .or_else(|| name_from_path(&url))
                .unwrap_or_default();
            if name.is_empty() {
                tracing::debug!("Skipping unnamed {} link {}", level, url);
                continue;
            }

            children.push(ChildRef { name, url });
        }

        children
    }

    /// Extracts the records listed on a page
    ///
    /// Each candidate link yields its own result, so one malformed entry does
    /// not hide its siblings.
    pub fn extract_records(
        &self,
        page: &Page,
        jurisdiction: &Jurisdiction,
    ) -> Vec<Result<Record, ExtractionError>> {
        let document = Html::parse_document(&page.body);
        self.records_in(&document, page, jurisdiction)
    }

    /// Finds the link to the next page of a listing
    pub fn extract_next_page(&self, page: &Page) -> Option<Url> {
        let document = Html::parse_document(&page.body);
        self.next_page_in(&document, page)
    }

    /// Reads records and the next-page link with a single parse
    pub fn extract_listing(&self, page: &Page, jurisdiction: &Jurisdiction) -> Listing {
        let document = Html::parse_document(&page.body);
        Listing {
            records: self.records_in(&document, page, jurisdiction),
            next_page: self.next_page_in(&document, page),
        }
    }

    /// Finds the profile image on a profile page
    pub fn extract_image_url(&self, page: &Page) -> Option<Url> {
        let document = Html::parse_document(&page.body);
        document
            .select(&self.image)
            .filter_map(|img| img.value().attr("src").or(img.value().attr("data-src")))
            .find_map(|src| resolve_href(src, &page.url))
    }

    /// First page of a prefix bucket: the area URL with the prefix query set
    pub fn prefix_url(&self, area_url: &Url, prefix: char) -> Url {
        let retained: Vec<(String, String)> = area_url
            .query_pairs()
            .filter(|(key, _)| key != self.prefix_param.as_str())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let mut url = area_url.clone();
        url.set_fragment(None);
        url.query_pairs_mut()
            .clear()
            .extend_pairs(retained)
            .append_pair(&self.prefix_param, &prefix.to_string());
        url
    }

    fn records_in(
        &self,
        document: &Html,
        page: &Page,
        jurisdiction: &Jurisdiction,
    ) -> Vec<Result<Record, ExtractionError>> {
        let mut results = Vec::new();

        for element in document.select(&self.anchor) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let Some(resolved) = resolve_href(href, &page.url) else {
                continue;
            };
            if !self.record_link.is_match(resolved.path()) {
                continue;
            }

            results.push(self.record_from(&element, href, &resolved, page, jurisdiction));
        }

        results
    }

    fn record_from(
        &self,
        element: &ElementRef<'_>,
        href: &str,
        resolved: &Url,
        page: &Page,
        jurisdiction: &Jurisdiction,
    ) -> Result<Record, ExtractionError> {
        let name = element
            .select(&self.record_name)
            .next()
            .and_then(|label| element_text(&label))
            .ok_or_else(|| ExtractionError::MissingName {
                page: page.url.to_string(),
                href: href.to_string(),
            })?;

        let profile_url =
            canonicalize_url(resolved.as_str()).map_err(|e| ExtractionError::InvalidUrl {
                page: page.url.to_string(),
                href: href.to_string(),
                message: e.to_string(),
            })?;

        Ok(Record {
            name,
            profile_url: profile_url.to_string(),
            state_name: jurisdiction.state.clone(),
            area_name: jurisdiction.area.clone(),
            image_path: None,
        })
    }

    fn next_page_in(&self, document: &Html, page: &Page) -> Option<Url> {
        document
            .select(&self.next_page)
            .filter_map(|a| a.value().attr("href"))
            .find_map(|href| resolve_href(href, &page.url))
    }
}

/// Text content of an element with whitespace collapsed
fn element_text(element: &ElementRef<'_>) -> Option<String> {
    let text = element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ");
    (!text.is_empty()).then_some(text)
}

/// Fallback name: last path segment with hyphens as spaces
fn name_from_path(url: &Url) -> Option<String> {
    url.path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .map(|s| s.replace('-', " "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> Extractor {
        Extractor::from_config(&ExtractorConfig::default()).unwrap()
    }

    fn page(url: &str, body: &str) -> Page {
        Page {
            url: Url::parse(url).unwrap(),
            body: body.to_string(),
        }
    }

    fn ohio_franklin() -> Jurisdiction {
        Jurisdiction::new("Ohio", "Franklin")
    }

    #[test]
    fn test_state_links() {
        let root = page(
            "https://example.com/US-States/",
            r#"<html><body>
                <a href="/US-States/Ohio">Ohio</a>
                <a href="/US-States/New-York/">New York</a>
                <a href="/US-States/Ohio">Ohio again</a>
                <a href="/US-States/Ohio/Franklin">Franklin</a>
                <a href="/about">About</a>
                <a href="https://other.com/US-States/Texas">Texas elsewhere</a>
            </body></html>"#,
        );

        let states = extractor().extract_children(Level::State, &root);
        let names: Vec<_> = states.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Ohio", "New York"]);
        assert_eq!(
            states[1].url.as_str(),
            "https://example.com/US-States/New-York/"
        );
    }

    #[test]
    fn test_area_links_stay_under_state() {
        let state = page(
            "https://example.com/US-States/Ohio",
            r#"<html><body>
                <a href="/US-States/Ohio/Franklin"> Franklin
                    County </a>
                <a href="/US-States/Ohio/Unsorted">Unsorted</a>
                <a href="/US-States/Ohio/Lake-Erie-District"></a>
                <a href="/US-States/Texas/Harris">Harris</a>
                <a href="/US-States/Ohio">Ohio</a>
            </body></html>"#,
        );

        let areas = extractor().extract_children(Level::Area, &state);
        let names: Vec<_> = areas.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Franklin County", "Unsorted", "Lake Erie District"]);
    }

    #[test]
    fn test_area_names_with_punctuation_and_digits() {
        let state = page(
            "https://example.com/US-States/Missouri",
            r#"<html><body>
                <a href="/US-States/Missouri/Greene-County-MO">Greene County</a>
                <a href="/US-States/Missouri/St.-Louis-County-MO">St. Louis County</a>
                <a href="/US-States/Missouri/Prince-George's">Prince George's</a>
                <a href="/US-States/Missouri/District-1/">District 1</a>
                <a href="/US-States/Missouri/Greene-County-MO/Doe-John.1.html">Doe, John</a>
            </body></html>"#,
        );

        let areas = extractor().extract_children(Level::Area, &state);
        let names: Vec<_> = areas.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Greene County",
                "St. Louis County",
                "Prince George's",
                "District 1"
            ]
        );
        assert_eq!(
            areas[1].url.as_str(),
            "https://example.com/US-States/Missouri/St.-Louis-County-MO"
        );
    }

    #[test]
    fn test_prefix_children_are_not_extracted() {
        let area = page(
            "https://example.com/US-States/Ohio/Franklin",
            r#"<a href="/US-States/Ohio/Franklin?name_prefix=A">A</a>"#,
        );
        assert!(extractor().extract_children(Level::Prefix, &area).is_empty());
    }

    #[test]
    fn test_records_and_errors_are_per_item() {
        let listing = page(
            "https://example.com/US-States/Ohio/Franklin?name_prefix=A",
            r#"<html><body>
                <a href="/US-States/Ohio/Franklin/Doe-John.1.html"><div class="label"> Doe, John </div></a>
                <a href="/US-States/Ohio/Franklin/Nameless.2.html"><img src="x.jpg"></a>
                <a href="/US-States/Ohio/Franklin/Roe-Jane.3.html#photo"><div class="label">Roe, Jane</div></a>
                <a href="/US-States/Ohio/Franklin?name_prefix=B">B</a>
            </body></html>"#,
        );

        let results = extractor().extract_records(&listing, &ohio_franklin());
        assert_eq!(results.len(), 3);

        let first = results[0].as_ref().unwrap();
        assert_eq!(first.name, "Doe, John");
        assert_eq!(
            first.profile_url,
            "https://example.com/US-States/Ohio/Franklin/Doe-John.1.html"
        );
        assert_eq!(first.state_name, "Ohio");
        assert_eq!(first.area_name, "Franklin");

        assert!(matches!(
            results[1],
            Err(ExtractionError::MissingName { .. })
        ));

        let third = results[2].as_ref().unwrap();
        assert_eq!(
            third.profile_url,
            "https://example.com/US-States/Ohio/Franklin/Roe-Jane.3.html"
        );
    }

    #[test]
    fn test_next_page() {
        let listing = page(
            "https://example.com/US-States/Ohio/Franklin?name_prefix=A",
            r#"<html><body>
                <a class="prev page" href="?name_prefix=A&page=0">Prev</a>
                <a class="next page" href="/US-States/Ohio/Franklin?name_prefix=A&page=2">Next</a>
            </body></html>"#,
        );
        assert_eq!(
            extractor().extract_next_page(&listing).unwrap().as_str(),
            "https://example.com/US-States/Ohio/Franklin?name_prefix=A&page=2"
        );

        let last = page("https://example.com/x", "<html><body></body></html>");
        assert!(extractor().extract_next_page(&last).is_none());
    }

    #[test]
    fn test_extract_listing_matches_individual_calls() {
        let listing = page(
            "https://example.com/US-States/Ohio/Franklin?name_prefix=A",
            r#"<a href="/p/1.html"><div class="label">One</div></a>
               <a class="next page" href="?name_prefix=A&page=2">Next</a>"#,
        );
        let ex = extractor();
        let combined = ex.extract_listing(&listing, &ohio_franklin());
        assert_eq!(
            combined.records,
            ex.extract_records(&listing, &ohio_franklin())
        );
        assert_eq!(combined.next_page, ex.extract_next_page(&listing));
    }

    #[test]
    fn test_image_url() {
        let profile = page(
            "https://example.com/US-States/Ohio/Franklin/Doe-John.1.html",
            r#"<html><body>
                <img class="logo" src="/logo.png">
                <img class="hidden-narrow" itemprop="url" src="https://img.example.com/doe.jpg">
            </body></html>"#,
        );
        assert_eq!(
            extractor().extract_image_url(&profile).unwrap().as_str(),
            "https://img.example.com/doe.jpg"
        );

        let bare = page("https://example.com/p.html", "<img src='/a.jpg'>");
        assert!(extractor().extract_image_url(&bare).is_none());
    }

    #[test]
    fn test_prefix_url() {
        let ex = extractor();
        let area = Url::parse("https://example.com/US-States/Ohio/Franklin").unwrap();
        assert_eq!(
            ex.prefix_url(&area, 'M').as_str(),
            "https://example.com/US-States/Ohio/Franklin?name_prefix=M"
        );

        let with_query =
            Url::parse("https://example.com/US-States/Ohio/Franklin?name_prefix=A&sort=name")
                .unwrap();
        assert_eq!(
            ex.prefix_url(&with_query, 'B').as_str(),
            "https://example.com/US-States/Ohio/Franklin?sort=name&name_prefix=B"
        );
    }
}
