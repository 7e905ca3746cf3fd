use serde::Deserialize;

/// Main configuration structure for Strata-Crawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Listing page that links to every state
    #[serde(rename = "root-url")]
    pub root_url: String,

    /// Minimum time between two requests (milliseconds)
    #[serde(rename = "request-delay-ms", default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Transport-level retries for 5xx responses and timeouts
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay between transport retries (milliseconds)
    #[serde(rename = "retry-delay-ms", default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Name-prefix buckets walked under every area, in order
    #[serde(default = "default_prefixes")]
    pub prefixes: String,

    /// Whether to download the profile image for every new record
    #[serde(rename = "download-images", default = "default_true")]
    pub download_images: bool,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory holding the checkpoint and every jurisdiction's CSV
    #[serde(rename = "base-dir")]
    pub base_dir: String,

    /// Checkpoint file name, relative to `base_dir`
    #[serde(rename = "checkpoint-file", default = "default_checkpoint_file")]
    pub checkpoint_file: String,

    /// Which checkpoint backend to use
    #[serde(rename = "checkpoint-backend", default)]
    pub checkpoint_backend: CheckpointBackendKind,
}

/// Checkpoint persistence format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointBackendKind {
    #[default]
    Json,
    Sqlite,
}

/// Link patterns and CSS selectors used to read listing pages
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractorConfig {
    /// Regex over the link path identifying a state
    #[serde(rename = "state-link-pattern", default = "default_state_link_pattern")]
    pub state_link_pattern: String,

    /// Regex over the link path identifying an area within a state
    #[serde(rename = "area-link-pattern", default = "default_area_link_pattern")]
    pub area_link_pattern: String,

    /// Regex over the link path identifying a record profile
    #[serde(rename = "record-link-pattern", default = "default_record_link_pattern")]
    pub record_link_pattern: String,

    /// Selector for the record name, relative to the record link
    #[serde(rename = "record-name-selector", default = "default_record_name_selector")]
    pub record_name_selector: String,

    /// Selector for the pagination link
    #[serde(rename = "next-page-selector", default = "default_next_page_selector")]
    pub next_page_selector: String,

    /// Selector for the image on a profile page
    #[serde(rename = "image-selector", default = "default_image_selector")]
    pub image_selector: String,

    /// Query parameter carrying the name prefix
    #[serde(rename = "prefix-query-param", default = "default_prefix_query_param")]
    pub prefix_query_param: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            state_link_pattern: default_state_link_pattern(),
            area_link_pattern: default_area_link_pattern(),
            record_link_pattern: default_record_link_pattern(),
            record_name_selector: default_record_name_selector(),
            next_page_selector: default_next_page_selector(),
            image_selector: default_image_selector(),
            prefix_query_param: default_prefix_query_param(),
        }
    }
}

fn default_request_delay_ms() -> u64 {
    500
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_prefixes() -> String {
    "ABCDEFGHIJKLMNOPQRSTUVWXYZ".to_string()
}

fn default_true() -> bool {
    true
}

fn default_checkpoint_file() -> String {
    "scraping_state.json".to_string()
}

fn default_state_link_pattern() -> String {
    r"^/US-States/[A-Za-z-]+/?$".to_string()
}

fn default_area_link_pattern() -> String {
    r"^/US-States/[^/]+/[^/]+/?$".to_string()
}

fn default_record_link_pattern() -> String {
    r"\.html$".to_string()
}

fn default_record_name_selector() -> String {
    "div.label".to_string()
}

fn default_next_page_selector() -> String {
    "a.next.page".to_string()
}

fn default_image_selector() -> String {
    "img.hidden-narrow[itemprop='url']".to_string()
}

fn default_prefix_query_param() -> String {
    "name_prefix".to_string()
}
