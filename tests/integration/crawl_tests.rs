//! Integration tests for the crawler
//!
//! These tests use wiremock to serve a small listing site and run the full
//! crawl cycle end-to-end against it, including resume across runs.

use std::path::Path;
use strata_crawl::checkpoint::open_checkpoint;
use strata_crawl::config::{
    CheckpointBackendKind, Config, CrawlerConfig, ExtractorConfig, OutputConfig, UserAgentConfig,
};
use strata_crawl::crawler::run_crawl;
use strata_crawl::sink::CSV_HEADER;
use strata_crawl::HierarchyNode;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, base_dir: &Path) -> Config {
    Config {
        crawler: CrawlerConfig {
            root_url: format!("{}/US-States/", base_url),
            request_delay_ms: 0,
            request_timeout_secs: 5,
            max_retries: 0,
            retry_delay_ms: 0,
            prefixes: "AB".to_string(),
            download_images: false,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            base_dir: base_dir.display().to_string(),
            checkpoint_file: "scraping_state.json".to_string(),
            checkpoint_backend: CheckpointBackendKind::Json,
        },
        extractor: ExtractorConfig::default(),
    }
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(format!("<html><body>{}</body></html>", body))
        .insert_header("content-type", "text/html")
}

/// Mounts one state (Ohio) with one area (Franklin)
///
/// Prefix A spans two pages and repeats Doe on the second one; prefix B is
/// empty.
async fn mount_ohio_site(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/US-States/"))
        .respond_with(html(r#"<a href="/US-States/Ohio">Ohio</a>"#))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/US-States/Ohio"))
        .respond_with(html(r#"<a href="/US-States/Ohio/Franklin">Franklin</a>"#))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/US-States/Ohio/Franklin"))
        .and(query_param("name_prefix", "A"))
        .respond_with(html(
            r#"<a href="/US-States/Ohio/Franklin/Doe-John.1.html"><div class="label">Doe, John</div></a>
               <a href="/US-States/Ohio/Franklin/Abel-Ann.2.html"><div class="label">Abel, Ann</div></a>
               <a class="next page" href="/listing/ohio-franklin-a-2">Next</a>"#,
        ))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/listing/ohio-franklin-a-2"))
        .respond_with(html(
            r#"<a href="/US-States/Ohio/Franklin/Doe-John.1.html"><div class="label">Doe, John</div></a>
               <a href="/US-States/Ohio/Franklin/Adams-Al.3.html"><div class="label">Adams, Al</div></a>"#,
        ))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/US-States/Ohio/Franklin"))
        .and(query_param("name_prefix", "B"))
        .respond_with(html(""))
        .mount(server)
        .await;
}

fn read_csv(base_dir: &Path) -> Vec<Vec<String>> {
    let path = base_dir.join("Ohio/Franklin/Ohio_Franklin_data.csv");
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(&path)
        .expect("Failed to open output CSV");
    reader
        .records()
        .map(|r| {
            r.expect("Failed to read row")
                .iter()
                .map(str::to_string)
                .collect()
        })
        .collect()
}

#[tokio::test]
async fn test_full_crawl_writes_csv_and_checkpoint() {
    let server = MockServer::start().await;
    mount_ohio_site(&server).await;
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = create_test_config(&server.uri(), dir.path());

    let report = run_crawl(config.clone()).await.expect("Crawl failed");

    assert_eq!(report.records_emitted, 3);
    assert_eq!(report.duplicates_skipped, 1);
    assert_eq!(report.states_completed, 1);

    let rows = read_csv(dir.path());
    assert_eq!(rows[0], CSV_HEADER.map(String::from).to_vec());
    let names: Vec<_> = rows[1..].iter().map(|r| r[0].as_str()).collect();
    assert_eq!(names, vec!["Doe, John", "Abel, Ann", "Adams, Al"]);
    assert_eq!(
        rows[1][1],
        format!("{}/US-States/Ohio/Franklin/Doe-John.1.html", server.uri())
    );
    assert_eq!(rows[1][2], "Ohio");
    assert_eq!(rows[1][3], "Franklin");

    assert!(dir.path().join("scraping_state.json").exists());
    let checkpoint = open_checkpoint(&config).expect("Failed to reopen checkpoint");
    assert!(checkpoint.is_done(&HierarchyNode::state("Ohio")));
    assert!(checkpoint.is_done(&HierarchyNode::area("Ohio", "Franklin")));
    assert!(checkpoint.is_done(&HierarchyNode::prefix("Ohio", "Franklin", 'B')));
    assert_eq!(checkpoint.summary().seen_records, 3);
}

#[tokio::test]
async fn test_second_run_emits_nothing() {
    let server = MockServer::start().await;
    mount_ohio_site(&server).await;
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = create_test_config(&server.uri(), dir.path());

    run_crawl(config.clone()).await.expect("First crawl failed");
    let report = run_crawl(config).await.expect("Second crawl failed");

    assert_eq!(report.records_emitted, 0);
    assert_eq!(report.states_skipped, 1);
    // Only the root listing was needed
    assert_eq!(report.pages_fetched, 1);
    assert_eq!(read_csv(dir.path()).len(), 4);
}

#[tokio::test]
async fn test_corrupt_checkpoint_stops_before_fetching() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(html(""))
        .expect(0) // Should never be called
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = create_test_config(&server.uri(), dir.path());
    std::fs::write(config.checkpoint_path(), "{ not json").expect("Failed to write file");

    let err = run_crawl(config.clone())
        .await
        .expect_err("Crawl should refuse a corrupt checkpoint");
    assert!(err.is_corrupt_state());

    // The unreadable file is left untouched for inspection
    assert_eq!(
        std::fs::read_to_string(config.checkpoint_path()).expect("Failed to read file"),
        "{ not json"
    );
}

#[tokio::test]
async fn test_sqlite_checkpoint_backend() {
    let server = MockServer::start().await;
    mount_ohio_site(&server).await;
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut config = create_test_config(&server.uri(), dir.path());
    config.output.checkpoint_file = "state.db".to_string();
    config.output.checkpoint_backend = CheckpointBackendKind::Sqlite;

    let first = run_crawl(config.clone()).await.expect("First crawl failed");
    let second = run_crawl(config.clone()).await.expect("Second crawl failed");

    assert_eq!(first.records_emitted, 3);
    assert_eq!(second.records_emitted, 0);
    assert!(dir.path().join("state.db").exists());

    let checkpoint = open_checkpoint(&config).expect("Failed to reopen checkpoint");
    assert!(checkpoint.is_done(&HierarchyNode::state("Ohio")));
    assert_eq!(checkpoint.summary().seen_records, 3);
}

#[tokio::test]
async fn test_server_error_is_resumed_on_next_run() {
    let server = MockServer::start().await;

    // First request for prefix B fails; later ones fall through to the site
    Mock::given(method("GET"))
        .and(path("/US-States/Ohio/Franklin"))
        .and(query_param("name_prefix", "B"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_ohio_site(&server).await;

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = create_test_config(&server.uri(), dir.path());

    let first = run_crawl(config.clone()).await.expect("First crawl failed");
    assert_eq!(first.page_failures, 1);
    assert_eq!(first.records_emitted, 3);
    {
        let checkpoint = open_checkpoint(&config).expect("Failed to reopen checkpoint");
        assert!(checkpoint.is_done(&HierarchyNode::prefix("Ohio", "Franklin", 'A')));
        assert!(!checkpoint.is_done(&HierarchyNode::prefix("Ohio", "Franklin", 'B')));
        assert!(!checkpoint.is_done(&HierarchyNode::state("Ohio")));
    }

    let second = run_crawl(config.clone()).await.expect("Second crawl failed");
    assert_eq!(second.page_failures, 0);
    assert_eq!(second.prefixes_skipped, 1);
    assert_eq!(second.prefixes_completed, 1);
    assert_eq!(second.records_emitted, 0);

    let checkpoint = open_checkpoint(&config).expect("Failed to reopen checkpoint");
    assert!(checkpoint.is_done(&HierarchyNode::state("Ohio")));
    assert_eq!(read_csv(dir.path()).len(), 4);
}

#[tokio::test]
async fn test_images_are_downloaded_next_to_csv() {
    let server = MockServer::start().await;
    mount_ohio_site(&server).await;

    // Doe has a photo; the other profiles do not
    Mock::given(method("GET"))
        .and(path("/US-States/Ohio/Franklin/Doe-John.1.html"))
        .respond_with(html(
            r#"<img class="hidden-narrow" itemprop="url" src="/photos/doe.jpg">"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/photos/doe.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xD8, 0xFF, 0xE0]))
        .expect(1)
        .mount(&server)
        .await;
    for profile in [
        "/US-States/Ohio/Franklin/Abel-Ann.2.html",
        "/US-States/Ohio/Franklin/Adams-Al.3.html",
    ] {
        Mock::given(method("GET"))
            .and(path(profile))
            .respond_with(html("<p>No photo</p>"))
            .mount(&server)
            .await;
    }

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut config = create_test_config(&server.uri(), dir.path());
    config.crawler.download_images = true;

    let report = run_crawl(config).await.expect("Crawl failed");

    assert_eq!(report.images_saved, 1);
    assert_eq!(report.images_missing, 2);
    assert_eq!(report.records_emitted, 3);

    let images: Vec<_> = std::fs::read_dir(dir.path().join("Ohio/Franklin"))
        .expect("Failed to list area dir")
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".jpg"))
        .collect();
    assert_eq!(images.len(), 1);
    assert!(images[0].starts_with("Doe_John_"));
    let bytes = std::fs::read(dir.path().join("Ohio/Franklin").join(&images[0]))
        .expect("Failed to read image");
    assert_eq!(bytes, vec![0xFF, 0xD8, 0xFF, 0xE0]);
}
