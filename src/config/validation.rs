use crate::config::types::{Config, CrawlerConfig, ExtractorConfig, OutputConfig, UserAgentConfig};
use crate::ConfigError;
use regex::Regex;
use scraper::Selector;
use std::collections::HashSet;
use std::path::{Component, Path};
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_extractor_config(&config.extractor)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    let root = Url::parse(&config.root_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid root_url: {}", e)))?;

    if root.scheme() != "http" && root.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "root_url must use http or https, got '{}'",
            root.scheme()
        )));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    validate_prefixes(&config.prefixes)
}

/// Validates the prefix alphabet: non-empty, alphanumeric, no repeats
fn validate_prefixes(prefixes: &str) -> Result<(), ConfigError> {
    if prefixes.is_empty() {
        return Err(ConfigError::Validation(
            "prefixes cannot be empty".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for c in prefixes.chars() {
        if !c.is_ascii_alphanumeric() {
            return Err(ConfigError::Validation(format!(
                "prefixes must be ASCII letters or digits, got '{}'",
                c
            )));
        }
        if !seen.insert(c) {
            return Err(ConfigError::Validation(format!(
                "prefix '{}' is listed more than once",
                c
            )));
        }
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.base_dir.is_empty() {
        return Err(ConfigError::Validation(
            "base_dir cannot be empty".to_string(),
        ));
    }

    if Path::new(&config.base_dir).is_file() {
        return Err(ConfigError::Validation(format!(
            "base_dir '{}' exists and is not a directory",
            config.base_dir
        )));
    }

    if config.checkpoint_file.is_empty() {
        return Err(ConfigError::Validation(
            "checkpoint_file cannot be empty".to_string(),
        ));
    }

    // The checkpoint lives directly inside base_dir
    let mut components = Path::new(&config.checkpoint_file).components();
    let is_bare_name = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !is_bare_name {
        return Err(ConfigError::Validation(format!(
            "checkpoint_file must be a plain file name, got '{}'",
            config.checkpoint_file
        )));
    }

    Ok(())
}

/// Validates that every pattern compiles and every selector parses
fn validate_extractor_config(config: &ExtractorConfig) -> Result<(), ConfigError> {
    for (field, pattern) in [
        ("state_link_pattern", &config.state_link_pattern),
        ("area_link_pattern", &config.area_link_pattern),
        ("record_link_pattern", &config.record_link_pattern),
    ] {
        Regex::new(pattern)
            .map_err(|e| ConfigError::InvalidPattern(format!("{}: {}", field, e)))?;
    }

    for (field, selector) in [
        ("record_name_selector", &config.record_name_selector),
        ("next_page_selector", &config.next_page_selector),
        ("image_selector", &config.image_selector),
    ] {
        Selector::parse(selector)
            .map_err(|e| ConfigError::InvalidPattern(format!("{}: {}", field, e)))?;
    }

    if config.prefix_query_param.is_empty() {
        return Err(ConfigError::Validation(
            "prefix_query_param cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
