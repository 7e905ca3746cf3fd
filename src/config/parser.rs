use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Values given on the command line that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Replaces `[output] base-dir`; the checkpoint and every CSV move with it
    pub base_dir: Option<PathBuf>,
}

/// Parses configuration text, applies overrides, then validates the result
///
/// Overrides are applied before validation so an overridden base directory
/// gets the same checks as one read from the file.
pub fn parse_config(content: &str, overrides: &ConfigOverrides) -> Result<Config, ConfigError> {
    let mut config: Config = toml::from_str(content)?;

    if let Some(base_dir) = &overrides.base_dir {
        config.output.base_dir = base_dir
            .to_str()
            .ok_or_else(|| {
                ConfigError::Validation(format!(
                    "base_dir override is not valid UTF-8: {}",
                    base_dir.display()
                ))
            })?
            .to_string();
    }

    validate(&config)?;
    Ok(config)
}

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use strata_crawl::config::load_config;
///
/// let config = load_config(Path::new("config.toml")).unwrap();
/// println!("Base directory: {}", config.output.base_dir);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let (config, _) = load_config_with_overrides(path, &ConfigOverrides::default())?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so that runs sharing one checkpoint can be matched to
/// the configuration that produced them.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(hash_content(&content))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    load_config_with_overrides(path, &ConfigOverrides::default())
}

/// Loads a configuration with command-line overrides applied
///
/// The file is read once; the returned hash covers exactly the text that was
/// parsed, not the overrides.
///
/// # Returns
///
/// * `Ok((Config, String))` - Validated configuration and the file's hash
/// * `Err(ConfigError)` - Failed to read, parse or validate
pub fn load_config_with_overrides(
    path: &Path,
    overrides: &ConfigOverrides,
) -> Result<(Config, String), ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content, overrides)?;
    Ok((config, hash_content(&content)))
}

fn hash_content(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}
