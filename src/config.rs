use std::env;
use std::path::PathBuf;

use crate::error::{DownloadError, Result};

pub const DEFAULT_API_BASE_URL: &str = "https://lovable-api.com";
pub const DEFAULT_COMPRESSION_LEVEL: i64 = 6;

const ENV_API_BASE_URL: &str = "PROJECT_DOWNLOADER_API_BASE_URL";
const ENV_USER_AGENT: &str = "PROJECT_DOWNLOADER_USER_AGENT";
const ENV_COMPRESSION_LEVEL: &str = "PROJECT_DOWNLOADER_COMPRESSION_LEVEL";
const ENV_OUTPUT_DIR: &str = "PROJECT_DOWNLOADER_OUTPUT_DIR";

/// Runtime settings for fetching and saving projects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloaderConfig {
    /// Base URL of the project API
    pub api_base_url: String,
    pub user_agent: String,
    /// Deflate level used for archives (0-9)
    pub compression_level: i64,
    /// Where emitted files are written
    pub output_dir: PathBuf,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            user_agent: concat!("project-downloader/", env!("CARGO_PKG_VERSION")).to_string(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            output_dir: PathBuf::from("."),
        }
    }
}

impl DownloaderConfig {
    /// Defaults overlaid with `PROJECT_DOWNLOADER_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_API_BASE_URL) {
            config.api_base_url = url;
        }
        if let Some(agent) = lookup(ENV_USER_AGENT) {
            config.user_agent = agent;
        }
        if let Some(level) = lookup(ENV_COMPRESSION_LEVEL) {
            config.compression_level =
                level.trim().parse().map_err(|_| DownloadError::InvalidConfig {
                    message: format!("{} must be an integer, got {:?}", ENV_COMPRESSION_LEVEL, level),
                })?;
        }
        if let Some(dir) = lookup(ENV_OUTPUT_DIR) {
            config.output_dir = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.api_base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(DownloadError::InvalidConfig {
                message: format!("api base url must be http(s), got {:?}", self.api_base_url),
            });
        }
        if !(0..=9).contains(&self.compression_level) {
            return Err(DownloadError::InvalidConfig {
                message: format!(
                    "compression level must be within 0..=9, got {}",
                    self.compression_level
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = DownloaderConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, DownloaderConfig::default());
        assert_eq!(config.compression_level, 6);
    }

    #[test]
    fn test_overrides() {
        let config = DownloaderConfig::from_lookup(lookup(&[
            (ENV_API_BASE_URL, "http://localhost:8080"),
            (ENV_COMPRESSION_LEVEL, "9"),
            (ENV_OUTPUT_DIR, "/tmp/out"),
        ]))
        .unwrap();

        assert_eq!(config.api_base_url, "http://localhost:8080");
        assert_eq!(config.compression_level, 9);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            DownloaderConfig::from_lookup(lookup(&[(ENV_COMPRESSION_LEVEL, "12")])),
            Err(DownloadError::InvalidConfig { .. })
        ));
        assert!(matches!(
            DownloaderConfig::from_lookup(lookup(&[(ENV_COMPRESSION_LEVEL, "fast")])),
            Err(DownloadError::InvalidConfig { .. })
        ));
        assert!(matches!(
            DownloaderConfig::from_lookup(lookup(&[(ENV_API_BASE_URL, "ftp://x")])),
            Err(DownloadError::InvalidConfig { .. })
        ));
    }
}
