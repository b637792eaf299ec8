//! Runtime configuration
//!
//! Resolves the backend base URL, cache TTL and session file location from CLI
//! flags, environment variables and defaults, in that order of precedence.
//! clap handles the flag/env part; this module supplies the defaults and
//! normalization.

use std::path::PathBuf;

use chrono::Duration;

use crate::cache::DEFAULT_TTL_MINUTES;
use crate::storage::FileStore;

/// Backend address used when nothing else is configured
pub const DEFAULT_API_URL: &str = "http://localhost:8001/api/v1";

/// Environment variable overriding the backend base URL
pub const API_URL_ENV: &str = "CYBERSHIELD_API_URL";

/// Environment variable overriding the session file location
pub const SESSION_FILE_ENV: &str = "CYBERSHIELD_SESSION_FILE";

/// Environment variable holding the `tracing` filter directive
pub const LOG_ENV: &str = "CYBERSHIELD_LOG";

/// Resolved runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL without a trailing slash; every API path is relative to it
    pub api_url: String,
    /// How long GET responses stay in the response cache
    pub cache_ttl: Duration,
    /// Where the session is persisted; `None` keeps it in memory only
    pub storage_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            cache_ttl: Duration::minutes(DEFAULT_TTL_MINUTES),
            storage_path: FileStore::default_path(),
        }
    }
}

impl Config {
    /// Builds a configuration from already-resolved flag values
    ///
    /// # Arguments
    /// * `api_url` - Base URL from `--api-url` / `CYBERSHIELD_API_URL`, if any
    /// * `session_file` - Path from `--session-file` / `CYBERSHIELD_SESSION_FILE`, if any
    pub fn resolve(api_url: Option<&str>, session_file: Option<PathBuf>) -> Self {
        let defaults = Self::default();
        let api_url = api_url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(normalize_url)
            .unwrap_or(defaults.api_url);

        Self {
            api_url,
            cache_ttl: defaults.cache_ttl,
            storage_path: session_file.or(defaults.storage_path),
        }
    }
}

/// Trims trailing slashes so paths can always be appended with a leading `/`
fn normalize_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api_url, "http://localhost:8001/api/v1");
        assert_eq!(config.cache_ttl, Duration::minutes(5));
    }

    #[test]
    fn test_resolve_prefers_given_url() {
        let config = Config::resolve(Some("https://intel.example.com/api/v1/"), None);
        assert_eq!(config.api_url, "https://intel.example.com/api/v1");
    }

    #[test]
    fn test_resolve_blank_url_falls_back() {
        let config = Config::resolve(Some("   "), None);
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_resolve_session_file_override() {
        let config = Config::resolve(None, Some(PathBuf::from("/tmp/session.json")));
        assert_eq!(config.storage_path, Some(PathBuf::from("/tmp/session.json")));
    }
}
