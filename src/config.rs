//! Configuration Module
//!
//! Handles loading and managing worker and proxy configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default name of the current cache generation.
pub const DEFAULT_CACHE_NAME: &str = "cag-cache-v1";

/// Default entry lifetime: 30 days.
pub const DEFAULT_CACHE_TIMEOUT_SECONDS: u64 = 30 * 24 * 60 * 60;

/// Directory holding persisted cache generations when `CACHE_DIR` is unset.
pub const DEFAULT_CACHE_DIR: &str = ".asset_cache";

/// Schemes whose requests are never written to the cache.
pub const DEFAULT_UNSUPPORTED_SCHEMES: [&str; 5] = [
    "chrome-extension:",
    "moz-extension:",
    "ms-browser-extension:",
    "about:",
    "data:",
];

/// A directory listing scanned during install, and the extension looked for in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleSource {
    /// Listing path, e.g. `/static/css/`
    pub directory: String,
    /// Extension without the dot, e.g. `css`
    pub extension: String,
}

impl BundleSource {
    pub fn new(directory: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            extension: extension.into(),
        }
    }

    /// Parses `dir:ext` pairs separated by commas, skipping malformed items.
    fn parse_list(raw: &str) -> Vec<Self> {
        raw.split(',')
            .filter_map(|item| {
                let (directory, extension) = item.trim().rsplit_once(':')?;
                if directory.is_empty() || extension.is_empty() {
                    return None;
                }
                Some(Self::new(directory, extension))
            })
            .collect()
    }

    fn defaults() -> Vec<Self> {
        vec![
            Self::new("/static/css/", "css"),
            Self::new("/static/js/", "js"),
        ]
    }
}

/// Worker and proxy configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Name of the current cache generation; changing it invalidates every older generation
    pub cache_generation_name: String,
    /// Entry lifetime in seconds, 0 disables expiry
    pub cache_timeout_seconds: u64,
    /// URL schemes that are never cached
    pub unsupported_schemes: Vec<String>,
    /// Listings scanned for the latest bundles during install
    pub bundle_sources: Vec<BundleSource>,
    /// Origin the proxy forwards to and treats as same-origin
    pub origin: String,
    /// HTTP server port
    pub server_port: u16,
    /// Maximum number of entries per generation
    pub max_entries: usize,
    /// Maximum body size of a single entry in bytes
    pub max_entry_bytes: usize,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
    /// Timeout for a single network fetch in seconds
    pub fetch_timeout: u64,
    /// Root directory of the persistent store, None keeps generations in memory
    pub cache_dir: Option<PathBuf>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_NAME` - Current generation name (default: cag-cache-v1)
    /// - `CACHE_TIMEOUT_SECONDS` - Entry lifetime (default: 2592000)
    /// - `UNSUPPORTED_SCHEMES` - Comma separated schemes (default: extension, about and data schemes)
    /// - `BUNDLE_SOURCES` - Comma separated `dir:ext` pairs (default: /static/css/:css,/static/js/:js)
    /// - `ORIGIN` - Upstream origin (default: http://127.0.0.1:8080)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `MAX_ENTRIES` - Entries per generation (default: 1000)
    /// - `MAX_ENTRY_BYTES` - Body size per entry (default: 10 MiB)
    /// - `CLEANUP_INTERVAL` - Expiry sweep frequency in seconds (default: 60)
    /// - `FETCH_TIMEOUT` - Network timeout in seconds (default: 30)
    /// - `CACHE_DIR` - Persistent store root (default: .asset_cache, empty keeps the store in memory)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            cache_generation_name: env::var("CACHE_NAME")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.cache_generation_name),
            cache_timeout_seconds: parse_var("CACHE_TIMEOUT_SECONDS")
                .unwrap_or(defaults.cache_timeout_seconds),
            unsupported_schemes: env::var("UNSUPPORTED_SCHEMES")
                .ok()
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_ascii_lowercase())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.unsupported_schemes),
            bundle_sources: env::var("BUNDLE_SOURCES")
                .ok()
                .map(|v| BundleSource::parse_list(&v))
                .filter(|sources| !sources.is_empty())
                .unwrap_or(defaults.bundle_sources),
            origin: env::var("ORIGIN").unwrap_or(defaults.origin),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            max_entries: parse_var("MAX_ENTRIES").unwrap_or(defaults.max_entries),
            max_entry_bytes: parse_var("MAX_ENTRY_BYTES").unwrap_or(defaults.max_entry_bytes),
            cleanup_interval: parse_var("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
            fetch_timeout: parse_var("FETCH_TIMEOUT").unwrap_or(defaults.fetch_timeout),
            cache_dir: cache_dir_from(env::var("CACHE_DIR").ok()),
        }
    }

    /// Entry lifetime, or None when expiry is disabled.
    pub fn cache_timeout(&self) -> Option<Duration> {
        (self.cache_timeout_seconds > 0).then(|| Duration::from_secs(self.cache_timeout_seconds))
    }
}

fn cache_dir_from(raw: Option<String>) -> Option<PathBuf> {
    match raw {
        None => Some(PathBuf::from(DEFAULT_CACHE_DIR)),
        Some(v) if v.trim().is_empty() => None,
        Some(v) => Some(PathBuf::from(v.trim())),
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_generation_name: DEFAULT_CACHE_NAME.to_string(),
            cache_timeout_seconds: DEFAULT_CACHE_TIMEOUT_SECONDS,
            unsupported_schemes: DEFAULT_UNSUPPORTED_SCHEMES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            bundle_sources: BundleSource::defaults(),
            origin: "http://127.0.0.1:8080".to_string(),
            server_port: 3000,
            max_entries: 1000,
            max_entry_bytes: 10 * 1024 * 1024,
            cleanup_interval: 60,
            fetch_timeout: 30,
            cache_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.cache_generation_name, "cag-cache-v1");
        assert_eq!(config.cache_timeout_seconds, 2_592_000);
        assert_eq!(config.unsupported_schemes.len(), 5);
        assert!(config.unsupported_schemes.contains(&"data:".to_string()));
        assert_eq!(config.bundle_sources.len(), 2);
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.cleanup_interval, 60);
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        for name in [
            "CACHE_NAME",
            "CACHE_TIMEOUT_SECONDS",
            "UNSUPPORTED_SCHEMES",
            "BUNDLE_SOURCES",
            "ORIGIN",
            "SERVER_PORT",
            "MAX_ENTRIES",
        ] {
            env::remove_var(name);
        }

        let config = Config::from_env();
        assert_eq!(config.cache_generation_name, DEFAULT_CACHE_NAME);
        assert_eq!(config.origin, "http://127.0.0.1:8080");
        assert_eq!(config.max_entries, 1000);
        assert_eq!(config.bundle_sources, BundleSource::defaults());
    }

    #[test]
    fn test_cache_timeout_zero_disables_expiry() {
        let config = Config {
            cache_timeout_seconds: 0,
            ..Config::default()
        };
        assert!(config.cache_timeout().is_none());
        assert_eq!(
            Config::default().cache_timeout(),
            Some(Duration::from_secs(DEFAULT_CACHE_TIMEOUT_SECONDS))
        );
    }

    #[test]
    fn test_cache_dir_selection() {
        assert_eq!(cache_dir_from(None), Some(PathBuf::from(DEFAULT_CACHE_DIR)));
        assert_eq!(cache_dir_from(Some("  ".to_string())), None);
        assert_eq!(
            cache_dir_from(Some("/var/cache/assets".to_string())),
            Some(PathBuf::from("/var/cache/assets"))
        );
        assert!(Config::default().cache_dir.is_none());
    }

    #[test]
    fn test_bundle_source_parse_list() {
        let sources = BundleSource::parse_list("/assets/css/:css, /assets/js/:mjs,broken");
        assert_eq!(
            sources,
            vec![
                BundleSource::new("/assets/css/", "css"),
                BundleSource::new("/assets/js/", "mjs"),
            ]
        );
    }
}
