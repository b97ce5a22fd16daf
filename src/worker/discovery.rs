//! Bundle Discovery
//!
//! Finds the newest content-hashed bundle (`bundle.<hex>.<ext>`) by scanning
//! a directory listing served by the origin.

use std::sync::Arc;

use regex::Regex;
use tracing::{error, info, warn};
use url::Url;

use crate::error::{CacheError, Result};
use crate::fetch::{CacheMode, FetchRequest, Fetcher};

/// Scans directory listings on one origin.
#[derive(Clone)]
pub struct BundleDiscovery {
    fetcher: Arc<dyn Fetcher>,
    origin: Url,
}

impl BundleDiscovery {
    pub fn new(fetcher: Arc<dyn Fetcher>, origin: Url) -> Self {
        Self { fetcher, origin }
    }

    /// Returns `directory` joined with the first `bundle.<hex>.<extension>`
    /// name found in its listing, e.g. `/static/css/bundle.abc123.css`.
    ///
    /// Never fails: an unreachable listing, a non-success status or a
    /// listing without a match all yield `None`.
    pub async fn find_latest_bundle(&self, directory: &str, extension: &str) -> Option<String> {
        match self.scan(directory, extension).await {
            Ok(Some(path)) => {
                info!("Found latest bundle: {}", path);
                Some(path)
            }
            Ok(None) => {
                warn!("No .{} bundle listed in {}", extension, directory);
                None
            }
            Err(e) => {
                error!("Error finding bundle in {}: {}", directory, e);
                None
            }
        }
    }

    async fn scan(&self, directory: &str, extension: &str) -> Result<Option<String>> {
        let pattern = bundle_pattern(extension)?;
        let url = self
            .origin
            .join(directory)
            .map_err(|e| CacheError::Discovery(format!("invalid listing path {}: {}", directory, e)))?;

        // The listing is the source of truth, so it must come from the network
        let request = FetchRequest::get(url).with_cache_mode(CacheMode::NoStore);
        let response = self.fetcher.fetch(&request).await?;
        if !response.ok() {
            return Err(CacheError::Discovery(format!(
                "failed to list directory {}: status {}",
                directory, response.status
            )));
        }

        let listing = response.text();
        Ok(pattern
            .find(&listing)
            .map(|m| join_path(directory, m.as_str())))
    }
}

/// Case-insensitive `bundle\.[a-f0-9]+\.<extension>`.
fn bundle_pattern(extension: &str) -> Result<Regex> {
    Regex::new(&format!(r"(?i)bundle\.[a-f0-9]+\.{}", regex::escape(extension)))
        .map_err(|e| CacheError::Discovery(format!("bad bundle pattern for .{}: {}", extension, e)))
}

fn join_path(directory: &str, file: &str) -> String {
    if directory.ends_with('/') {
        format!("{}{}", directory, file)
    } else {
        format!("{}/{}", directory, file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::test_support::{MockFetcher, ORIGIN};
    use axum::http::StatusCode;

    fn discovery(fetcher: &Arc<MockFetcher>) -> BundleDiscovery {
        BundleDiscovery::new(fetcher.clone(), Url::parse(ORIGIN).unwrap())
    }

    #[tokio::test]
    async fn test_finds_bundle_in_listing() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.respond_html(
            "/static/css/",
            r#"<a href="reset.css">reset.css</a><a href="bundle.9f3c2b1a.css">bundle.9f3c2b1a.css</a>"#,
        );

        let found = discovery(&fetcher).find_latest_bundle("/static/css/", "css").await;
        assert_eq!(found.as_deref(), Some("/static/css/bundle.9f3c2b1a.css"));
    }

    #[tokio::test]
    async fn test_listing_request_bypasses_cache() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.respond_html("/static/js/", "bundle.abc.js");

        discovery(&fetcher).find_latest_bundle("/static/js/", "js").await;

        let calls = fetcher.requests();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].cache_mode, CacheMode::NoStore);
    }

    #[tokio::test]
    async fn test_match_is_case_insensitive_and_first_wins() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.respond_html("/static/js/", "Bundle.ABC123.JS bundle.def456.js");

        let found = discovery(&fetcher).find_latest_bundle("/static/js/", "js").await;
        assert_eq!(found.as_deref(), Some("/static/js/Bundle.ABC123.JS"));
    }

    #[tokio::test]
    async fn test_extension_is_literal() {
        let fetcher = Arc::new(MockFetcher::new());
        // "." in the extension must not match any character
        fetcher.respond_html("/static/js/", "bundle.abc.mxjs");

        let found = discovery(&fetcher).find_latest_bundle("/static/js/", "m.js").await;
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_no_match_returns_none() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.respond_html("/static/css/", "<html><body>Index of /static/css/</body></html>");

        let found = discovery(&fetcher).find_latest_bundle("/static/css/", "css").await;
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_non_success_status_returns_none() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.respond("/static/css/", StatusCode::FORBIDDEN, "text/html", "bundle.abc.css");

        let found = discovery(&fetcher).find_latest_bundle("/static/css/", "css").await;
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_network_failure_returns_none() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.fail("/static/css/");

        let found = discovery(&fetcher).find_latest_bundle("/static/css/", "css").await;
        assert!(found.is_none());
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/static/css/", "bundle.a.css"), "/static/css/bundle.a.css");
        assert_eq!(join_path("/static/css", "bundle.a.css"), "/static/css/bundle.a.css");
    }
}
