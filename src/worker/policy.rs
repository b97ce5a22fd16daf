//! Cacheability rules applied to network responses before they are stored.

use url::Url;

use crate::config::Config;
use crate::fetch::{AssetResponse, FetchRequest, ResponseType};

/// Path suffixes eligible for caching.
const CACHEABLE_EXTENSIONS: [&str; 2] = [".css", ".js"];

/// Decides whether a fetched response may be written to the cache.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    /// Lowercased scheme names without the trailing colon
    unsupported_schemes: Vec<String>,
}

impl CachePolicy {
    /// Accepts schemes written either as `data` or `data:`.
    pub fn new<I, S>(unsupported_schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            unsupported_schemes: unsupported_schemes
                .into_iter()
                .map(|s| s.as_ref().trim().trim_end_matches(':').to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.unsupported_schemes)
    }

    pub fn is_unsupported_scheme(&self, url: &Url) -> bool {
        // Url::scheme is already lowercase
        self.unsupported_schemes.iter().any(|s| s == url.scheme())
    }

    /// True only for a same-origin 200 response to a `.css` or `.js` path
    /// requested over a supported scheme.
    pub fn is_cacheable(&self, request: &FetchRequest, response: &AssetResponse) -> bool {
        if self.is_unsupported_scheme(&request.url) {
            return false;
        }
        if response.status != 200 || response.response_type != ResponseType::Basic {
            return false;
        }

        let path = request.url.path();
        CACHEABLE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
