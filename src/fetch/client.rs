//! Network fetcher backed by reqwest.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderValue};
use reqwest::{redirect, Client};
use tracing::debug;
use url::{Origin, Url};

use super::{AssetResponse, CacheMode, FetchRequest, Fetcher, ResponseType};
use crate::config::Config;
use crate::error::{CacheError, Result};

/// Headers that describe a single connection and must not be replayed.
const HOP_BY_HOP: [&str; 6] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
];

/// Fetches over HTTP and classifies responses against a fixed origin.
///
/// Redirects are not followed: a 3xx comes back as an opaque redirect,
/// which keeps it out of the cache.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    origin: Origin,
}

impl HttpFetcher {
    /// Builds a fetcher for the configured origin.
    pub fn new(origin: &Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| CacheError::InvalidConfig(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            origin: origin.origin(),
        })
    }

    /// Builds a fetcher from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let origin = Url::parse(&config.origin)
            .map_err(|e| CacheError::InvalidConfig(format!("origin '{}': {}", config.origin, e)))?;
        Self::new(&origin, Duration::from_secs(config.fetch_timeout))
    }

    fn classify(&self, request_url: &Url, status: reqwest::StatusCode) -> ResponseType {
        if status.is_redirection() {
            ResponseType::OpaqueRedirect
        } else if request_url.origin() != self.origin {
            ResponseType::Cors
        } else {
            ResponseType::Basic
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<AssetResponse> {
        let mut headers = strip_hop_by_hop(&request.headers);
        headers.remove(header::HOST);
        if request.cache_mode == CacheMode::NoStore {
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
            headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
        }

        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(headers);
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| CacheError::Network(format!("{} {}: {}", request.method, request.url, e)))?;

        let status = response.status();
        let response_headers = strip_hop_by_hop(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|e| CacheError::Network(format!("reading body of {}: {}", request.url, e)))?;

        debug!(
            "Fetched {} {} -> {} ({} bytes)",
            request.method,
            request.url,
            status,
            body.len()
        );

        Ok(AssetResponse::new(status, response_headers, body)
            .with_response_type(self.classify(&request.url, status)))
    }
}

/// Copies `headers` without connection-scoped entries.
pub(crate) fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut cleaned = headers.clone();
    for name in HOP_BY_HOP {
        cleaned.remove(name);
    }
    cleaned
}
