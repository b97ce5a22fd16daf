//! Fetch Module
//!
//! Request and response types exchanged between the worker and the network,
//! and the `Fetcher` seam the worker performs network I/O through.

mod client;

use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Result;

pub use client::HttpFetcher;

/// Body returned when a request can be served neither from cache nor network.
pub const NETWORK_ERROR_BODY: &str = "Network error occurred.";

// == Cache Mode ==
/// How a fetch treats intermediate HTTP caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Let intermediaries answer as usual
    #[default]
    Default,
    /// Force the request to reach the network
    NoStore,
}

// == Response Type ==
/// Classification of a response relative to the configured origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    /// Same-origin response delivered directly
    #[default]
    Basic,
    /// Cross-origin response
    Cors,
    /// Cross-origin response whose contents are hidden
    Opaque,
    /// Redirect that was not followed
    OpaqueRedirect,
    /// Synthesized error
    Error,
}

// == Fetch Request ==
/// A request as intercepted from the front end.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub cache_mode: CacheMode,
}

impl FetchRequest {
    /// Creates a request with the given method and no headers or body.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            cache_mode: CacheMode::Default,
        }
    }

    /// Creates a GET request.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn with_cache_mode(mut self, cache_mode: CacheMode) -> Self {
        self.cache_mode = cache_mode;
        self
    }
}

// == Asset Response ==
/// A fully buffered response. Cloning shares the body buffer, so a stored
/// copy never consumes the caller's.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub response_type: ResponseType,
}

impl AssetResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
            response_type: ResponseType::Basic,
        }
    }

    #[must_use]
    pub fn with_response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    /// The synthesized 503 served when the network fails and nothing is cached.
    pub fn network_error() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        Self::new(StatusCode::SERVICE_UNAVAILABLE, headers, NETWORK_ERROR_BODY)
            .with_response_type(ResponseType::Error)
    }

    /// True for 2xx statuses.
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

// == Fetcher ==
/// Performs network requests on behalf of the worker.
///
/// An `Err` means no response was received at all (connection refused,
/// timeout, unsupported scheme). HTTP error statuses are `Ok`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<AssetResponse>;
}
