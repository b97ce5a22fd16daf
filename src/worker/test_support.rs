//! In-memory doubles for the network and storage seams.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use url::Url;

use crate::cache::{CacheStats, CacheStorage, MemoryCacheStorage};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::fetch::{AssetResponse, FetchRequest, Fetcher};

pub const ORIGIN: &str = "http://localhost:8080";

pub fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

pub fn test_config() -> Config {
    Config {
        origin: ORIGIN.to_string(),
        ..Config::default()
    }
}

enum Route {
    Respond(AssetResponse),
    Fail,
}

/// Fetcher answering from a fixed table keyed by full URL; unknown URLs get a 404.
#[derive(Default)]
pub struct MockFetcher {
    routes: Mutex<HashMap<String, Route>>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, path: &str, status: StatusCode, content_type: &str, body: &str) {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        headers.insert("x-origin-id", HeaderValue::from_static("origin-1"));
        self.respond_with(path, AssetResponse::new(status, headers, body.to_string()));
    }

    pub fn respond_with(&self, path: &str, response: AssetResponse) {
        self.routes
            .lock()
            .unwrap()
            .insert(url(path).to_string(), Route::Respond(response));
    }

    pub fn respond_html(&self, path: &str, body: &str) {
        self.respond(path, StatusCode::OK, "text/html", body);
    }

    pub fn fail(&self, path: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url(path).to_string(), Route::Fail);
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<AssetResponse> {
        self.requests.lock().unwrap().push(request.clone());
        match self.routes.lock().unwrap().get(request.url.as_str()) {
            Some(Route::Respond(response)) => Ok(response.clone()),
            Some(Route::Fail) => Err(CacheError::Network(format!(
                "connection refused: {}",
                request.url
            ))),
            None => Ok(AssetResponse::new(
                StatusCode::NOT_FOUND,
                HeaderMap::new(),
                "404 page not found",
            )),
        }
    }
}

/// Storage whose writes always fail, as when the quota is exhausted.
pub struct FullStorage {
    inner: MemoryCacheStorage,
    pub attempted_puts: Mutex<usize>,
}

impl FullStorage {
    pub fn new() -> Self {
        Self {
            inner: MemoryCacheStorage::new(100, 1024, None),
            attempted_puts: Mutex::new(0),
        }
    }
}

#[async_trait]
impl CacheStorage for FullStorage {
    async fn create(&self, name: &str) -> Result<()> {
        self.inner.create(name).await
    }

    async fn match_entry(&self, name: &str, key: &str) -> Result<Option<AssetResponse>> {
        self.inner.match_entry(name, key).await
    }

    async fn put(&self, _name: &str, _key: String, _response: AssetResponse) -> Result<()> {
        *self.attempted_puts.lock().unwrap() += 1;
        Err(CacheError::QuotaExceeded("storage full".to_string()))
    }

    async fn keys(&self) -> Result<Vec<String>> {
        self.inner.keys().await
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        self.inner.delete(name).await
    }

    async fn stats(&self, name: &str) -> Result<CacheStats> {
        self.inner.stats(name).await
    }

    async fn purge_expired(&self, name: &str) -> Result<usize> {
        self.inner.purge_expired(name).await
    }
}

/// Memory storage that counts how often a generation is opened.
pub struct CountingStorage {
    inner: MemoryCacheStorage,
    creates: Mutex<usize>,
}

impl CountingStorage {
    pub fn new() -> Self {
        Self {
            inner: MemoryCacheStorage::new(100, 1024 * 1024, None),
            creates: Mutex::new(0),
        }
    }

    pub fn creates(&self) -> usize {
        *self.creates.lock().unwrap()
    }
}

#[async_trait]
impl CacheStorage for CountingStorage {
    async fn create(&self, name: &str) -> Result<()> {
        *self.creates.lock().unwrap() += 1;
        self.inner.create(name).await
    }

    async fn match_entry(&self, name: &str, key: &str) -> Result<Option<AssetResponse>> {
        self.inner.match_entry(name, key).await
    }

    async fn put(&self, name: &str, key: String, response: AssetResponse) -> Result<()> {
        self.inner.put(name, key, response).await
    }

    async fn keys(&self) -> Result<Vec<String>> {
        self.inner.keys().await
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        self.inner.delete(name).await
    }

    async fn stats(&self, name: &str) -> Result<CacheStats> {
        self.inner.stats(name).await
    }

    async fn purge_expired(&self, name: &str) -> Result<usize> {
        self.inner.purge_expired(name).await
    }
}

/// Storage that cannot be opened at all.
pub struct UnavailableStorage;

#[async_trait]
impl CacheStorage for UnavailableStorage {
    async fn create(&self, _name: &str) -> Result<()> {
        Err(CacheError::Storage("storage disabled".to_string()))
    }

    async fn match_entry(&self, _name: &str, _key: &str) -> Result<Option<AssetResponse>> {
        Err(CacheError::Storage("storage disabled".to_string()))
    }

    async fn put(&self, _name: &str, _key: String, _response: AssetResponse) -> Result<()> {
        Err(CacheError::Storage("storage disabled".to_string()))
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Err(CacheError::Storage("storage disabled".to_string()))
    }

    async fn delete(&self, _name: &str) -> Result<bool> {
        Err(CacheError::Storage("storage disabled".to_string()))
    }

    async fn stats(&self, _name: &str) -> Result<CacheStats> {
        Err(CacheError::Storage("storage disabled".to_string()))
    }

    async fn purge_expired(&self, _name: &str) -> Result<usize> {
        Err(CacheError::Storage("storage disabled".to_string()))
    }
}
