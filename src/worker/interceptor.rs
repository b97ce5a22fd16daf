//! Fetch handler: cache-first serving of intercepted GET requests.

use std::sync::PoisonError;

use axum::http::Method;
use tracing::{debug, error, info, warn};

use super::{CacheWorker, FetchOutcome, LifecycleState};
use crate::cache::{normalize_url, Cache};
use crate::fetch::{AssetResponse, FetchRequest};

impl CacheWorker {
    /// Decides, before any I/O, whether this worker answers `request`.
    ///
    /// Only GET requests are taken over, and only once the worker is active.
    pub fn should_intercept(&self, request: &FetchRequest) -> bool {
        request.method == Method::GET && self.state() == LifecycleState::Active
    }

    // == Fetch ==
    /// Handles one intercepted request.
    ///
    /// Serves a cached entry when one exists under the normalized URL,
    /// otherwise fetches the original request and, when the response is
    /// cacheable, stores a copy in the background. Always yields a response
    /// for taken-over requests: a network failure becomes a 503.
    pub async fn on_fetch(&self, request: FetchRequest) -> FetchOutcome {
        if !self.should_intercept(&request) {
            debug!("Passing through {} {}", request.method, request.url);
            return FetchOutcome::PassThrough(request);
        }

        FetchOutcome::Respond(self.respond(request).await)
    }

    async fn respond(&self, request: FetchRequest) -> AssetResponse {
        let key = normalize_url(&request.url);

        let cache = match self.current_cache() {
            Some(cache) => Some(cache),
            None => match Cache::open(self.storage.clone(), &self.cache_name).await {
                Ok(cache) => Some(cache),
                Err(e) => {
                    warn!("Cache {} unavailable, using network only: {}", self.cache_name, e);
                    None
                }
            },
        };

        if let Some(cache) = &cache {
            match cache.match_entry(&key).await {
                Ok(Some(hit)) => {
                    info!("Serving from cache: {}", request.url);
                    return hit;
                }
                Ok(None) => {}
                Err(e) => warn!("Cache lookup failed for {}: {}", key, e),
            }
        }

        let response = match self.fetcher.fetch(&request).await {
            Ok(response) => response,
            Err(e) => {
                error!("Fetch failed for {}: {}", request.url, e);
                return AssetResponse::network_error();
            }
        };

        if let Some(cache) = cache {
            if self.policy.is_cacheable(&request, &response) {
                self.store_detached(cache, key, response.clone());
            } else {
                debug!(
                    "Not caching {} (status {}, {:?})",
                    request.url, response.status, response.response_type
                );
            }
        }

        response
    }

    /// Writes to the cache on a separate task so the caller never waits on it.
    fn store_detached(&self, cache: Cache, key: String, response: AssetResponse) {
        let handle = tokio::spawn(async move {
            if let Err(e) = cache.put(key.clone(), response).await {
                warn!("Failed to cache {}: {}", key, e);
            }
        });

        let mut pending = self
            .pending_writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    /// Waits for every background cache write started so far.
    pub async fn flush_pending_writes(&self) {
        let handles = std::mem::take(
            &mut *self
                .pending_writes
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );

        for handle in handles {
            if let Err(e) = handle.await {
                error!("Cache write task did not finish: {}", e);
            }
        }
    }
}
