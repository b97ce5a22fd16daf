//! API Handlers
//!
//! HTTP handlers for the worker control endpoints and the intercepting proxy.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, error};

use crate::cache::{CacheStorage, DiskCacheStorage, MemoryCacheStorage};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::fetch::{AssetResponse, FetchRequest, Fetcher, HttpFetcher};
use crate::models::{HealthResponse, StateResponse, StatsResponse};
use crate::worker::{ActivationReport, CacheWorker, FetchOutcome, InstallReport};

/// Largest request body the proxy will buffer.
const MAX_REQUEST_BODY: usize = 16 * 1024 * 1024;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The worker every request is handed to
    pub worker: Arc<CacheWorker>,
}

impl AppState {
    /// Creates a new AppState around an existing worker.
    pub fn new(worker: CacheWorker) -> Self {
        Self {
            worker: Arc::new(worker),
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Generations persist under `cache_dir` when one is set and stay in
    /// memory otherwise. Fetches go to the configured origin.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let storage: Arc<dyn CacheStorage> = match &config.cache_dir {
            Some(root) => Arc::new(DiskCacheStorage::from_config(root, config).await?),
            None => Arc::new(MemoryCacheStorage::from_config(config)),
        };
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::from_config(config)?);
        Ok(Self::new(CacheWorker::new(config, storage, fetcher)?))
    }
}

impl IntoResponse for AssetResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Handler for POST /_worker/install
pub async fn install_handler(State(state): State<AppState>) -> Result<Json<InstallReport>> {
    let report = state.worker.on_install().await?;
    Ok(Json(report))
}

/// Handler for POST /_worker/activate
pub async fn activate_handler(State(state): State<AppState>) -> Result<Json<ActivationReport>> {
    let report = state.worker.on_activate().await?;
    Ok(Json(report))
}

/// Handler for GET /_worker/state
pub async fn state_handler(State(state): State<AppState>) -> Result<Json<StateResponse>> {
    let worker = &state.worker;
    let mut generations = worker.storage().keys().await?;
    generations.sort();

    Ok(Json(StateResponse {
        state: worker.state(),
        cache_name: worker.cache_name().to_string(),
        generations,
    }))
}

/// Handler for GET /_worker/stats
///
/// Returns statistics of the current generation.
pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let worker = &state.worker;
    let stats = worker.storage().stats(worker.cache_name()).await?;
    Ok(Json(StatsResponse::new(worker.cache_name(), &stats)))
}

/// Handler for GET /_worker/health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Fallback handler: every other request is a fetch event.
///
/// Requests the worker does not take over are forwarded to the origin as-is.
pub async fn proxy_handler(State(state): State<AppState>, request: Request) -> Response {
    let request = match into_fetch_request(state.worker.origin(), request).await {
        Ok(request) => request,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    match state.worker.on_fetch(request).await {
        FetchOutcome::Respond(response) => response.into_response(),
        FetchOutcome::PassThrough(request) => {
            debug!("Forwarding {} {}", request.method, request.url);
            match state.worker.fetcher().fetch(&request).await {
                Ok(response) => response.into_response(),
                Err(e) => {
                    error!("Forwarding {} failed: {}", request.url, e);
                    AssetResponse::network_error().into_response()
                }
            }
        }
    }
}

/// Rebuilds an incoming proxy request against the origin.
///
/// Only the path and query are taken from the incoming URI; scheme, host and
/// port always come from `origin`, so a path such as `//other.host/x.js`
/// stays a path on the origin.
async fn into_fetch_request(origin: &url::Url, request: Request) -> Result<FetchRequest> {
    let (parts, body) = request.into_parts();

    let mut url = origin.clone();
    url.set_path(parts.uri.path());
    url.set_query(parts.uri.query());
    url.set_fragment(None);

    let body = to_bytes(body, MAX_REQUEST_BODY)
        .await
        .map_err(|e| CacheError::Internal(format!("reading request body: {}", e)))?;

    Ok(FetchRequest::new(parts.method, url)
        .with_headers(parts.headers)
        .with_body(body))
}
