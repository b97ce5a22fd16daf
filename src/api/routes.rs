//! API Routes
//!
//! Configures the Axum router: worker control endpoints plus a fallback
//! that hands every other request to the worker.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    activate_handler, health_handler, install_handler, proxy_handler, state_handler,
    stats_handler, AppState,
};

/// Creates the main router.
///
/// # Endpoints
/// - `POST /_worker/install` - Run install (discovery and pre-warm)
/// - `POST /_worker/activate` - Run activate (prune old generations)
/// - `GET /_worker/state` - Lifecycle state and generations
/// - `GET /_worker/stats` - Current generation statistics
/// - `GET /_worker/health` - Health check endpoint
/// - anything else - intercepted fetch, proxied to the origin
///
/// # Middleware
/// - CORS: Allows any origin on the control endpoints
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let control = Router::new()
        .route("/install", post(install_handler))
        .route("/activate", post(activate_handler))
        .route("/state", get(state_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors);

    Router::new()
        .nest("/_worker", control)
        .fallback(proxy_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStorage;
    use crate::worker::test_support::{test_config, MockFetcher};
    use crate::worker::CacheWorker;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::util::ServiceExt;

    fn create_test_app(fetcher: Arc<MockFetcher>) -> Router {
        let storage = Arc::new(MemoryCacheStorage::new(100, 1024 * 1024, None));
        let worker = CacheWorker::new(&test_config(), storage, fetcher).unwrap();
        create_router(AppState::new(worker))
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_test_app(Arc::new(MockFetcher::new()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/_worker/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_activate_before_install_conflicts() {
        let app = create_test_app(Arc::new(MockFetcher::new()));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/_worker/activate")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_fallback_proxies_to_fetcher() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.respond("/about", StatusCode::OK, "text/html", "<h1>about</h1>");
        let app = create_test_app(fetcher.clone());

        let response = app
            .oneshot(Request::builder().uri("/about").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(fetcher.request_count(), 1);
    }

    #[tokio::test]
    async fn test_fallback_network_failure_is_503() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.fail("/down");
        let app = create_test_app(fetcher);

        let response = app
            .oneshot(Request::builder().uri("/down").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
