//! Error types for the asset cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the asset cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Cache storage could not be opened or read
    #[error("Storage unavailable: {0}")]
    Storage(String),

    /// A write would exceed the generation's quota
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Network fetch failed before a response was received
    #[error("Network error: {0}")]
    Network(String),

    /// Directory listing could not be fetched or read
    #[error("Discovery failed: {0}")]
    Discovery(String),

    /// Lifecycle event arrived in a state that cannot handle it
    #[error("Invalid lifecycle transition: {0}")]
    Lifecycle(String),

    /// Configuration value could not be used
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::QuotaExceeded(_) => StatusCode::INSUFFICIENT_STORAGE,
            CacheError::Network(_) | CacheError::Discovery(_) => StatusCode::BAD_GATEWAY,
            CacheError::Lifecycle(_) => StatusCode::CONFLICT,
            CacheError::InvalidConfig(_) | CacheError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the asset cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_error_maps_to_conflict() {
        let response = CacheError::Lifecycle("activate before install".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_storage_error_maps_to_unavailable() {
        let response = CacheError::Storage("closed".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_error_display() {
        let err = CacheError::QuotaExceeded("too many entries".to_string());
        assert_eq!(err.to_string(), "Quota exceeded: too many entries");
    }
}
