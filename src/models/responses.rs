//! Response DTOs for the worker control API
//!
//! Defines the structure of outgoing JSON bodies under `/_worker/`.

use serde::Serialize;

use crate::cache::CacheStats;
use crate::worker::LifecycleState;

/// Response body for the stats endpoint (GET /_worker/stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Generation the numbers belong to
    pub cache_name: String,
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of successful writes
    pub writes: u64,
    /// Number of entries dropped on expiry
    pub expirations: u64,
    /// Current number of entries in the generation
    pub total_entries: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl StatsResponse {
    /// Creates a new StatsResponse from generation statistics
    pub fn new(cache_name: impl Into<String>, stats: &CacheStats) -> Self {
        Self {
            cache_name: cache_name.into(),
            hits: stats.hits,
            misses: stats.misses,
            writes: stats.writes,
            expirations: stats.expirations,
            total_entries: stats.total_entries,
            hit_rate: stats.hit_rate(),
        }
    }
}

/// Response body for the state endpoint (GET /_worker/state)
#[derive(Debug, Clone, Serialize)]
pub struct StateResponse {
    /// Current lifecycle state
    pub state: LifecycleState,
    /// Current generation name
    pub cache_name: String,
    /// Names of every generation present in storage
    pub generations: Vec<String>,
}

/// Response body for the health endpoint (GET /_worker/health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_response_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            writes: 20,
            expirations: 0,
            total_entries: 20,
        };
        let resp = StatsResponse::new("cag-cache-v1", &stats);
        assert!((resp.hit_rate - 0.8).abs() < 0.001);
        assert_eq!(resp.cache_name, "cag-cache-v1");
    }

    #[test]
    fn test_state_response_serialize() {
        let resp = StateResponse {
            state: LifecycleState::Active,
            cache_name: "cag-cache-v1".to_string(),
            generations: vec!["cag-cache-v1".to_string()],
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains(r#""state":"active""#));
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }
}
