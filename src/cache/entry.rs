//! Cache Entry Module
//!
//! Defines a stored response together with its expiry metadata.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::fetch::AssetResponse;

// == Cached Response ==
/// A captured response as held by a cache generation.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    /// The captured status, headers and body
    pub response: AssetResponse,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
}

impl CachedResponse {
    // == Constructor ==
    /// Wraps a response with an optional lifetime.
    ///
    /// # Arguments
    /// * `response` - The response to store
    /// * `ttl_seconds` - Optional lifetime in seconds
    pub fn new(response: AssetResponse, ttl_seconds: Option<u64>) -> Self {
        let now = current_timestamp_ms();
        let expires_at = ttl_seconds.map(|ttl| now.saturating_add(ttl.saturating_mul(1000)));

        Self {
            response,
            created_at: now,
            expires_at,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time is greater than or equal to
    /// the expiration time.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires) => current_timestamp_ms() >= expires,
            None => false,
        }
    }

    // == Time To Live ==
    /// Returns remaining lifetime in seconds, or None if no expiration is set.
    ///
    /// # Returns
    /// - `Some(0)` if the entry has expired
    /// - `Some(remaining_seconds)` if the entry hasn't expired
    /// - `None` if the entry never expires
    pub fn ttl_remaining(&self) -> Option<u64> {
        self.expires_at
            .map(|expires| expires.saturating_sub(current_timestamp_ms()) / 1000)
    }

    /// Size of the stored body in bytes.
    pub fn body_len(&self) -> usize {
        self.response.body.len()
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
