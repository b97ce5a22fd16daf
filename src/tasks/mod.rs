//! Background Tasks Module
//!
//! Contains background tasks that run periodically while the proxy is up.
//!
//! # Tasks
//! - Expiry Cleanup: Removes entries older than the cache timeout from the current generation

mod cleanup;

pub use cleanup::spawn_cleanup_task;
