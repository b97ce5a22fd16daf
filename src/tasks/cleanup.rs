//! Expiry Cleanup Task
//!
//! Background task that periodically removes expired entries from the
//! current cache generation.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheStorage;

/// Spawns a background task that periodically purges expired entries.
///
/// The task runs in an infinite loop, sleeping for the specified interval
/// between runs. A generation that does not exist yet (before install) is
/// logged at debug level and skipped.
///
/// # Arguments
/// * `storage` - Storage holding the generation
/// * `cache_name` - Name of the current generation
/// * `cleanup_interval_secs` - Interval in seconds between cleanup runs
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let storage: Arc<dyn CacheStorage> = Arc::new(MemoryCacheStorage::from_config(&config));
/// let cleanup_handle = spawn_cleanup_task(storage.clone(), "cag-cache-v1".to_string(), 60);
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(
    storage: Arc<dyn CacheStorage>,
    cache_name: String,
    cleanup_interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting expiry cleanup task for {} with interval of {} seconds",
            cache_name, cleanup_interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            match storage.purge_expired(&cache_name).await {
                Ok(0) => debug!("Expiry cleanup: no expired entries found"),
                Ok(removed) => info!("Expiry cleanup: removed {} expired entries", removed),
                Err(e) => debug!("Expiry cleanup skipped: {}", e),
            }
        }
    })
}
