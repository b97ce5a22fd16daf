//! Install and activate handlers.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use url::Url;

use super::{CacheWorker, LifecycleState};
use crate::cache::{normalize_url, Cache};
use crate::error::{CacheError, Result};
use crate::fetch::{CacheMode, FetchRequest, Fetcher};

/// Result of a finished install.
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    /// Cache generation the assets were written to
    pub cache_name: String,
    /// Bundle paths found by discovery
    pub discovered: Vec<String>,
    /// Bundles now in the cache
    pub cached: Vec<String>,
    /// Bundles that could not be fetched or stored
    pub failed: Vec<String>,
    /// Whether the worker asks to be activated without waiting
    pub skip_waiting: bool,
}

/// Result of a finished activation.
#[derive(Debug, Clone, Serialize)]
pub struct ActivationReport {
    /// The generation left in place
    pub cache_name: String,
    /// Older generations that were deleted
    pub deleted: Vec<String>,
}

impl CacheWorker {
    // == Install ==
    /// Pre-warms the current generation with the latest bundles.
    ///
    /// Discovery misses and individual pre-warm failures are logged and
    /// reported, never fatal. Only an unusable store fails the install, in
    /// which case the worker returns to `pending`.
    pub async fn on_install(&self) -> Result<InstallReport> {
        self.transition(&[LifecycleState::Pending], LifecycleState::Installing)?;
        info!("Installing...");

        let cache = match Cache::open(self.storage.clone(), &self.cache_name).await {
            Ok(cache) => {
                self.set_current_cache(cache.clone());
                cache
            }
            Err(e) => {
                error!("Install failed, cannot open {}: {}", self.cache_name, e);
                self.set_state(LifecycleState::Pending);
                return Err(e);
            }
        };

        let mut discovered = Vec::new();
        for source in &self.bundle_sources {
            if let Some(path) = self
                .discovery
                .find_latest_bundle(&source.directory, &source.extension)
                .await
            {
                discovered.push(path);
            }
        }
        info!("Caching assets: {:?}", discovered);

        let mut prewarms = JoinSet::new();
        for path in &discovered {
            let fetcher = self.fetcher.clone();
            let cache = cache.clone();
            let origin = self.origin.clone();
            let path = path.clone();
            prewarms.spawn(async move {
                let outcome = prewarm(fetcher, &cache, &origin, &path).await;
                (path, outcome)
            });
        }

        let mut cached = Vec::new();
        let mut failed = Vec::new();
        while let Some(joined) = prewarms.join_next().await {
            match joined {
                Ok((path, Ok(()))) => cached.push(path),
                Ok((path, Err(e))) => {
                    error!("Error caching {}: {}", path, e);
                    failed.push(path);
                }
                Err(e) => error!("Pre-warm task did not finish: {}", e),
            }
        }
        cached.sort();
        failed.sort();

        self.skip_waiting.store(true, Ordering::SeqCst);
        self.set_state(LifecycleState::Installed);
        info!(
            "Installed {}: {} cached, {} failed",
            self.cache_name,
            cached.len(),
            failed.len()
        );

        Ok(InstallReport {
            cache_name: self.cache_name.clone(),
            discovered,
            cached,
            failed,
            skip_waiting: true,
        })
    }

    /// True once install has asked the host to activate immediately.
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    // == Activate ==
    /// Deletes every cache generation other than the current one.
    ///
    /// The worker is `active` only after pruning finishes. If pruning fails
    /// the worker stays `installed` so activation can be retried.
    pub async fn on_activate(&self) -> Result<ActivationReport> {
        self.transition(&[LifecycleState::Installed], LifecycleState::Activating)?;
        info!("Activating...");

        match self.storage.delete_all_except(&self.cache_name).await {
            Ok(deleted) => {
                for name in &deleted {
                    info!("Deleted old cache generation {}", name);
                }
                self.set_state(LifecycleState::Active);
                info!("Active with cache generation {}", self.cache_name);
                Ok(ActivationReport {
                    cache_name: self.cache_name.clone(),
                    deleted,
                })
            }
            Err(e) => {
                warn!("Activation failed while pruning caches: {}", e);
                self.set_state(LifecycleState::Installed);
                Err(e)
            }
        }
    }
}

/// Fetches one bundle past any intermediate cache and stores it.
async fn prewarm(fetcher: Arc<dyn Fetcher>, cache: &Cache, origin: &Url, path: &str) -> Result<()> {
    let url = origin
        .join(path)
        .map_err(|e| CacheError::Discovery(format!("invalid bundle path {}: {}", path, e)))?;

    let request = FetchRequest::get(url).with_cache_mode(CacheMode::NoStore);
    let response = fetcher.fetch(&request).await?;
    if !response.ok() {
        return Err(CacheError::Network(format!(
            "Failed to fetch {}, status: {}",
            path, response.status
        )));
    }

    cache.put(normalize_url(&request.url), response).await
}
