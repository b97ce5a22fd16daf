//! Worker Module
//!
//! The cache worker: one actor handling install, activate and fetch events
//! over injected storage and network seams.
//!
//! # Lifecycle
//! `pending -> installing -> installed -> activating -> active`
//!
//! The host awaits `on_install` and `on_activate`; neither transition is
//! complete until its future resolves. Fetch events are only taken over
//! once the worker is `active`.

mod discovery;
mod interceptor;
mod lifecycle;
mod policy;

#[cfg(test)]
pub(crate) mod test_support;

use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::Serialize;
use tokio::task::JoinHandle;
use url::Url;

use crate::cache::{Cache, CacheStorage};
use crate::config::{BundleSource, Config};
use crate::error::{CacheError, Result};
use crate::fetch::{AssetResponse, FetchRequest, Fetcher};

pub use discovery::BundleDiscovery;
pub use lifecycle::{ActivationReport, InstallReport};
pub use policy::CachePolicy;

// == Lifecycle State ==
/// Where the worker is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Pending,
    Installing,
    Installed,
    Activating,
    Active,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Pending => "pending",
            LifecycleState::Installing => "installing",
            LifecycleState::Installed => "installed",
            LifecycleState::Activating => "activating",
            LifecycleState::Active => "active",
        };
        f.write_str(name)
    }
}

// == Fetch Outcome ==
/// What the worker did with an intercepted request.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Not taken over; the host sends the request to the network itself
    PassThrough(FetchRequest),
    /// Taken over; this is the response to deliver
    Respond(AssetResponse),
}

// == Cache Worker ==
/// Cache-first asset worker.
pub struct CacheWorker {
    cache_name: String,
    origin: Url,
    bundle_sources: Vec<BundleSource>,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    discovery: BundleDiscovery,
    policy: CachePolicy,
    state: RwLock<LifecycleState>,
    /// Current generation, opened once during install
    cache: RwLock<Option<Cache>>,
    skip_waiting: AtomicBool,
    pending_writes: Mutex<Vec<JoinHandle<()>>>,
}

impl CacheWorker {
    /// Creates a worker in the `pending` state.
    pub fn new(
        config: &Config,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self> {
        let origin = Url::parse(&config.origin)
            .map_err(|e| CacheError::InvalidConfig(format!("origin '{}': {}", config.origin, e)))?;

        Ok(Self {
            cache_name: config.cache_generation_name.clone(),
            discovery: BundleDiscovery::new(fetcher.clone(), origin.clone()),
            policy: CachePolicy::from_config(config),
            bundle_sources: config.bundle_sources.clone(),
            origin,
            storage,
            fetcher,
            state: RwLock::new(LifecycleState::Pending),
            cache: RwLock::new(None),
            skip_waiting: AtomicBool::new(false),
            pending_writes: Mutex::new(Vec::new()),
        })
    }

    /// Name of the current cache generation.
    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    pub fn fetcher(&self) -> &Arc<dyn Fetcher> {
        &self.fetcher
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// The opened current generation, once install has opened it.
    fn current_cache(&self) -> Option<Cache> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_current_cache(&self, cache: Cache) {
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = Some(cache);
    }

    fn set_state(&self, next: LifecycleState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// Moves to `next` if the current state is one of `allowed`.
    fn transition(&self, allowed: &[LifecycleState], next: LifecycleState) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if !allowed.contains(&*state) {
            return Err(CacheError::Lifecycle(format!(
                "cannot move to {} while {}",
                next, *state
            )));
        }
        *state = next;
        Ok(())
    }
}

impl fmt::Debug for CacheWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheWorker")
            .field("cache_name", &self.cache_name)
            .field("origin", &self.origin.as_str())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{test_config, MockFetcher, ORIGIN};
    use super::*;
    use crate::cache::MemoryCacheStorage;

    fn worker() -> CacheWorker {
        CacheWorker::new(
            &test_config(),
            Arc::new(MemoryCacheStorage::new(100, 1024, None)),
            Arc::new(MockFetcher::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_new_worker_is_pending() {
        let worker = worker();
        assert_eq!(worker.state(), LifecycleState::Pending);
        assert_eq!(worker.cache_name(), "cag-cache-v1");
        assert_eq!(worker.origin().as_str(), format!("{}/", ORIGIN));
    }

    #[test]
    fn test_invalid_origin_is_config_error() {
        let config = Config {
            origin: "::not-a-url".to_string(),
            ..Config::default()
        };
        let result = CacheWorker::new(
            &config,
            Arc::new(MemoryCacheStorage::new(1, 1, None)),
            Arc::new(MockFetcher::new()),
        );
        assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
    }

    #[test]
    fn test_transition_rejects_wrong_state() {
        let worker = worker();
        let result = worker.transition(&[LifecycleState::Installed], LifecycleState::Activating);
        assert!(matches!(result, Err(CacheError::Lifecycle(_))));
        assert_eq!(worker.state(), LifecycleState::Pending);
    }

    #[test]
    fn test_state_serializes_lowercase() {
        let json = serde_json::to_string(&LifecycleState::Activating).unwrap();
        assert_eq!(json, "\"activating\"");
        assert_eq!(LifecycleState::Active.to_string(), "active");
    }
}
