//! Cache Storage Module
//!
//! The origin-scoped area holding every cache generation, and the `Cache`
//! handle the worker uses to read and write one of them.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::cache::{CacheStats, CacheStore, Lookup};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::fetch::AssetResponse;

// == Cache Storage ==
/// Named cache generations.
///
/// Implementations must tolerate overlapping `match_entry`/`put` calls on
/// the same generation; concurrent puts to one key resolve last-writer-wins.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Creates the generation `name` if it does not exist yet.
    async fn create(&self, name: &str) -> Result<()>;

    /// Looks up `key` in generation `name`.
    async fn match_entry(&self, name: &str, key: &str) -> Result<Option<AssetResponse>>;

    /// Stores `response` under `key` in generation `name`.
    async fn put(&self, name: &str, key: String, response: AssetResponse) -> Result<()>;

    /// Names of all existing generations.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Deletes generation `name`. Returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool>;

    /// Statistics for generation `name`.
    async fn stats(&self, name: &str) -> Result<CacheStats>;

    /// Removes expired entries from generation `name`, returning how many.
    async fn purge_expired(&self, name: &str) -> Result<usize>;

    /// Deletes every generation except `current`, returning the deleted names.
    async fn delete_all_except(&self, current: &str) -> Result<Vec<String>> {
        let mut deleted = Vec::new();
        for name in self.keys().await? {
            if name != current && self.delete(&name).await? {
                deleted.push(name);
            }
        }
        Ok(deleted)
    }
}

// == Cache Handle ==
/// An opened generation.
#[derive(Clone)]
pub struct Cache {
    name: String,
    storage: Arc<dyn CacheStorage>,
}

impl Cache {
    /// Opens generation `name`, creating it when absent.
    pub async fn open(storage: Arc<dyn CacheStorage>, name: &str) -> Result<Self> {
        storage.create(name).await?;
        Ok(Self {
            name: name.to_string(),
            storage,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn match_entry(&self, key: &str) -> Result<Option<AssetResponse>> {
        self.storage.match_entry(&self.name, key).await
    }

    pub async fn put(&self, key: String, response: AssetResponse) -> Result<()> {
        self.storage.put(&self.name, key, response).await
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache").field("name", &self.name).finish()
    }
}

// == Memory Cache Storage ==
/// In-process storage; generations live as long as the host process.
#[derive(Debug, Clone)]
pub struct MemoryCacheStorage {
    generations: Arc<RwLock<HashMap<String, Arc<RwLock<CacheStore>>>>>,
    max_entries: usize,
    max_entry_bytes: usize,
    ttl: Option<u64>,
}

impl MemoryCacheStorage {
    /// Creates empty storage whose generations share the given limits.
    pub fn new(max_entries: usize, max_entry_bytes: usize, ttl: Option<u64>) -> Self {
        Self {
            generations: Arc::new(RwLock::new(HashMap::new())),
            max_entries,
            max_entry_bytes,
            ttl,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.max_entries,
            config.max_entry_bytes,
            config.cache_timeout().map(|d| d.as_secs()),
        )
    }

    async fn generation(&self, name: &str) -> Result<Arc<RwLock<CacheStore>>> {
        self.generations
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| CacheError::Storage(format!("cache '{}' is not open", name)))
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn create(&self, name: &str) -> Result<()> {
        if self.generations.read().await.contains_key(name) {
            return Ok(());
        }

        let mut generations = self.generations.write().await;
        if !generations.contains_key(name) {
            info!("Creating cache generation {}", name);
            generations.insert(
                name.to_string(),
                Arc::new(RwLock::new(CacheStore::new(
                    self.max_entries,
                    self.max_entry_bytes,
                    self.ttl,
                ))),
            );
        }
        Ok(())
    }

    async fn match_entry(&self, name: &str, key: &str) -> Result<Option<AssetResponse>> {
        let generation = self.generation(name).await?;
        let lookup = generation.read().await.lookup(key);
        match lookup {
            Lookup::Hit(response) => Ok(Some(response)),
            Lookup::Expired => {
                generation.write().await.remove_if_expired(key);
                Ok(None)
            }
            Lookup::Miss => Ok(None),
        }
    }

    async fn put(&self, name: &str, key: String, response: AssetResponse) -> Result<()> {
        let generation = self.generation(name).await?;
        let mut store = generation.write().await;
        debug!("Storing {} in {}", key, name);
        store.put(key, response)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.generations.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        Ok(self.generations.write().await.remove(name).is_some())
    }

    async fn stats(&self, name: &str) -> Result<CacheStats> {
        let generation = self.generation(name).await?;
        let store = generation.read().await;
        Ok(store.stats())
    }

    async fn purge_expired(&self, name: &str) -> Result<usize> {
        let generation = self.generation(name).await?;
        let mut store = generation.write().await;
        Ok(store.cleanup_expired())
    }
}
