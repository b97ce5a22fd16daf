//! Disk Cache Storage
//!
//! Generations persisted under a root directory so they survive a restart of
//! the host. Layout:
//!
//! ```text
//! <root>/<hex(generation name)>/<id>.json   entry metadata
//! <root>/<hex(generation name)>/<id>.body   response body
//! ```
//!
//! Every generation is indexed in memory when the storage is opened; reads
//! are served from the index, writes go through to disk.

use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header::HeaderName, HeaderMap, HeaderValue, StatusCode};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, CacheStorage, CacheStore, CachedResponse, Lookup};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::fetch::{AssetResponse, ResponseType};

const META_EXTENSION: &str = "json";
const BODY_EXTENSION: &str = "body";
const TEMP_EXTENSION: &str = "tmp";

/// Metadata file contents for one entry.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedEntry {
    key: String,
    status: u16,
    headers: Vec<(String, String)>,
    response_type: ResponseType,
    created_at: u64,
    expires_at: Option<u64>,
}

impl PersistedEntry {
    fn from_cached(key: &str, entry: &CachedResponse) -> Self {
        Self {
            key: key.to_string(),
            status: entry.response.status.as_u16(),
            headers: headers_to_vec(&entry.response.headers),
            response_type: entry.response.response_type,
            created_at: entry.created_at,
            expires_at: entry.expires_at,
        }
    }

    fn into_cached(self, body: Bytes) -> Result<(String, CachedResponse)> {
        let status = StatusCode::from_u16(self.status)
            .map_err(|e| CacheError::Storage(format!("bad status {}: {}", self.status, e)))?;
        let response = AssetResponse::new(status, headers_from_vec(&self.headers), body)
            .with_response_type(self.response_type);

        Ok((
            self.key,
            CachedResponse {
                response,
                created_at: self.created_at,
                expires_at: self.expires_at,
            },
        ))
    }
}

fn headers_to_vec(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            let value = value.to_str().ok()?;
            Some((name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

fn headers_from_vec(items: &[(String, String)]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in items {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_str()),
            HeaderValue::from_str(value),
        ) {
            headers.append(name, value);
        }
    }
    headers
}

/// Directory name for a generation. Hex keeps any name filesystem-safe.
fn encode_name(name: &str) -> String {
    name.bytes().map(|b| format!("{:02x}", b)).collect()
}

fn decode_name(encoded: &str) -> Option<String> {
    if encoded.is_empty() || encoded.len() % 2 != 0 {
        return None;
    }
    let bytes = (0..encoded.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(encoded.get(i..i + 2)?, 16).ok())
        .collect::<Option<Vec<u8>>>()?;
    String::from_utf8(bytes).ok()
}

fn io_error(context: impl std::fmt::Display, err: std::io::Error) -> CacheError {
    CacheError::Storage(format!("{}: {}", context, err))
}

async fn remove_if_present(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}

// == Disk Generation ==
/// In-memory index of one persisted generation.
#[derive(Debug)]
struct DiskGeneration {
    dir: PathBuf,
    store: CacheStore,
    /// Key to file id
    files: HashMap<String, u64>,
    next_id: u64,
}

impl DiskGeneration {
    fn path(&self, id: u64, extension: &str) -> PathBuf {
        self.dir.join(format!("{:016x}.{}", id, extension))
    }

    async fn write_entry(&self, id: u64, entry: &PersistedEntry, body: &Bytes) -> Result<()> {
        let meta = serde_json::to_vec(entry)
            .map_err(|e| CacheError::Storage(format!("encoding {}: {}", entry.key, e)))?;

        // Body first: a metadata file always has its body next to it
        for (extension, contents) in [(BODY_EXTENSION, body.as_ref()), (META_EXTENSION, &meta[..])] {
            let target = self.path(id, extension);
            let temp = target.with_extension(format!("{}.{}", extension, TEMP_EXTENSION));
            fs::write(&temp, contents)
                .await
                .map_err(|e| io_error(format!("writing {}", temp.display()), e))?;
            fs::rename(&temp, &target)
                .await
                .map_err(|e| io_error(format!("renaming {}", temp.display()), e))?;
        }
        Ok(())
    }

    async fn remove_files(&self, id: u64) {
        remove_if_present(&self.path(id, META_EXTENSION)).await;
        remove_if_present(&self.path(id, BODY_EXTENSION)).await;
    }

    /// Deletes the files of entries the index no longer holds.
    async fn sync_removed(&mut self) {
        let stale: Vec<(String, u64)> = self
            .files
            .iter()
            .filter(|(key, _)| self.store.entry(key).is_none())
            .map(|(key, id)| (key.clone(), *id))
            .collect();

        for (key, id) in stale {
            self.files.remove(&key);
            self.remove_files(id).await;
            debug!("Removed {} from {}", key, self.dir.display());
        }
    }

    async fn load(dir: PathBuf, store: CacheStore) -> Result<Self> {
        let mut generation = Self {
            dir,
            store,
            files: HashMap::new(),
            next_id: 0,
        };

        let mut entries = fs::read_dir(&generation.dir)
            .await
            .map_err(|e| io_error(format!("reading {}", generation.dir.display()), e))?;

        let mut metas = Vec::new();
        let mut others = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error(format!("reading {}", generation.dir.display()), e))?
        {
            let path = entry.path();
            let id = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| u64::from_str_radix(stem, 16).ok());
            match (id, path.extension().and_then(|ext| ext.to_str())) {
                (Some(id), Some(META_EXTENSION)) => metas.push((id, path)),
                _ => others.push(path),
            }
        }

        let mut live = HashSet::new();
        for (id, meta_path) in metas {
            generation.next_id = generation.next_id.max(id.saturating_add(1));
            match generation.restore_entry(id, &meta_path).await {
                Ok(key) => {
                    generation.files.insert(key, id);
                    live.insert(id);
                }
                Err(e) => {
                    warn!("Dropping cache entry {}: {}", meta_path.display(), e);
                    generation.remove_files(id).await;
                }
            }
        }

        // Temp files from interrupted writes and bodies without metadata
        for path in others {
            let id = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| u64::from_str_radix(stem, 16).ok());
            let is_live_body = id.is_some_and(|id| live.contains(&id))
                && path.extension().and_then(|ext| ext.to_str()) == Some(BODY_EXTENSION);
            if !is_live_body {
                remove_if_present(&path).await;
            }
        }

        Ok(generation)
    }

    async fn restore_entry(&mut self, id: u64, meta_path: &Path) -> Result<String> {
        let meta = fs::read(meta_path)
            .await
            .map_err(|e| io_error(format!("reading {}", meta_path.display()), e))?;
        let persisted: PersistedEntry = serde_json::from_slice(&meta)
            .map_err(|e| CacheError::Storage(format!("corrupt metadata: {}", e)))?;

        let body_path = self.path(id, BODY_EXTENSION);
        let body = fs::read(&body_path)
            .await
            .map_err(|e| io_error(format!("reading {}", body_path.display()), e))?;

        let (key, entry) = persisted.into_cached(Bytes::from(body))?;
        if entry.is_expired() {
            return Err(CacheError::Storage("entry expired".to_string()));
        }
        self.store.restore(key.clone(), entry)?;
        Ok(key)
    }
}

// == Disk Cache Storage ==
/// Persistent storage rooted at one directory.
#[derive(Debug)]
pub struct DiskCacheStorage {
    root: PathBuf,
    generations: RwLock<HashMap<String, Arc<RwLock<DiskGeneration>>>>,
    max_entries: usize,
    max_entry_bytes: usize,
    ttl: Option<u64>,
}

impl DiskCacheStorage {
    /// Opens the storage at `root`, creating it if needed and loading every
    /// generation found there.
    pub async fn open(
        root: impl Into<PathBuf>,
        max_entries: usize,
        max_entry_bytes: usize,
        ttl: Option<u64>,
    ) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| io_error(format!("creating {}", root.display()), e))?;

        let storage = Self {
            root,
            generations: RwLock::new(HashMap::new()),
            max_entries,
            max_entry_bytes,
            ttl,
        };
        storage.load_generations().await?;
        Ok(storage)
    }

    pub async fn from_config(root: &Path, config: &Config) -> Result<Self> {
        Self::open(
            root,
            config.max_entries,
            config.max_entry_bytes,
            config.cache_timeout().map(|d| d.as_secs()),
        )
        .await
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn new_store(&self) -> CacheStore {
        CacheStore::new(self.max_entries, self.max_entry_bytes, self.ttl)
    }

    async fn load_generations(&self) -> Result<()> {
        let mut dirs = fs::read_dir(&self.root)
            .await
            .map_err(|e| io_error(format!("reading {}", self.root.display()), e))?;

        let mut generations = self.generations.write().await;
        while let Some(dir) = dirs
            .next_entry()
            .await
            .map_err(|e| io_error(format!("reading {}", self.root.display()), e))?
        {
            let is_dir = dir.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            let name = dir.file_name().to_str().and_then(decode_name);
            let Some(name) = name.filter(|_| is_dir) else {
                debug!("Ignoring {} in cache root", dir.path().display());
                continue;
            };

            let generation = DiskGeneration::load(dir.path(), self.new_store()).await?;
            info!(
                "Loaded cache generation {} ({} entries)",
                name,
                generation.store.len()
            );
            generations.insert(name, Arc::new(RwLock::new(generation)));
        }
        Ok(())
    }

    async fn generation(&self, name: &str) -> Result<Arc<RwLock<DiskGeneration>>> {
        self.generations
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| CacheError::Storage(format!("cache '{}' is not open", name)))
    }
}

#[async_trait]
impl CacheStorage for DiskCacheStorage {
    async fn create(&self, name: &str) -> Result<()> {
        if self.generations.read().await.contains_key(name) {
            return Ok(());
        }

        let mut generations = self.generations.write().await;
        if generations.contains_key(name) {
            return Ok(());
        }

        let dir = self.root.join(encode_name(name));
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_error(format!("creating {}", dir.display()), e))?;
        info!("Creating cache generation {} at {}", name, dir.display());

        generations.insert(
            name.to_string(),
            Arc::new(RwLock::new(DiskGeneration {
                dir,
                store: self.new_store(),
                files: HashMap::new(),
                next_id: 0,
            })),
        );
        Ok(())
    }

    async fn match_entry(&self, name: &str, key: &str) -> Result<Option<AssetResponse>> {
        let generation = self.generation(name).await?;
        let lookup = generation.read().await.store.lookup(key);
        match lookup {
            Lookup::Hit(response) => Ok(Some(response)),
            Lookup::Expired => {
                let mut generation = generation.write().await;
                if generation.store.remove_if_expired(key) {
                    generation.sync_removed().await;
                }
                Ok(None)
            }
            Lookup::Miss => Ok(None),
        }
    }

    async fn put(&self, name: &str, key: String, response: AssetResponse) -> Result<()> {
        let generation = self.generation(name).await?;
        let mut generation = generation.write().await;

        let result = generation.store.put(key.clone(), response);
        // A full generation may have reclaimed expired entries before deciding
        generation.sync_removed().await;
        result?;

        let id = match generation.files.get(&key).copied() {
            Some(id) => id,
            None => {
                let id = generation.next_id;
                generation.next_id += 1;
                id
            }
        };

        let Some(entry) = generation.store.entry(&key) else {
            return Err(CacheError::Internal(format!("{} vanished after put", key)));
        };
        let persisted = PersistedEntry::from_cached(&key, entry);
        let body = entry.response.body.clone();

        if let Err(e) = generation.write_entry(id, &persisted, &body).await {
            generation.store.delete(&key);
            generation.files.remove(&key);
            generation.remove_files(id).await;
            return Err(e);
        }

        debug!("Persisted {} in {}", key, name);
        generation.files.insert(key, id);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.generations.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let Some(generation) = self.generations.write().await.remove(name) else {
            return Ok(false);
        };

        let dir = generation.read().await.dir.clone();
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(true),
            Err(e) => Err(io_error(format!("removing {}", dir.display()), e)),
        }
    }

    async fn stats(&self, name: &str) -> Result<CacheStats> {
        let generation = self.generation(name).await?;
        let stats = generation.read().await.store.stats();
        Ok(stats)
    }

    async fn purge_expired(&self, name: &str) -> Result<usize> {
        let generation = self.generation(name).await?;
        let mut generation = generation.write().await;
        let removed = generation.store.cleanup_expired();
        if removed > 0 {
            generation.sync_removed().await;
        }
        Ok(removed)
    }
}
