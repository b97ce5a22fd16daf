//! Asset Cache - a versioned, cache-first proxy for content-hashed bundles
//!
//! Serves previously fetched CSS/JS bundles from a local cache generation,
//! pre-warms it with the latest bundles on install and drops older
//! generations on activate.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod models;
pub mod tasks;
pub mod worker;

pub use api::AppState;
pub use config::Config;
pub use error::{CacheError, Result};
pub use tasks::spawn_cleanup_task;
pub use worker::{CacheWorker, FetchOutcome, LifecycleState};
