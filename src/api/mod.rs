//! API Module
//!
//! The host side of the worker: an HTTP proxy that hands requests to the
//! worker, plus control endpoints for its lifecycle.
//!
//! # Endpoints
//! - `POST /_worker/install` - Install the worker
//! - `POST /_worker/activate` - Activate the worker
//! - `GET /_worker/state` - Lifecycle state
//! - `GET /_worker/stats` - Cache statistics
//! - `GET /_worker/health` - Health check endpoint
//! - any other path - intercepted fetch

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
